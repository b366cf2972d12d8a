use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Only Excel files (.xlsx, .xls, .xlsm) are supported, got '{filename}'")]
    UnsupportedFormat { filename: String },

    #[error("File exceeds the maximum upload size of {max} bytes")]
    FileTooLarge { max: u64 },

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Rendering pipeline errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Conversion tool not found: {binary}")]
    ToolNotFound { binary: String },

    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("PDF conversion failed: {stderr}")]
    ConversionFailed { stderr: String },

    #[error("PDF renderer unavailable: {message}")]
    PdfiumUnavailable { message: String },

    #[error("Failed to load PDF: {message}")]
    PdfLoad { message: String },

    #[error("Page {page} not found. Document has {total} page(s)")]
    PageNotFound { page: u32, total: u32 },

    #[error("Failed to render page {page}: {message}")]
    Rasterize { page: u32, message: String },

    #[error("Failed to encode PNG")]
    Encode(#[source] image::ImageError),
}

/// API error response (matches Axum's built-in JsonRejection format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest { .. }
            | ServiceError::UnsupportedFormat { .. }
            | ServiceError::Render(RenderError::PageNotFound { .. }) => StatusCode::BAD_REQUEST,
            ServiceError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Render(RenderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::UnsupportedFormat { .. } => "unsupported_format",
            ServiceError::FileTooLarge { .. } => "file_too_large",
            ServiceError::Render(RenderError::ToolNotFound { .. }) => "tool_not_found",
            ServiceError::Render(RenderError::Timeout { .. }) => "conversion_timeout",
            ServiceError::Render(RenderError::ConversionFailed { .. }) => "conversion_failed",
            ServiceError::Render(RenderError::PdfiumUnavailable { .. }) => "renderer_unavailable",
            ServiceError::Render(RenderError::PdfLoad { .. }) => "pdf_load_error",
            ServiceError::Render(RenderError::PageNotFound { .. }) => "page_not_found",
            ServiceError::Render(RenderError::Rasterize { .. }) => "rasterize_error",
            ServiceError::Render(RenderError::Encode(_)) => "encode_error",
            ServiceError::Io(_) => "io_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
