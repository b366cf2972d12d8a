//! Conversion API endpoints.
//!
//! Every endpoint takes a multipart upload with the spreadsheet in the
//! `file` field.

use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::service::{AllPages, Analysis, Upload};

use super::AppState;

const X_SELECTED_SHEET: HeaderName = HeaderName::from_static("x-selected-sheet");
const X_TOTAL_PAGES: HeaderName = HeaderName::from_static("x-total-pages");

/// Query parameters for `/convert`
#[derive(Debug, Deserialize)]
pub struct ConvertParams {
    pub dpi: Option<u32>,
    /// Explicit 1-based page; ignored when out of range
    pub page: Option<i64>,
}

/// Query parameters for `/convert-all`
#[derive(Debug, Deserialize)]
pub struct ConvertAllParams {
    pub dpi: Option<u32>,
}

/// Render one page of the uploaded spreadsheet as PNG
pub async fn convert_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
    multipart: Multipart,
) -> ServiceResult<Response> {
    let upload = read_upload(&state, multipart).await?;
    let image = state
        .service
        .convert(&upload, params.dpi, params.page)
        .await?;

    let headers = [
        (header::CONTENT_TYPE, mime::IMAGE_PNG.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename={}_page{}.png", image.stem, image.page),
        ),
        (X_SELECTED_SHEET, image.selected_sheet.to_string()),
        (X_TOTAL_PAGES, image.total_pages.to_string()),
    ];

    Ok((StatusCode::OK, headers, image.png).into_response())
}

/// Render every page of the uploaded spreadsheet
pub async fn convert_all_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertAllParams>,
    multipart: Multipart,
) -> ServiceResult<Json<AllPages>> {
    let upload = read_upload(&state, multipart).await?;
    let pages = state.service.convert_all(&upload, params.dpi).await?;
    Ok(Json(pages))
}

/// Report worksheet scores and the selected sheet without rendering
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ServiceResult<Json<Analysis>> {
    let upload = read_upload(&state, multipart).await?;
    let analysis = state.service.analyze(&upload).await?;
    Ok(Json(analysis))
}

/// Pull the `file` field out of the form and validate it
async fn read_upload(state: &AppState, mut multipart: Multipart) -> ServiceResult<Upload> {
    let max = state.service.config.limits.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max))?
    {
        if field.name() != Some("file") {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e, max))?;
        return state.service.accept_upload(&filename, data);
    }

    Err(ServiceError::InvalidRequest {
        message: "No file provided".to_string(),
    })
}

fn multipart_error(error: MultipartError, max: u64) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::FileTooLarge { max }
    } else {
        ServiceError::InvalidRequest {
            message: error.body_text(),
        }
    }
}
