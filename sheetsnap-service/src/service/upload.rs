//! Upload validation and staging.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Spreadsheet formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Zip-based `.xlsx` / `.xlsm`; analysed by the worksheet selector
    Ooxml,
    /// Binary `.xls`; passed straight to the converter
    LegacyXls,
}

impl UploadKind {
    /// Classify by file extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" => Some(Self::Ooxml),
            "xls" => Some(Self::LegacyXls),
            _ => None,
        }
    }
}

/// A validated spreadsheet upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
    pub kind: UploadKind,
}

impl Upload {
    /// Validate extension, emptiness and size.
    pub fn new(filename: impl Into<String>, data: Bytes, max_bytes: u64) -> ServiceResult<Self> {
        let filename = filename.into();
        let kind = UploadKind::from_filename(&filename).ok_or_else(|| {
            ServiceError::UnsupportedFormat {
                filename: filename.clone(),
            }
        })?;

        if data.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "Uploaded file is empty".to_string(),
            });
        }

        if data.len() as u64 > max_bytes {
            return Err(ServiceError::FileTooLarge { max: max_bytes });
        }

        Ok(Self {
            filename,
            data,
            kind,
        })
    }

    /// File name without extension, safe for use in headers and paths
    pub fn stem(&self) -> String {
        let stem = Path::new(&self.filename)
            .file_stem()
            .map(|s| sanitize_filename(&s.to_string_lossy()))
            .unwrap_or_default();
        if stem.is_empty() {
            "spreadsheet".to_string()
        } else {
            stem
        }
    }

    /// Write the upload into `dir` under a sanitized name and return its path.
    pub async fn stage(&self, dir: &TempDir) -> ServiceResult<PathBuf> {
        let extension = match Path::new(&self.filename).extension() {
            Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
            None => "xlsx".to_string(),
        };
        let path = dir.path().join(format!("{}.{}", self.stem(), extension));
        tokio::fs::write(&path, &self.data).await?;
        debug!(path = %path.display(), bytes = self.data.len(), "Staged upload");
        Ok(path)
    }
}

/// Sanitize a string for use as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';' | ',' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c| c == '_' || c == '.')
        .to_string()
}
