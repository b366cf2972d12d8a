//! Spreadsheet -> PDF conversion through a headless office suite.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::RenderError;

/// Runs `<binary> --headless --convert-to pdf` on a file.
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    binary: String,
    timeout: Duration,
}

impl OfficeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Convert `input` to PDF inside `out_dir` and return the PDF path.
    ///
    /// The office profile is kept inside `out_dir` so concurrent conversions
    /// do not contend for the user's default profile lock.
    pub async fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, RenderError> {
        let profile_dir = out_dir.join(".office-profile");
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg(format!("-env:UserInstallation=file://{}", profile_dir.display()))
            .args(["--convert-to", "pdf", "--outdir"])
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary, input = %input.display(), "Starting PDF conversion");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(RenderError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::ToolNotFound {
                    binary: self.binary.clone(),
                });
            }
            Ok(Err(e)) => {
                return Err(RenderError::ConversionFailed {
                    stderr: e.to_string(),
                });
            }
            Ok(Ok(output)) => output,
        };

        let pdf_path = pdf_path_for(input, out_dir);
        if !pdf_path.exists() {
            return Err(RenderError::ConversionFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // The office suite sometimes exits non-zero after writing a usable PDF
        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Converter exited unsuccessfully but produced a PDF"
            );
        }

        Ok(pdf_path)
    }
}

/// Where the converter writes the PDF for `input`: same stem, `.pdf` extension.
pub fn pdf_path_for(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{}.pdf", stem))
}
