//! Rendering pipeline: spreadsheet -> PDF -> PNG.
//!
//! The office suite does the spreadsheet layout; pdfium rasterizes the
//! resulting PDF.

pub mod office;
pub mod page;
pub mod raster;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::RenderConfig;
use crate::error::{ServiceError, ServiceResult};

pub use office::OfficeConverter;
pub use page::resolve_page;
pub use raster::PdfRasterizer;

/// One rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub page: u32,
    pub total_pages: u32,
}

/// Converts spreadsheets to PDF and rasterizes pages
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    office: OfficeConverter,
    rasterizer: PdfRasterizer,
}

impl RenderPipeline {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            office: OfficeConverter::new(config.office_binary.clone(), config.timeout()),
            rasterizer: PdfRasterizer::new(config.pdfium_library_path.clone()),
        }
    }

    pub async fn to_pdf(&self, input: &Path, out_dir: &Path) -> ServiceResult<PathBuf> {
        Ok(self.office.convert_to_pdf(input, out_dir).await?)
    }

    /// Render the page chosen by [`resolve_page`] from an explicit request and the selected sheet.
    pub async fn render_page(
        &self,
        pdf_path: PathBuf,
        requested: Option<i64>,
        best_sheet: u32,
        dpi: u32,
    ) -> ServiceResult<RenderedPage> {
        let rasterizer = self.rasterizer.clone();
        tokio::task::spawn_blocking(move || -> ServiceResult<RenderedPage> {
            let rendered = rasterizer.render_page_png(&pdf_path, dpi, |total_pages| {
                resolve_page(requested, best_sheet, total_pages)
            })?;
            info!(
                requested = ?requested,
                best_sheet,
                total_pages = rendered.total_pages,
                page = rendered.page,
                "Rendered resolved page"
            );
            Ok(rendered)
        })
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("Render task failed: {}", e),
        })?
    }

    /// Render every page, in order.
    pub async fn render_all(&self, pdf_path: PathBuf, dpi: u32) -> ServiceResult<Vec<Vec<u8>>> {
        let rasterizer = self.rasterizer.clone();
        tokio::task::spawn_blocking(move || -> ServiceResult<Vec<Vec<u8>>> {
            Ok(rasterizer.render_all_png(&pdf_path, dpi)?)
        })
        .await
        .map_err(|e| ServiceError::Internal {
            message: format!("Render task failed: {}", e),
        })?
    }
}
