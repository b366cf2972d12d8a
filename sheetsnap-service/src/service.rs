mod upload;

pub use upload::{Upload, UploadKind};

use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::render::RenderPipeline;
use crate::selection::{Selection, WorksheetSelector};

/// Worksheet analysis returned by `/analyze`
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub filename: String,
    pub worksheet_scores: BTreeMap<u32, u32>,
    pub selected_sheet: u32,
    /// False for formats the selector does not inspect
    pub analyzed: bool,
}

/// A single rendered page ready to return to the caller
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub stem: String,
    pub png: Vec<u8>,
    pub page: u32,
    pub total_pages: u32,
    pub selected_sheet: u32,
}

/// One page of a `/convert-all` response
#[derive(Debug, Clone, Serialize)]
pub struct PageImage {
    pub page: u32,
    /// Base64-encoded PNG
    pub image: String,
}

/// All pages of a document
#[derive(Debug, Clone, Serialize)]
pub struct AllPages {
    pub filename: String,
    pub total_pages: u32,
    pub images: Vec<PageImage>,
}

/// Main service coordinator
pub struct SheetService {
    pub config: Arc<AppConfig>,
    selector: Arc<WorksheetSelector>,
    pipeline: RenderPipeline,
}

impl SheetService {
    pub fn new(config: Arc<AppConfig>) -> ServiceResult<Self> {
        let selector = Arc::new(config.worksheet_selector()?);
        let pipeline = RenderPipeline::new(&config.render);

        info!(
            office_binary = %config.render.office_binary,
            style_code_prefixes = ?config.selection.style_code_prefixes,
            "Sheet service initialized"
        );

        Ok(Self {
            config,
            selector,
            pipeline,
        })
    }

    /// Validate a raw upload against the configured limits
    pub fn accept_upload(&self, filename: &str, data: bytes::Bytes) -> ServiceResult<Upload> {
        Upload::new(filename, data, self.config.limits.max_upload_bytes)
    }

    /// Score the worksheets of an upload without rendering anything
    pub async fn analyze(&self, upload: &Upload) -> ServiceResult<Analysis> {
        let selection = self.select(upload).await?;
        Ok(Analysis {
            filename: upload.filename.clone(),
            worksheet_scores: selection.scores,
            selected_sheet: selection.best_sheet,
            analyzed: upload.kind == UploadKind::Ooxml,
        })
    }

    /// Render one page: the explicit `page` if valid, otherwise the selected worksheet
    pub async fn convert(
        &self,
        upload: &Upload,
        dpi: Option<u32>,
        page: Option<i64>,
    ) -> ServiceResult<ConvertedImage> {
        let dpi = self.resolve_dpi(dpi)?;
        let span = info_span!("convert", request_id = %Uuid::new_v4(), filename = %upload.filename);

        let started = Instant::now();
        let result = async {
            let selection = self.select(upload).await?;

            let work_dir = tempfile::Builder::new().prefix("sheetsnap-").tempdir()?;
            let input = upload.stage(&work_dir).await?;
            let pdf = self.pipeline.to_pdf(&input, work_dir.path()).await?;
            let rendered = self
                .pipeline
                .render_page(pdf, page, selection.best_sheet, dpi)
                .await?;

            info!(
                page = rendered.page,
                total_pages = rendered.total_pages,
                selected_sheet = selection.best_sheet,
                bytes = rendered.png.len(),
                "Converted spreadsheet page"
            );

            Ok::<_, ServiceError>(ConvertedImage {
                stem: upload.stem(),
                png: rendered.png,
                page: rendered.page,
                total_pages: rendered.total_pages,
                selected_sheet: selection.best_sheet,
            })
        }
        .instrument(span)
        .await;

        record_conversion("convert", started, &result);
        result
    }

    /// Render every page as base64 PNG
    pub async fn convert_all(&self, upload: &Upload, dpi: Option<u32>) -> ServiceResult<AllPages> {
        let dpi = self.resolve_dpi(dpi)?;
        let span = info_span!("convert_all", request_id = %Uuid::new_v4(), filename = %upload.filename);

        let started = Instant::now();
        let result = async {
            let work_dir = tempfile::Builder::new().prefix("sheetsnap-").tempdir()?;
            let input = upload.stage(&work_dir).await?;
            let pdf = self.pipeline.to_pdf(&input, work_dir.path()).await?;
            let pages = self.pipeline.render_all(pdf, dpi).await?;

            let engine = base64::engine::general_purpose::STANDARD;
            let images: Vec<PageImage> = pages
                .iter()
                .enumerate()
                .map(|(i, png)| PageImage {
                    page: i as u32 + 1,
                    image: engine.encode(png),
                })
                .collect();

            info!(total_pages = images.len(), "Converted all spreadsheet pages");

            Ok::<_, ServiceError>(AllPages {
                filename: upload.filename.clone(),
                total_pages: images.len() as u32,
                images,
            })
        }
        .instrument(span)
        .await;

        record_conversion("convert_all", started, &result);
        result
    }

    /// Run worksheet selection on the blocking pool; non-OOXML uploads get sheet 1
    async fn select(&self, upload: &Upload) -> ServiceResult<Selection> {
        if upload.kind != UploadKind::Ooxml {
            return Ok(Selection {
                degraded: false,
                ..Selection::fallback()
            });
        }

        let selector = self.selector.clone();
        let data = upload.data.clone();
        let selection = tokio::task::spawn_blocking(move || selector.select(&data))
            .await
            .map_err(|e| ServiceError::Internal {
                message: format!("Selection task failed: {}", e),
            })?;

        if selection.degraded {
            metrics::counter!("sheetsnap_selection_fallbacks_total").increment(1);
            warn!(filename = %upload.filename, "Worksheet analysis fell back to sheet 1");
        }

        Ok(selection)
    }

    fn resolve_dpi(&self, dpi: Option<u32>) -> ServiceResult<u32> {
        let render = &self.config.render;
        let dpi = dpi.unwrap_or(render.default_dpi);
        if dpi < render.min_dpi || dpi > render.max_dpi {
            return Err(ServiceError::InvalidRequest {
                message: format!(
                    "dpi must be between {} and {}, got {}",
                    render.min_dpi, render.max_dpi, dpi
                ),
            });
        }
        Ok(dpi)
    }
}

fn record_conversion<T>(endpoint: &'static str, started: Instant, result: &ServiceResult<T>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!("sheetsnap_conversions_total", "endpoint" => endpoint, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("sheetsnap_conversion_seconds", "endpoint" => endpoint)
        .record(started.elapsed().as_secs_f64());
}
