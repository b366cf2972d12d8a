//! PDF page rasterization using pdfium-render.
//!
//! Pdfium work is blocking; callers run these functions on the blocking pool.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use tracing::debug;

use super::RenderedPage;
use crate::error::RenderError;

/// Renders PDF pages to PNG.
#[derive(Debug, Clone, Default)]
pub struct PdfRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfRasterizer {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Bind to libpdfium (dynamically linked).
    ///
    /// Searches for libpdfium in:
    /// 1. The configured library directory
    /// 2. Current directory (./libpdfium.so)
    /// 3. System library paths
    fn pdfium(&self) -> Result<Pdfium, RenderError> {
        let configured = self
            .library_path
            .as_ref()
            .map(|dir| Pdfium::pdfium_platform_library_name_at_path(dir));

        let bindings = match configured {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")),
        }
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| RenderError::PdfiumUnavailable {
            message: format!("{:?}", e),
        })?;

        Ok(Pdfium::new(bindings))
    }

    /// Render one page at `dpi` and encode it as PNG.
    ///
    /// The PDF is loaded once. `choose_page` receives the page count and
    /// returns the 1-based page to render.
    pub fn render_page_png(
        &self,
        pdf_path: &Path,
        dpi: u32,
        choose_page: impl FnOnce(u32) -> u32,
    ) -> Result<RenderedPage, RenderError> {
        let pdfium = self.pdfium()?;
        let document = load(&pdfium, pdf_path)?;
        let pages = document.pages();
        let total_pages = pages.len() as u32;
        let page = checked_page(choose_page(total_pages), total_pages)?;

        let pdf_page = pages
            .get((page - 1) as u16)
            .map_err(|e| RenderError::Rasterize {
                page,
                message: format!("{}", e),
            })?;

        Ok(RenderedPage {
            png: encode_png(&render_full_page(&pdf_page, page, dpi)?)?,
            page,
            total_pages,
        })
    }

    /// Render every page at `dpi`, in order, as PNG.
    pub fn render_all_png(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<Vec<u8>>, RenderError> {
        let pdfium = self.pdfium()?;
        let document = load(&pdfium, pdf_path)?;

        document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, pdf_page)| {
                let image = render_full_page(&pdf_page, index as u32 + 1, dpi)?;
                encode_png(&image)
            })
            .collect()
    }
}

fn checked_page(page: u32, total: u32) -> Result<u32, RenderError> {
    if page == 0 || page > total {
        return Err(RenderError::PageNotFound { page, total });
    }
    Ok(page)
}

fn load<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, RenderError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| RenderError::PdfLoad {
            message: format!("{}: {}", pdf_path.display(), e),
        })
}

/// Render a whole page with the target size derived from the page's point size.
fn render_full_page(page: &PdfPage, number: u32, dpi: u32) -> Result<DynamicImage, RenderError> {
    let (width, height) = target_size(page.width().value, page.height().value, dpi);

    debug!(page = number, dpi, width, height, "Rendering full page");

    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| RenderError::Rasterize {
            page: number,
            message: format!("{}", e),
        })?;

    Ok(bitmap.as_image())
}

/// Pixel size of a page of `width_pts` x `height_pts` points at `dpi`.
fn target_size(width_pts: f32, height_pts: f32, dpi: u32) -> (i32, i32) {
    let pixels_per_point = dpi as f64 / 72.0;
    let width = (width_pts as f64 * pixels_per_point).ceil() as i32;
    let height = (height_pts as f64 * pixels_per_point).ceil() as i32;
    (width.max(1), height.max(1))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RenderError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(png)
}
