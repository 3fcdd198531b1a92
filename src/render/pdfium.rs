// pdfium-render wrapper: PDF bytes -> DynamicImage per page (in-memory only)

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;

use super::{PageRasterizer, RenderTarget};
use crate::error::ResizeError;

/// Resolves the path to the pdfium shared library.
///
/// Search order:
/// 1. The directory configured in settings
/// 2. `PDFIUM_DYNAMIC_LIB_PATH` environment variable
/// 3. `vendor/pdfium/lib/` relative to the project root (for development)
fn resolve_pdfium_lib_path(configured: Option<&PathBuf>) -> crate::error::Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(ResizeError::render(format!(
            "pdfium_library is set to '{}' but the path does not exist",
            path.display()
        )));
    }

    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let p = PathBuf::from(&path);
        if p.exists() {
            return Ok(p);
        }
        return Err(ResizeError::render(format!(
            "PDFIUM_DYNAMIC_LIB_PATH is set to '{}' but the path does not exist",
            path
        )));
    }

    // In development, CARGO_MANIFEST_DIR points to the project root.
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let vendor_path = PathBuf::from(&manifest_dir).join("vendor/pdfium/lib");
        if vendor_path.exists() {
            return Ok(vendor_path);
        }
    }

    Err(ResizeError::render(
        "pdfium library not found: set pdfium_library, PDFIUM_DYNAMIC_LIB_PATH, or place libpdfium.so in vendor/pdfium/lib/",
    ))
}

/// Creates a new Pdfium instance by dynamically loading the shared library.
fn create_pdfium(configured: Option<&PathBuf>) -> crate::error::Result<Pdfium> {
    let lib_path = resolve_pdfium_lib_path(configured)?;
    let lib_path_str = lib_path
        .to_str()
        .ok_or_else(|| ResizeError::render("pdfium library path contains non-UTF-8 characters"))?;
    let bindings =
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(lib_path_str))?;
    Ok(Pdfium::new(bindings))
}

/// Rasterizer backed by the pdfium library.
///
/// The library is bound once per call, so an instance holds no pdfium state
/// and can be shared between requests.
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    /// Renders each target page to exactly `width_px` x `height_px`.
    ///
    /// # Errors
    /// Returns `ResizeError::RenderFailure` if:
    /// - The pdfium library cannot be initialized
    /// - The PDF cannot be opened
    /// - A page index is out of range
    /// - Rendering fails
    fn render_pages(
        &self,
        pdf: &[u8],
        targets: &[RenderTarget],
    ) -> crate::error::Result<Vec<DynamicImage>> {
        let pdfium = create_pdfium(self.library_dir.as_ref())?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None)?;

        let mut images = Vec::with_capacity(targets.len());
        for target in targets {
            let page_index_u16 = u16::try_from(target.page_index)
                .map_err(|_| ResizeError::render("page index exceeds u16 range"))?;
            let width_px = i32::try_from(target.width_px)
                .map_err(|_| ResizeError::render("target width exceeds i32 range"))?;
            let height_px = i32::try_from(target.height_px)
                .map_err(|_| ResizeError::render("target height exceeds i32 range"))?;

            let page = document.pages().get(page_index_u16).map_err(|e| {
                ResizeError::render(format!("page {}: {e}", target.page_index + 1))
            })?;

            let config = PdfRenderConfig::new()
                .set_target_width(width_px)
                .set_target_height(height_px);

            let bitmap = page.render_with_config(&config).map_err(|e| {
                ResizeError::render(format!("page {}: {e}", target.page_index + 1))
            })?;

            tracing::debug!(
                page = target.page_index + 1,
                width_px,
                height_px,
                "page rasterized"
            );
            images.push(bitmap.as_image());
        }

        Ok(images)
    }
}
