#[cfg(feature = "raster")]
pub mod pdfium;

use image::DynamicImage;

use crate::config::settings::Settings;

/// One page to rasterize and the exact pixel size wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// 0-indexed page number.
    pub page_index: u32,
    pub width_px: u32,
    pub height_px: u32,
}

/// Renders pages of a PDF to bitmaps.
///
/// Implementations return one image per target, in target order.
pub trait PageRasterizer: Send + Sync {
    fn render_pages(
        &self,
        pdf: &[u8],
        targets: &[RenderTarget],
    ) -> crate::error::Result<Vec<DynamicImage>>;
}

/// Rasterizer used when the crate is built without pdfium support.
pub struct UnavailableRasterizer;

impl PageRasterizer for UnavailableRasterizer {
    fn render_pages(
        &self,
        _pdf: &[u8],
        _targets: &[RenderTarget],
    ) -> crate::error::Result<Vec<DynamicImage>> {
        Err(crate::error::ResizeError::render(
            "raster flatten is unavailable: built without the `raster` feature",
        ))
    }
}

/// Returns the rasterizer configured by `settings`.
pub fn default_rasterizer(settings: &Settings) -> Box<dyn PageRasterizer> {
    #[cfg(feature = "raster")]
    {
        Box::new(pdfium::PdfiumRasterizer::new(settings.pdfium_library.clone()))
    }
    #[cfg(not(feature = "raster"))]
    {
        let _ = settings;
        Box::new(UnavailableRasterizer)
    }
}
