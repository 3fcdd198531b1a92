// Page transformation: vector redraw or raster flatten, one page at a time

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::DynamicImage;
use lopdf::Object;
use lopdf::content::Content;
use rayon::prelude::*;

use crate::config::request::{ScaleFactor, ScalingStrategy};
use crate::error::ResizeError;
use crate::pdf::page::{Document, FormContent, Page, PageContent, RasterContent, SourcePage};
use crate::render::{PageRasterizer, RenderTarget};

/// Largest page side most PDF consumers accept (200 inches).
pub const PDF_MAX_DIMENSION_PT: f64 = 14_400.0;

#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    pub strategy: ScalingStrategy,
    pub max_raster_pixels: u64,
}

/// Transforms every page of `document` with the configured strategy.
///
/// Geometry is checked for all pages before any page is transformed, so an
/// `InvalidScale` error never leaves a half-transformed document behind.
/// The returned document keeps the input's object store.
pub fn transform_document(
    document: Document,
    scale: ScaleFactor,
    options: &TransformOptions,
    rasterizer: &dyn PageRasterizer,
) -> crate::error::Result<Document> {
    let pages = match options.strategy {
        ScalingStrategy::VectorRedraw => vector_redraw(&document, scale)?,
        ScalingStrategy::RasterFlatten => {
            raster_flatten(&document, scale, options.max_raster_pixels, rasterizer)?
        }
    };

    debug_assert_eq!(pages.len(), document.page_count());
    Ok(document.with_pages(pages))
}

fn source_page(page: &Page) -> crate::error::Result<&SourcePage> {
    match &page.content {
        PageContent::Source(src) => Ok(src),
        _ => Err(ResizeError::render("page has already been transformed")),
    }
}

/// Output size of a vector-redrawn page, or `InvalidScale` when either side
/// rounds to zero or exceeds [`PDF_MAX_DIMENSION_PT`]. Factors above 1 are
/// accepted up to that limit.
pub fn scaled_page_size(page: &Page, scale: ScaleFactor) -> crate::error::Result<(f64, f64)> {
    let width = page.width * scale.value();
    let height = page.height * scale.value();

    if width.round() < 1.0 || height.round() < 1.0 {
        return Err(ResizeError::invalid_scale(format!(
            "scale {scale} turns a {}x{} pt page into {width:.3}x{height:.3} pt",
            page.width, page.height
        )));
    }
    if width > PDF_MAX_DIMENSION_PT || height > PDF_MAX_DIMENSION_PT {
        return Err(ResizeError::invalid_scale(format!(
            "scale {scale} turns a {}x{} pt page into {width:.1}x{height:.1} pt, above the {PDF_MAX_DIMENSION_PT} pt limit",
            page.width, page.height
        )));
    }

    Ok((width, height))
}

/// Pixel size of a flattened page: the displayed size in points times the
/// scale factor (one point is one pixel at scale 1).
pub fn raster_target(
    page: &Page,
    page_index: u32,
    scale: ScaleFactor,
    max_pixels: u64,
) -> crate::error::Result<RenderTarget> {
    let (width, height) = page.displayed_size();
    let width_px = (width * scale.value()).round();
    let height_px = (height * scale.value()).round();

    if width_px < 1.0 || height_px < 1.0 {
        return Err(ResizeError::invalid_scale(format!(
            "scale {scale} renders page {} at {width_px}x{height_px} pixels",
            page_index + 1
        )));
    }
    if width_px * height_px > max_pixels as f64 {
        return Err(ResizeError::invalid_scale(format!(
            "scale {scale} renders page {} at {width_px}x{height_px} pixels, above the {max_pixels} pixel limit",
            page_index + 1
        )));
    }

    Ok(RenderTarget {
        page_index,
        width_px: width_px as u32,
        height_px: height_px as u32,
    })
}

/// Vector redraw: each page becomes a Form XObject drawn into a page of
/// `width * scale` x `height * scale` points.
fn vector_redraw(document: &Document, scale: ScaleFactor) -> crate::error::Result<Vec<Page>> {
    let sizes = document
        .pages()
        .iter()
        .map(|page| scaled_page_size(page, scale))
        .collect::<crate::error::Result<Vec<_>>>()?;

    let mut pages = Vec::with_capacity(sizes.len());
    for (page, (width, height)) in document.pages().iter().zip(sizes) {
        let src = source_page(page)?;
        let content = redraw_content(document.store(), src)?;

        tracing::debug!(
            page = src.number,
            from_width = page.width,
            from_height = page.height,
            width,
            height,
            "page redrawn"
        );

        pages.push(Page {
            width,
            height,
            content: PageContent::Form(FormContent {
                content,
                bbox: src.crop_box,
                resources: src.resources.clone(),
                scale: scale.value(),
                rotation: src.rotation,
            }),
        });
    }

    Ok(pages)
}

/// Reads, decodes and parses the page's content so that a corrupt stream
/// fails here instead of producing a page no viewer can draw.
///
/// `lopdf::Document::get_page_content` skips streams it cannot decode, so the
/// streams are collected and decoded here.
fn redraw_content(store: &lopdf::Document, src: &SourcePage) -> crate::error::Result<Vec<u8>> {
    let fail = |msg: String| ResizeError::render(format!("page {}: {msg}", src.number));

    let page_dict = store
        .get_dictionary(src.object_id)
        .map_err(|e| fail(format!("page object cannot be read: {e}")))?;

    let contents = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => store
            .get_object(*id)
            .map_err(|e| fail(format!("content object cannot be read: {e}")))?,
        Ok(obj) => obj,
        // A page without content is blank, which is valid
        Err(_) => return Ok(Vec::new()),
    };
    let parts: Vec<&Object> = match contents {
        Object::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut content = Vec::new();
    for part in parts {
        let stream = match part {
            Object::Reference(id) => store.get_object(*id).and_then(Object::as_stream),
            other => other.as_stream(),
        }
        .map_err(|e| fail(format!("content stream cannot be read: {e}")))?;

        let decoded = decode_stream(stream)
            .map_err(|e| fail(format!("content stream cannot be decoded: {e}")))?;
        if !content.is_empty() {
            content.push(b'\n');
        }
        content.extend_from_slice(&decoded);
    }

    // lopdf's operator parser rejects valid inline images, so those pages
    // are only checked at the stream level
    if !has_inline_image(&content) {
        Content::decode(&content)
            .map_err(|e| fail(format!("content stream cannot be parsed: {e}")))?;
    }

    Ok(content)
}

/// Whether the content contains a `BI` operator token.
fn has_inline_image(content: &[u8]) -> bool {
    let is_delimiter = |b: u8| {
        b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'/' | b'%')
    };
    content.windows(2).enumerate().any(|(i, pair)| {
        pair == b"BI"
            && (i == 0 || is_delimiter(content[i - 1]))
            && content.get(i + 2).is_none_or(|&b| is_delimiter(b))
    })
}

/// Decodes a content stream, treating any Flate error as fatal.
fn decode_stream(stream: &lopdf::Stream) -> std::result::Result<Vec<u8>, String> {
    let filters: Vec<&[u8]> = match stream.dict.get(b"Filter") {
        Err(_) => Vec::new(),
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_name().ok()).collect(),
        Ok(_) => return Err("invalid /Filter entry".to_string()),
    };

    match filters.as_slice() {
        [] => Ok(stream.content.clone()),
        [b"FlateDecode"] if stream.dict.get(b"DecodeParms").is_err() => {
            let mut decoded = Vec::new();
            ZlibDecoder::new(stream.content.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| e.to_string())?;
            Ok(decoded)
        }
        _ => stream.decompressed_content().map_err(|e| e.to_string()),
    }
}

/// Raster flatten: each page is rendered at `scale` and embedded as an image
/// filling a page of the original displayed size.
fn raster_flatten(
    document: &Document,
    scale: ScaleFactor,
    max_pixels: u64,
    rasterizer: &dyn PageRasterizer,
) -> crate::error::Result<Vec<Page>> {
    let targets = document
        .pages()
        .iter()
        .enumerate()
        .map(|(index, page)| {
            source_page(page)?;
            raster_target(page, index as u32, scale, max_pixels)
        })
        .collect::<crate::error::Result<Vec<_>>>()?;

    let images = rasterizer.render_pages(document.source_bytes(), &targets)?;
    if images.len() != targets.len() {
        return Err(ResizeError::render(format!(
            "rasterizer returned {} images for {} pages",
            images.len(),
            targets.len()
        )));
    }

    let encoded: Vec<crate::error::Result<RasterContent>> =
        images.into_par_iter().map(encode_raster).collect();

    let mut pages = Vec::with_capacity(encoded.len());
    for (page, raster) in document.pages().iter().zip(encoded) {
        let raster = raster?;
        let (width, height) = page.displayed_size();

        tracing::debug!(
            width,
            height,
            width_px = raster.width_px,
            height_px = raster.height_px,
            "page flattened"
        );

        pages.push(Page {
            width,
            height,
            content: PageContent::Raster(raster),
        });
    }

    Ok(pages)
}

/// Converts a bitmap to 8-bit RGB and Flate-encodes the samples.
fn encode_raster(image: DynamicImage) -> crate::error::Result<RasterContent> {
    let rgb = image.to_rgb8();
    let (width_px, height_px) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw())?;
    let data = encoder.finish()?;

    Ok(RasterContent {
        width_px,
        height_px,
        data,
    })
}
