// In-memory document model: ordered pages plus the object store they draw from.

use lopdf::{Object, ObjectId};

/// Axis-aligned rectangle in PDF user space (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Builds a rectangle from two corners in any order.
    pub fn from_corners(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        Rect {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Overlap of two rectangles, or `None` when it has no area.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.x0 as f32),
            Object::Real(self.y0 as f32),
            Object::Real(self.x1 as f32),
            Object::Real(self.y1 as f32),
        ])
    }
}

/// A page as loaded from the input, not yet transformed.
#[derive(Debug, Clone)]
pub struct SourcePage {
    /// 1-based page number in the input document.
    pub number: u32,
    pub object_id: ObjectId,
    pub media_box: Rect,
    /// Visible area: CropBox clipped to MediaBox, or MediaBox when absent.
    /// Page width and height come from this box.
    pub crop_box: Rect,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub rotation: i64,
    /// Inline dictionary or reference, as found on the page or its ancestors.
    pub resources: Option<Object>,
}

/// Original page content redrawn as a Form XObject under a uniform scale.
#[derive(Debug, Clone)]
pub struct FormContent {
    /// Decoded content stream of the source page.
    pub content: Vec<u8>,
    /// Visible area of the source page, used as the form's BBox.
    pub bbox: Rect,
    pub resources: Option<Object>,
    pub scale: f64,
    pub rotation: i64,
}

/// A page flattened to an 8-bit RGB image.
#[derive(Debug, Clone)]
pub struct RasterContent {
    pub width_px: u32,
    pub height_px: u32,
    /// Flate-encoded RGB samples, row-major.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum PageContent {
    Source(SourcePage),
    Form(FormContent),
    Raster(RasterContent),
}

/// One page: physical size in points plus renderable content.
#[derive(Debug, Clone)]
pub struct Page {
    pub width: f64,
    pub height: f64,
    pub content: PageContent,
}

impl Page {
    pub fn rotation(&self) -> i64 {
        match &self.content {
            PageContent::Source(src) => src.rotation,
            PageContent::Form(form) => form.rotation,
            PageContent::Raster(_) => 0,
        }
    }

    /// Size as a viewer shows it, with quarter-turn rotations applied.
    pub fn displayed_size(&self) -> (f64, f64) {
        if self.rotation() % 180 == 0 {
            (self.width, self.height)
        } else {
            (self.height, self.width)
        }
    }
}

/// A loaded or transformed document.
///
/// `store` keeps every object of the input so that vector content can keep
/// referring to its fonts, images and other resources; `source` is the raw
/// input used for rasterization.
pub struct Document {
    store: lopdf::Document,
    source: Vec<u8>,
    pages: Vec<Page>,
}

impl Document {
    pub(crate) fn new(store: lopdf::Document, source: Vec<u8>, pages: Vec<Page>) -> Self {
        Self {
            store,
            source,
            pages,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn store(&self) -> &lopdf::Document {
        &self.store
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    /// Replaces the page sequence, keeping the object store.
    pub fn with_pages(self, pages: Vec<Page>) -> Self {
        Self { pages, ..self }
    }
}
