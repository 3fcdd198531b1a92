use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ResizeError;

/// Zoom applied when a request does not name one and settings do not
/// override it.
pub const DEFAULT_ZOOM: f64 = 0.5;

/// Uniform multiplier applied to page width and height.
///
/// Always positive and finite; the only way to build one is [`ScaleFactor::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    pub fn new(value: f64) -> crate::error::Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ResizeError::invalid_scale(format!(
                "scale factor must be a positive number, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl FromStr for ScaleFactor {
    type Err = ResizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s.trim().parse().map_err(|_| {
            ResizeError::invalid_input(format!("zoom must be a number, got '{}'", s.trim()))
        })?;
        Self::new(value)
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quality/size trade-off handed to the external compression tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionProfile {
    #[default]
    None,
    Screen,
    Ebook,
    Printer,
}

impl CompressionProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionProfile::None => "none",
            CompressionProfile::Screen => "screen",
            CompressionProfile::Ebook => "ebook",
            CompressionProfile::Printer => "printer",
        }
    }

    /// Lenient parse used for form input: absent or unknown values fall back
    /// to [`CompressionProfile::None`].
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => CompressionProfile::None,
            Some(v) => v.parse().unwrap_or_else(|_| {
                tracing::warn!(compression = v, "unrecognized compression profile, using none");
                CompressionProfile::None
            }),
        }
    }
}

impl FromStr for CompressionProfile {
    type Err = ResizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionProfile::None),
            "screen" => Ok(CompressionProfile::Screen),
            "ebook" => Ok(CompressionProfile::Ebook),
            "printer" => Ok(CompressionProfile::Printer),
            other => Err(ResizeError::invalid_input(format!(
                "unrecognized compression profile '{other}' (expected none, screen, ebook or printer)"
            ))),
        }
    }
}

impl fmt::Display for CompressionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a page is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ScalingStrategy {
    /// Redraw the original vector content into a resized page.
    #[default]
    #[serde(rename = "vector")]
    VectorRedraw,
    /// Render the page to pixels and embed the image in a page of the
    /// original size.
    #[serde(rename = "raster")]
    RasterFlatten,
}

impl FromStr for ScalingStrategy {
    type Err = ResizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(ScalingStrategy::VectorRedraw),
            "raster" => Ok(ScalingStrategy::RasterFlatten),
            other => Err(ResizeError::invalid_input(format!(
                "unrecognized strategy '{other}' (expected vector or raster)"
            ))),
        }
    }
}

impl fmt::Display for ScalingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingStrategy::VectorRedraw => f.write_str("vector"),
            ScalingStrategy::RasterFlatten => f.write_str("raster"),
        }
    }
}

/// One resize request: the uploaded document plus validated parameters.
#[derive(Debug, Clone)]
pub struct ResizeRequest {
    pub pdf: Vec<u8>,
    pub scale: ScaleFactor,
    pub compression: CompressionProfile,
}

impl ResizeRequest {
    pub fn new(pdf: Vec<u8>, scale: ScaleFactor, compression: CompressionProfile) -> Self {
        Self {
            pdf,
            scale,
            compression,
        }
    }

    /// Builds a request from raw form fields.
    ///
    /// A missing document or a non-numeric zoom is `InvalidInput`, a
    /// non-positive zoom is `InvalidScale`. An absent zoom means
    /// `default_zoom` (normally `Settings::default_zoom`); an absent or
    /// unknown compression means none.
    pub fn from_form(
        pdf: Option<Vec<u8>>,
        zoom: Option<&str>,
        compression: Option<&str>,
        default_zoom: f64,
    ) -> crate::error::Result<Self> {
        let pdf = pdf.ok_or_else(|| ResizeError::invalid_input("no PDF file was provided"))?;

        let scale = match zoom.map(str::trim).filter(|z| !z.is_empty()) {
            Some(z) => z.parse()?,
            None => ScaleFactor::new(default_zoom)?,
        };

        Ok(Self {
            pdf,
            scale,
            compression: CompressionProfile::from_form_value(compression),
        })
    }
}
