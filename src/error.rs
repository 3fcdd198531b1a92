use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("PDF parse failure: {0}")]
    ParseFailure(String),

    #[error("Render failure: {0}")]
    RenderFailure(String),

    #[error("Invalid scale: {0}")]
    InvalidScale(String),

    #[error("Compression failure: {0}")]
    CompressionFailure(String),

    #[error("Resource failure: {0}")]
    ResourceFailure(String),
}

/// Coarse classification of a [`ResizeError`], suitable for transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ParseFailure,
    RenderFailure,
    InvalidScale,
    CompressionFailure,
    ResourceFailure,
}

/// Generates factory methods for [`ResizeError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl ResizeError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create an invalid input error.
    invalid_input => InvalidInput,
    /// Create a parse failure.
    parse => ParseFailure,
    /// Create a render failure.
    render => RenderFailure,
    /// Create an invalid scale error.
    invalid_scale => InvalidScale,
    /// Create a compression failure.
    compression => CompressionFailure,
    /// Create a resource failure.
    resource => ResourceFailure,
}

impl ResizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ParseFailure(_) => ErrorKind::ParseFailure,
            Self::RenderFailure(_) => ErrorKind::RenderFailure,
            Self::InvalidScale(_) => ErrorKind::InvalidScale,
            Self::CompressionFailure(_) => ErrorKind::CompressionFailure,
            Self::ResourceFailure(_) => ErrorKind::ResourceFailure,
        }
    }

    /// Diagnostic text without the classification prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidInput(m)
            | Self::ParseFailure(m)
            | Self::RenderFailure(m)
            | Self::InvalidScale(m)
            | Self::CompressionFailure(m)
            | Self::ResourceFailure(m) => m,
        }
    }

    /// HTTP-style status code for the error's classification.
    ///
    /// Caller mistakes map to 4xx, a failing compression tool to 502 and
    /// local resource exhaustion to 500.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput | ErrorKind::InvalidScale => 400,
            ErrorKind::ParseFailure | ErrorKind::RenderFailure => 422,
            ErrorKind::CompressionFailure => 502,
            ErrorKind::ResourceFailure => 500,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            status: self.status_code(),
            detail: self.detail().to_string(),
        }
    }
}

/// Serializable form of a [`ResizeError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub status: u16,
    pub detail: String,
}

impl From<lopdf::Error> for ResizeError {
    fn from(e: lopdf::Error) -> Self {
        Self::ParseFailure(e.to_string())
    }
}

impl From<std::io::Error> for ResizeError {
    fn from(e: std::io::Error) -> Self {
        Self::ResourceFailure(e.to_string())
    }
}

impl From<serde_yml::Error> for ResizeError {
    fn from(e: serde_yml::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

#[cfg(feature = "raster")]
impl From<pdfium_render::prelude::PdfiumError> for ResizeError {
    fn from(e: pdfium_render::prelude::PdfiumError) -> Self {
        Self::RenderFailure(e.to_string())
    }
}

impl From<image::ImageError> for ResizeError {
    fn from(e: image::ImageError) -> Self {
        Self::RenderFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResizeError>;
