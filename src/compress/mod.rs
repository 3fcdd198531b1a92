pub mod ghostscript;

use crate::config::request::CompressionProfile;

pub use ghostscript::GhostscriptCompressor;

/// Rewrites a serialized PDF with a lossy quality profile.
///
/// The pipeline never calls a compressor with [`CompressionProfile::None`].
pub trait Compressor: Send + Sync {
    fn compress(&self, pdf: &[u8], profile: CompressionProfile) -> crate::error::Result<Vec<u8>>;
}

/// Ghostscript `-dPDFSETTINGS` value for a profile.
pub fn pdf_settings(profile: CompressionProfile) -> Option<&'static str> {
    match profile {
        CompressionProfile::None => None,
        CompressionProfile::Screen => Some("/screen"),
        CompressionProfile::Ebook => Some("/ebook"),
        CompressionProfile::Printer => Some("/printer"),
    }
}
