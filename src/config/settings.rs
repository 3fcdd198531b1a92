use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::request::{DEFAULT_ZOOM, ScalingStrategy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub strategy: ScalingStrategy,
    /// Upper bound on the size of an input document, in bytes.
    pub max_input_bytes: usize,
    /// Upper bound on the pixel count of one flattened page.
    pub max_raster_pixels: u64,
    pub default_zoom: f64,
    /// Directory holding the pdfium shared library.
    pub pdfium_library: Option<PathBuf>,
    pub compression: CompressionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    pub command: String,
    /// Arguments placed before the standard Ghostscript flags.
    pub args: Vec<String>,
    pub compatibility_level: String,
    pub timeout_secs: u64,
    /// Parent directory for per-invocation scratch directories.
    pub temp_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            strategy: ScalingStrategy::default(),
            max_input_bytes: 100 * 1024 * 1024,
            max_raster_pixels: 100_000_000,
            default_zoom: DEFAULT_ZOOM,
            pdfium_library: None,
            compression: CompressionSettings::default(),
        }
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        CompressionSettings {
            command: "gs".to_string(),
            args: Vec::new(),
            compatibility_level: "1.4".to_string(),
            timeout_secs: 120,
            temp_dir: None,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::ResizeError::invalid_input(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
