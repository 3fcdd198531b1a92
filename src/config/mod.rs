pub mod request;
pub mod settings;

use settings::Settings;
use std::path::Path;

/// Loads `settings.yaml` from `dir`.
///
/// Returns the default settings when the directory has no `settings.yaml`.
pub fn load_settings(dir: &Path) -> crate::error::Result<Settings> {
    let settings_path = dir.join("settings.yaml");

    if settings_path.exists() {
        Settings::from_file(&settings_path)
    } else {
        Ok(Settings::default())
    }
}

/// Loads the settings that apply to an input document: `settings.yaml` in
/// the same directory, or defaults.
pub fn load_settings_for_input(input_path: &Path) -> crate::error::Result<Settings> {
    let dir = input_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    load_settings(dir)
}
