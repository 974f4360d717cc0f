//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\storyweaver\
//!   macOS:   ~/Library/Application Support/storyweaver/
//!   Linux:   ~/.config/storyweaver/
//!
//! Data dir (Whisper models):
//!   Windows: %LOCALAPPDATA%\storyweaver\
//!   macOS:   ~/Library/Application Support/storyweaver/
//!   Linux:   ~/.local/share/storyweaver/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "storyweaver";

    /// Resolves all paths using the `dirs` crate, falling back to the current
    /// directory when the platform provides no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_dir.join("models"),
        }
    }

    /// Location of the GGML file for a Whisper model size such as `"base"`.
    pub fn whisper_model(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{model}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
