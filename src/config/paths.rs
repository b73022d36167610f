//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir (`settings.toml`):
//!   Windows: %APPDATA%\emotion-assistant\
//!   macOS:   ~/Library/Application Support/emotion-assistant/
//!   Linux:   ~/.config/emotion-assistant/
//!
//! Data dir (Whisper models):
//!   Windows: %LOCALAPPDATA%\emotion-assistant\models\
//!   macOS:   ~/Library/Application Support/emotion-assistant/models/
//!   Linux:   ~/.local/share/emotion-assistant/models/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "emotion-assistant";

    /// Resolves all paths, falling back to the current directory if the
    /// platform cannot provide a standard location.
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

    /// Path of the GGML file for a model stem such as `"ggml-base.en"`.
    pub fn model_file(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("{model}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
