//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each worker,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AnalysisConfig, AppConfig, CameraConfig, CommandConfig, SpeechConfig, UiConfig, VoiceConfig,
    MAX_FRAME_QUEUE,
};
