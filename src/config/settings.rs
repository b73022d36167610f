//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to worker
//! threads by value.  Every field carries `#[serde(default)]` at the struct
//! level so a partially written `settings.toml` still loads.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// Settings for the frame source.
///
/// The camera is any device that serves still JPEG/PNG snapshots over HTTP
/// (IP cameras, phone webcam apps, `mjpg-streamer`'s `?action=snapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// URL that returns one encoded still image per GET request.
    pub snapshot_url: String,
    /// Per-request timeout.  A read that exceeds it is treated as the device
    /// having stopped producing frames.
    pub request_timeout_ms: u64,
    /// Frame width delivered to the pipeline; snapshots of another size are
    /// rescaled.  `0` keeps the native size.
    pub width: u32,
    /// Frame height delivered to the pipeline.  `0` keeps the native size.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            snapshot_url: "http://127.0.0.1:8080/shot.jpg".into(),
            request_timeout_ms: 2_000,
            width: 640,
            height: 480,
        }
    }
}

impl CameraConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Settings for the emotion-inference service and the analysis queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// DeepFace-compatible `POST /analyze` endpoint.
    pub endpoint: String,
    /// Face detector the service should use (e.g. `"opencv"`, `"retinaface"`).
    pub detector_backend: String,
    /// When `false` the service must return a result even if no face is
    /// found.  Leave this off; the pipeline relies on it.
    pub enforce_detection: bool,
    /// Maximum seconds to wait for one analysis.
    pub timeout_secs: u64,
    /// Frames buffered between the display loop and the analyzer.
    pub frame_queue_capacity: usize,
    /// Results buffered per consumer before the oldest is shed.
    pub result_queue_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5005/analyze".into(),
            detector_backend: "opencv".into(),
            enforce_detection: false,
            timeout_secs: 10,
            frame_queue_capacity: MAX_FRAME_QUEUE,
            result_queue_capacity: 4,
        }
    }
}

/// The analysis queue never holds more frames than this.
pub const MAX_FRAME_QUEUE: usize = 2;

impl AnalysisConfig {
    /// Frame queue capacity, clamped to `1..=MAX_FRAME_QUEUE`.
    pub fn frame_capacity(&self) -> usize {
        self.frame_queue_capacity.clamp(1, MAX_FRAME_QUEUE)
    }

    /// Per-consumer result queue capacity, at least 1.
    pub fn result_capacity(&self) -> usize {
        self.result_queue_capacity.max(1)
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the microphone listener and the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// GGML model file stem inside the models directory.
    pub model: String,
    /// ISO-639-1 language code, or `"auto"`.
    pub language: String,
    /// How long one listen waits for speech to start.  This is also the
    /// longest the listener goes without checking for shutdown.
    pub listen_timeout_ms: u64,
    /// Hard cap on the length of one phrase.
    pub phrase_time_limit_ms: u64,
    /// Continuous silence that ends a phrase early.
    pub pause_threshold_ms: u64,
    /// Ambient audio sampled at startup to set the speech threshold.
    pub ambient_calibration_ms: u64,
    /// Speech threshold = ambient RMS × `energy_ratio`.
    pub energy_ratio: f32,
    /// Lower bound for the speech threshold (RMS, 0.0 – 1.0).
    pub min_energy: f32,
    /// Utterances buffered before the oldest is shed.
    pub utterance_queue_capacity: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base.en".into(),
            language: "en".into(),
            listen_timeout_ms: 1_000,
            phrase_time_limit_ms: 5_000,
            pause_threshold_ms: 800,
            ambient_calibration_ms: 1_000,
            energy_ratio: 1.5,
            min_energy: 0.01,
            utterance_queue_capacity: 8,
        }
    }
}

impl SpeechConfig {
    /// Utterance queue capacity, at least 1.
    pub fn utterance_capacity(&self) -> usize {
        self.utterance_queue_capacity.max(1)
    }

    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn phrase_time_limit(&self) -> Duration {
        Duration::from_millis(self.phrase_time_limit_ms)
    }

    pub fn pause_threshold(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }

    pub fn ambient_calibration(&self) -> Duration {
        Duration::from_millis(self.ambient_calibration_ms)
    }
}

// ---------------------------------------------------------------------------
// CommandConfig
// ---------------------------------------------------------------------------

/// Settings for the command processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Minimum seconds between two non-quit responses.
    pub cooldown_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self { cooldown_secs: 5 }
    }
}

impl CommandConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// Settings for spoken responses.
///
/// The synthesizer is an external program that reads the text to speak from
/// stdin and exits once playback has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed before the text is written to stdin.
    pub args: Vec<String>,
    /// Responses buffered before the oldest is shed.
    pub response_queue_capacity: usize,
    /// How long the speaker may keep draining queued responses after
    /// shutdown has been requested.
    pub drain_grace_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let (program, args) = default_voice_command();
        Self {
            program,
            args,
            response_queue_capacity: 8,
            drain_grace_ms: 3_000,
        }
    }
}

impl VoiceConfig {
    /// Response queue capacity, at least 1.
    pub fn response_capacity(&self) -> usize {
        self.response_queue_capacity.max(1)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

#[cfg(target_os = "macos")]
fn default_voice_command() -> (String, Vec<String>) {
    ("say".into(), vec!["-f".into(), "-".into()])
}

#[cfg(target_os = "windows")]
fn default_voice_command() -> (String, Vec<String>) {
    (
        "powershell".into(),
        vec![
            "-NoProfile".into(),
            "-Command".into(),
            "Add-Type -AssemblyName System.Speech; \
             (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak([Console]::In.ReadToEnd())"
                .into(),
        ],
    )
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_voice_command() -> (String, Vec<String>) {
    ("espeak".into(), vec!["--stdin".into()])
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Display window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub window_title: String,
    /// Key that ends the session (egui key name, e.g. `"Q"`, `"Escape"`).
    pub quit_key: String,
    /// How long shutdown waits for each worker before reporting it as stuck.
    pub shutdown_grace_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_title: "Emotion Recognition with Voice".into(),
            quit_key: "Q".into(),
            shutdown_grace_ms: 2_000,
        }
    }
}

impl UiConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use emotion_assistant::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub analysis: AnalysisConfig,
    pub speech: SpeechConfig,
    pub commands: CommandConfig,
    pub voice: VoiceConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.clamp_capacities();
        Ok(config)
    }

    /// Bring every queue capacity into its valid range, warning about each
    /// value that had to change.
    pub fn clamp_capacities(&mut self) {
        let valid = [
            self.analysis.frame_capacity(),
            self.analysis.result_capacity(),
            self.speech.utterance_capacity(),
            self.voice.response_capacity(),
        ];
        let fields = [
            ("analysis.frame_queue_capacity", &mut self.analysis.frame_queue_capacity),
            ("analysis.result_queue_capacity", &mut self.analysis.result_queue_capacity),
            ("speech.utterance_queue_capacity", &mut self.speech.utterance_queue_capacity),
            ("voice.response_queue_capacity", &mut self.voice.response_queue_capacity),
        ];

        for ((name, value), valid) in fields.into_iter().zip(valid) {
            if *value != valid {
                log::warn!("config: {name} = {value} is out of range; using {valid}");
                *value = valid;
            }
        }
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
