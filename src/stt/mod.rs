//! Speech-to-text.
//!
//! ```text
//! 16 kHz mono f32 ──▶ SttEngine::transcribe ──▶ Ok(text)
//!                          │                 └─▶ Err(Unintelligible)
//!                    WhisperEngine            └─▶ Err(other)  (service failure)
//!                    (whisper-rs, GGML model from AppPaths::models_dir)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use emotion_assistant::config::{AppConfig, AppPaths};
//! use emotion_assistant::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let config = AppConfig::default();
//! let model = AppPaths::new().model_file(&config.speech.model);
//! let engine = WhisperEngine::load(model, TranscribeParams::from_config(&config.speech))
//!     .expect("model missing");
//!
//! let audio = vec![0.0_f32; 16_000];
//! match engine.transcribe(&audio) {
//!     Ok(text) => println!("{text}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, MAX_AUDIO_SAMPLES, MIN_AUDIO_SAMPLES};
pub use transcribe::{is_blank, SamplingStrategy, TranscribeParams};

#[cfg(test)]
pub use engine::MockSttEngine;
