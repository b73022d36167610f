//! Microphone side of the pipeline.
//!
//! ```text
//! cpal callback → AudioChunk (std mpsc) → stereo_to_mono → resample_to_16k
//!              → Microphone::read() → EnergyDetector (speech / silence)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use emotion_assistant::audio::{CpalMicrophone, EnergyDetector, Microphone};
//!
//! let mut mic = CpalMicrophone::open().unwrap();
//! let detector = EnergyDetector::new(0.01);
//! while let Ok(Some(block)) = mic.read(Duration::from_secs(1)) {
//!     println!("speech: {}", detector.is_speech(&block));
//! }
//! ```

pub mod capture;
pub mod energy;
pub mod resample;

pub use capture::{AudioChunk, CpalMicrophone, Microphone, MicrophoneError, TARGET_SAMPLE_RATE};
pub use energy::{rms, EnergyDetector};
pub use resample::{resample, resample_to_16k, stereo_to_mono};

#[cfg(test)]
pub use capture::FakeMicrophone;
