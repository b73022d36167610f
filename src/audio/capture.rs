//! Microphone capture via `cpal`.
//!
//! [`Microphone`] is the pull interface the speech recognizer reads from:
//! each [`read`](Microphone::read) returns the next block of 16 kHz mono
//! samples, or `None` if nothing arrived within the timeout.
//!
//! [`CpalMicrophone`] wraps the cpal host/device/stream lifecycle.  The cpal
//! callback runs on the audio thread and forwards raw [`AudioChunk`]s over a
//! `std::sync::mpsc` channel; `read` downmixes and resamples them on the
//! caller's thread.  Dropping the microphone stops the stream.
//!
//! `cpal::Stream` is `!Send` on some platforms, so a `CpalMicrophone` must be
//! opened on the thread that will use it.

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::resample::{resample_to_16k, stereo_to_mono};

/// Sample rate of everything a [`Microphone`] hands out.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

impl AudioChunk {
    /// Downmix and resample to 16 kHz mono.
    pub fn to_mono_16k(&self) -> Vec<f32> {
        let mono = stereo_to_mono(&self.samples, self.channels);
        resample_to_16k(&mono, self.sample_rate)
    }
}

// ---------------------------------------------------------------------------
// MicrophoneError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MicrophoneError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The audio callback went away (device unplugged, stream torn down).
    #[error("microphone disconnected")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// Microphone trait
// ---------------------------------------------------------------------------

/// Blocking source of 16 kHz mono audio.
pub trait Microphone {
    /// Always [`TARGET_SAMPLE_RATE`] for implementations in this crate.
    fn sample_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    /// Wait up to `timeout` for the next block of samples.
    ///
    /// `Ok(None)` means nothing arrived in time; it is not an error.
    fn read(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, MicrophoneError>;
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// The system default input device.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use emotion_assistant::audio::{CpalMicrophone, Microphone};
///
/// let mut mic = CpalMicrophone::open().unwrap();
/// if let Some(block) = mic.read(Duration::from_millis(100)).unwrap() {
///     println!("{} samples @ 16 kHz", block.len());
/// }
/// ```
pub struct CpalMicrophone {
    rx: mpsc::Receiver<AudioChunk>,
    /// Keeps the hardware stream alive; dropped with the microphone.
    _stream: cpal::Stream,
    native_rate: u32,
    channels: u16,
}

impl CpalMicrophone {
    /// Open the default input device and start streaming.
    ///
    /// # Errors
    ///
    /// [`MicrophoneError::NoDevice`] when no input device is available, or a
    /// cpal error when the platform rejects the stream configuration.
    pub fn open() -> Result<Self, MicrophoneError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(MicrophoneError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let native_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate: native_rate,
                    channels,
                };
                // Receiver gone means the microphone is being dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("microphone: cpal stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::info!(
            "microphone: opened {} ({native_rate} Hz, {channels} ch)",
            device.name().unwrap_or_else(|_| "default input".into())
        );

        Ok(Self {
            rx,
            _stream: stream,
            native_rate,
            channels,
        })
    }

    /// Native rate reported by the device, before resampling.
    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Microphone for CpalMicrophone {
    fn read(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, MicrophoneError> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Ok(Some(chunk.to_mono_16k())),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(MicrophoneError::Disconnected),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeMicrophone  (test-only)
// ---------------------------------------------------------------------------

/// Replays scripted blocks; reports silence-timeouts once exhausted.
#[cfg(test)]
pub struct FakeMicrophone {
    blocks: std::collections::VecDeque<Vec<f32>>,
    disconnect_when_empty: bool,
}

#[cfg(test)]
impl FakeMicrophone {
    pub fn new(blocks: Vec<Vec<f32>>) -> Self {
        Self {
            blocks: blocks.into(),
            disconnect_when_empty: false,
        }
    }

    /// Like [`new`](Self::new) but fails with `Disconnected` once drained.
    pub fn disconnecting(blocks: Vec<Vec<f32>>) -> Self {
        Self {
            blocks: blocks.into(),
            disconnect_when_empty: true,
        }
    }

    /// `n` blocks of `len` samples at constant `level`.
    pub fn constant(level: f32, len: usize, n: usize) -> Vec<Vec<f32>> {
        vec![vec![level; len]; n]
    }
}

#[cfg(test)]
impl Microphone for FakeMicrophone {
    fn read(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, MicrophoneError> {
        match self.blocks.pop_front() {
            Some(block) => Ok(Some(block)),
            None if self.disconnect_when_empty => Err(MicrophoneError::Disconnected),
            None => {
                // Behave like a quiet device instead of spinning the caller.
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn chunk_converts_stereo_48k_to_mono_16k() {
        let chunk = AudioChunk {
            samples: vec![0.25_f32; 960], // 480 stereo frames @ 48 kHz = 10 ms
            sample_rate: 48_000,
            channels: 2,
        };
        let out = chunk.to_mono_16k();
        assert!((out.len() as i64 - 160).abs() <= 1, "got {}", out.len());
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-5));
    }

    #[test]
    fn fake_microphone_times_out_then_disconnects() {
        let mut quiet = FakeMicrophone::new(vec![vec![0.0; 4]]);
        assert!(quiet.read(Duration::ZERO).unwrap().is_some());
        assert!(quiet.read(Duration::ZERO).unwrap().is_none());

        let mut dying = FakeMicrophone::disconnecting(Vec::new());
        assert!(matches!(
            dying.read(Duration::ZERO),
            Err(MicrophoneError::Disconnected)
        ));
    }

    #[test]
    fn default_sample_rate_is_16k() {
        let mic = FakeMicrophone::new(Vec::new());
        assert_eq!(mic.sample_rate(), 16_000);
    }
}
