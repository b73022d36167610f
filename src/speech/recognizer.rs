//! Phrase capture: turns a continuous microphone stream into one bounded
//! clip per spoken phrase.
//!
//! ```text
//!            listen_timeout                 pause_threshold of silence
//!   ├──── waiting for speech ────┤ ├──── recording ──────────┤
//!   quiet  quiet  quiet  SPEECH  SPEECH  quiet SPEECH quiet quiet  → clip
//!                          └─ phrase starts here       (or phrase_time_limit)
//! ```
//!
//! A [`Recognizer`] only decides *where* a phrase is; turning the clip into
//! text is the STT engine's job.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio::{EnergyDetector, Microphone, MicrophoneError, TARGET_SAMPLE_RATE};
use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// ListenError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ListenError {
    /// Nobody spoke before the listen timeout.  Expected; not a failure.
    #[error("no speech within the listen timeout")]
    WaitTimeout,

    #[error(transparent)]
    Microphone(#[from] MicrophoneError),
}

// ---------------------------------------------------------------------------
// ListenParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenParams {
    /// How long to wait for a phrase to *start*.
    pub listen_timeout: Duration,
    /// Hard cap on phrase length.
    pub phrase_time_limit: Duration,
    /// Continuous silence that ends a phrase.
    pub pause_threshold: Duration,
}

impl ListenParams {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            listen_timeout: config.listen_timeout(),
            phrase_time_limit: config.phrase_time_limit(),
            pause_threshold: config.pause_threshold(),
        }
    }
}

fn samples_for(d: Duration) -> usize {
    (d.as_secs_f64() * TARGET_SAMPLE_RATE as f64).round() as usize
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Recognizer {
    detector: EnergyDetector,
    params: ListenParams,
}

impl Recognizer {
    pub fn new(detector: EnergyDetector, params: ListenParams) -> Self {
        Self { detector, params }
    }

    /// Sample ambient noise for `duration` and derive the speech threshold.
    ///
    /// Stops early if the microphone goes quiet for a whole `duration`;
    /// whatever was collected (possibly nothing) is used.
    pub fn calibrate(
        mic: &mut dyn Microphone,
        duration: Duration,
        ratio: f32,
        floor: f32,
        params: ListenParams,
    ) -> Result<Self, MicrophoneError> {
        let wanted = samples_for(duration);
        let deadline = Instant::now() + duration;
        let mut ambient = Vec::with_capacity(wanted);

        while ambient.len() < wanted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match mic.read(remaining.max(Duration::from_millis(10)))? {
                Some(block) => ambient.extend(block),
                None => break,
            }
            if remaining.is_zero() {
                break;
            }
        }

        let detector = EnergyDetector::calibrate(&ambient, ratio, floor);
        log::info!(
            "recognizer: calibrated on {} ms of ambient audio, threshold {:.4}",
            ambient.len() * 1000 / TARGET_SAMPLE_RATE as usize,
            detector.threshold()
        );
        Ok(Self::new(detector, params))
    }

    pub fn threshold(&self) -> f32 {
        self.detector.threshold()
    }

    /// Capture one phrase.
    ///
    /// # Errors
    ///
    /// [`ListenError::WaitTimeout`] when no speech starts within the listen
    /// timeout; [`ListenError::Microphone`] when the device fails.
    pub fn listen(&self, mic: &mut dyn Microphone) -> Result<Vec<f32>, ListenError> {
        let first = self.wait_for_speech(mic)?;
        let phrase = self.record(mic, first)?;
        Ok(self.detector.trim_silence(&phrase).to_vec())
    }

    fn wait_for_speech(&self, mic: &mut dyn Microphone) -> Result<Vec<f32>, ListenError> {
        let deadline = Instant::now() + self.params.listen_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ListenError::WaitTimeout);
            }
            if let Some(block) = mic.read(remaining)? {
                if self.detector.is_speech(&block) {
                    return Ok(block);
                }
            }
        }
    }

    fn record(&self, mic: &mut dyn Microphone, first: Vec<f32>) -> Result<Vec<f32>, ListenError> {
        let limit = samples_for(self.params.phrase_time_limit);
        let pause = samples_for(self.params.pause_threshold);

        let mut phrase = first;
        let mut silent_run = 0usize;

        while phrase.len() < limit {
            let Some(block) = mic.read(self.params.pause_threshold)? else {
                // A device that delivers nothing for a whole pause is silent.
                break;
            };
            if self.detector.is_speech(&block) {
                silent_run = 0;
            } else {
                silent_run += block.len();
            }
            phrase.extend(block);
            if silent_run >= pause {
                break;
            }
        }

        phrase.truncate(limit);
        Ok(phrase)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FakeMicrophone;

    // 120 ms: a whole number of 30 ms detector frames.
    const BLOCK: usize = 1_920;

    fn params() -> ListenParams {
        ListenParams {
            listen_timeout: Duration::from_millis(50),
            phrase_time_limit: Duration::from_millis(1_000),
            pause_threshold: Duration::from_millis(200),
        }
    }

    fn recognizer() -> Recognizer {
        Recognizer::new(EnergyDetector::new(0.05), params())
    }

    fn blocks(shape: &[(f32, usize)]) -> Vec<Vec<f32>> {
        shape
            .iter()
            .flat_map(|&(level, n)| FakeMicrophone::constant(level, BLOCK, n))
            .collect()
    }

    #[test]
    fn quiet_room_times_out() {
        let mut mic = FakeMicrophone::new(blocks(&[(0.0, 2)]));
        let err = recognizer().listen(&mut mic).unwrap_err();
        assert!(matches!(err, ListenError::WaitTimeout), "got {err:?}");
    }

    #[test]
    fn phrase_ends_after_pause() {
        // 3 blocks of speech, then 2 silent blocks (>= 200 ms pause), then more
        // speech that must not be included.
        let mut mic = FakeMicrophone::new(blocks(&[(0.0, 1), (0.4, 3), (0.0, 2), (0.4, 3)]));
        let clip = recognizer().listen(&mut mic).unwrap();
        assert_eq!(clip.len(), 3 * BLOCK, "trailing silence is trimmed");
    }

    #[test]
    fn phrase_is_capped_at_time_limit() {
        let mut mic = FakeMicrophone::new(blocks(&[(0.4, 20)]));
        let clip = recognizer().listen(&mut mic).unwrap();
        assert_eq!(clip.len(), 16_000);
    }

    #[test]
    fn short_gap_does_not_end_phrase() {
        let mut mic = FakeMicrophone::new(blocks(&[(0.4, 2), (0.0, 1), (0.4, 2), (0.0, 2)]));
        let clip = recognizer().listen(&mut mic).unwrap();
        assert_eq!(clip.len(), 5 * BLOCK);
    }

    #[test]
    fn disconnect_surfaces_as_microphone_error() {
        let mut mic = FakeMicrophone::disconnecting(blocks(&[(0.4, 1)]));
        let err = recognizer().listen(&mut mic).unwrap_err();
        assert!(matches!(err, ListenError::Microphone(MicrophoneError::Disconnected)));
    }

    #[test]
    fn calibration_uses_ambient_level() {
        let mut mic = FakeMicrophone::new(blocks(&[(0.1, 10)]));
        let rec = Recognizer::calibrate(&mut mic, Duration::from_millis(500), 1.5, 0.01, params())
            .unwrap();
        assert!((rec.threshold() - 0.15).abs() < 1e-5, "got {}", rec.threshold());
    }

    #[test]
    fn calibration_on_silent_device_falls_back_to_floor() {
        let mut mic = FakeMicrophone::new(Vec::new());
        let rec = Recognizer::calibrate(&mut mic, Duration::from_millis(20), 1.5, 0.02, params())
            .unwrap();
        assert!((rec.threshold() - 0.02).abs() < 1e-6);
    }
}
