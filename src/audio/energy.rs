//! Energy-based speech detection.
//!
//! [`EnergyDetector`] decides whether a block of 16 kHz mono audio contains
//! speech by comparing its RMS amplitude to a threshold.  The threshold is
//! normally learned once at startup from ambient noise via
//! [`EnergyDetector::calibrate`]:
//!
//! ```text
//! threshold = max(rms(ambient) × ratio, floor)
//! ```
//!
//! The floor keeps a dead-silent room (or a muted mic) from producing a
//! threshold so low that every click counts as speech.

/// Root-mean-square amplitude of `samples`; `0.0` for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

/// Speech/silence classifier over RMS energy.
///
/// ```rust
/// use emotion_assistant::audio::EnergyDetector;
///
/// let ambient = vec![0.004_f32; 16_000];
/// let det = EnergyDetector::calibrate(&ambient, 1.5, 0.01);
/// assert!((det.threshold() - 0.01).abs() < 1e-6); // floor wins
///
/// assert!(det.is_speech(&[0.3; 480]));
/// assert!(!det.is_speech(&[0.002; 480]));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyDetector {
    threshold: f32,
    /// Analysis window for [`trim_silence`](Self::trim_silence), in samples.
    frame_size: usize,
}

impl EnergyDetector {
    /// 30 ms at 16 kHz.
    pub const DEFAULT_FRAME: usize = 480;

    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            frame_size: Self::DEFAULT_FRAME,
        }
    }

    /// Derive the threshold from a sample of ambient noise.
    pub fn calibrate(ambient: &[f32], ratio: f32, floor: f32) -> Self {
        let level = rms(ambient) * ratio;
        Self::new(level.max(floor))
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// `true` when the block's RMS is strictly above the threshold.
    pub fn is_speech(&self, block: &[f32]) -> bool {
        !block.is_empty() && rms(block) > self.threshold
    }

    /// Cut leading and trailing silent frames.
    ///
    /// Returns a sub-slice; an all-silent clip yields an empty slice.
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let frames: Vec<&[f32]> = audio.chunks(self.frame_size).collect();

        let Some(first) = frames.iter().position(|f| self.is_speech(f)) else {
            return &audio[..0];
        };
        let last = frames
            .iter()
            .rposition(|f| self.is_speech(f))
            .unwrap_or(first);

        let start = first * self.frame_size;
        let end = ((last + 1) * self.frame_size).min(audio.len());
        &audio[start..end]
    }
}
