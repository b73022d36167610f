//! Channel mixing and sample-rate conversion.
//!
//! Whisper and the energy detector both work on **16 kHz mono `f32`**.
//! Microphones usually deliver 44.1 or 48 kHz, often stereo.  Linear
//! interpolation is plenty for speech at these rates.

/// Mix interleaved multi-channel audio to mono by averaging each frame.
///
/// A trailing partial frame is dropped.  `channels == 0` yields nothing.
///
/// ```rust
/// use emotion_assistant::audio::stereo_to_mono;
///
/// let mono = stereo_to_mono(&[0.6, 0.2, -0.4, 0.0], 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.4).abs() < 1e-6);
/// assert!((mono[1] + 0.2).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let n = channels as usize;
    match n {
        0 => Vec::new(),
        1 => samples.to_vec(),
        _ => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Convert mono `samples` from `from` Hz to `to` Hz.
///
/// Output length is `ceil(len * to / from)`.  Equal rates copy the input.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 {
        return samples.to_vec();
    }
    let Some(&last) = samples.last() else {
        return Vec::new();
    };

    let step = from as f64 / to as f64;
    let out_len = (samples.len() as f64 / step).ceil() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => {
                    let t = (pos - idx as f64) as f32;
                    a + (b - a) * t
                }
                (Some(&a), None) => a,
                _ => last,
            }
        })
        .collect()
}

/// [`resample`] to 16 kHz.
///
/// ```rust
/// use emotion_assistant::audio::resample_to_16k;
///
/// assert_eq!(resample_to_16k(&[0.5; 480], 48_000).len(), 160);
/// ```
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    resample(samples, source_rate, 16_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passes_through() {
        assert_eq!(stereo_to_mono(&[0.1, 0.2, 0.3], 1), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let out = stereo_to_mono(&[0.2, 0.4, 0.9], 2);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn zero_channels_is_empty() {
        assert!(stereo_to_mono(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn same_rate_is_a_copy() {
        let input: Vec<f32> = (0..32).map(|i| i as f32).collect();
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn empty_stays_empty() {
        assert!(resample_to_16k(&[], 44_100).is_empty());
    }

    #[test]
    fn one_second_at_44k1_becomes_one_second_at_16k() {
        let out = resample_to_16k(&vec![0.0; 44_100], 44_100);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn upsampling_interpolates_between_samples() {
        let out = resample(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        // Past the last input sample the signal holds its final value.
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dc_level_survives_downsampling() {
        assert!(resample_to_16k(&[0.5; 960], 48_000)
            .iter()
            .all(|s| (s - 0.5).abs() < 1e-5));
    }
}
