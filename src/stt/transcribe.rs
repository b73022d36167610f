//! Whisper decoding parameters and transcript clean-up.

use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Owned, `Clone` mirror of `whisper_rs::SamplingStrategy`.
///
/// Greedy is the right choice for short spoken commands; beam search buys
/// little accuracy on a five-second phrase and costs several times the
/// latency.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy { best_of: i32 },
    BeamSearch { beam_size: i32, patience: f32 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Settings for one Whisper inference run.
///
/// ```
/// use emotion_assistant::config::SpeechConfig;
/// use emotion_assistant::stt::TranscribeParams;
///
/// let params = TranscribeParams::from_config(&SpeechConfig::default());
/// assert_eq!(params.language, "en");
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` for Whisper's own detection.
    pub language: String,
    pub strategy: SamplingStrategy,
    pub n_threads: i32,
    /// Silence whisper.cpp's progress output on stderr.
    pub suppress_progress: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
        }
    }
}

impl TranscribeParams {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            language: config.language.clone(),
            ..Self::default()
        }
    }
}

/// Inference threads: available parallelism capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Transcript clean-up
// ---------------------------------------------------------------------------

/// `true` when a transcript holds no words.
///
/// Whisper fills non-speech with bracketed annotations such as
/// `[BLANK_AUDIO]`, `(silence)` or `[Music]`; a transcript made only of
/// those (plus punctuation and whitespace) counts as blank.
pub fn is_blank(text: &str) -> bool {
    let mut depth = 0u32;
    for c in text.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && c.is_alphanumeric() => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_markers_are_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("[BLANK_AUDIO]"));
        assert!(is_blank(" (silence) "));
        assert!(is_blank("[Music] [Applause]"));
        assert!(is_blank("..."));
    }

    #[test]
    fn words_are_not_blank() {
        assert!(!is_blank("hello"));
        assert!(!is_blank("[BLANK_AUDIO] hi"));
        assert!(!is_blank("What do you see?"));
    }

    #[test]
    fn params_follow_config_language() {
        let config = SpeechConfig {
            language: "auto".into(),
            ..SpeechConfig::default()
        };
        assert_eq!(TranscribeParams::from_config(&config).language, "auto");
    }

    #[test]
    fn optimal_threads_is_within_bounds() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }
}
