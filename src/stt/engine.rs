//! Speech-to-text engine trait and the whisper.cpp implementation.
//!
//! [`SttEngine`] is object-safe and `Send + Sync`, held as
//! `Arc<dyn SttEngine>` by the speech listener.  Its error type separates
//! the outcomes the listener treats differently:
//!
//! | Outcome | Variant | Listener reaction |
//! |---------|---------|-------------------|
//! | words | `Ok(text)` | publish an utterance |
//! | no words | [`SttError::Unintelligible`] | drop quietly |
//! | engine failure | anything else | log a warning, keep listening |

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::stt::transcribe::{is_blank, SamplingStrategy, TranscribeParams};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    /// The audio decoded to nothing but silence or noise markers.
    #[error("speech was not intelligible")]
    Unintelligible,

    #[error("no audio supplied")]
    EmptyAudio,

    /// Longer than [`MAX_AUDIO_SAMPLES`].
    #[error("audio too long (maximum 30 s at 16 kHz)")]
    AudioTooLong,
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Blocking transcription of **16 kHz mono f32** audio.
///
/// Callers on an async runtime should go through `spawn_blocking`.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

/// whisper.cpp rejects clips under one second; shorter phrases are padded
/// with trailing silence.
pub const MIN_AUDIO_SAMPLES: usize = 16_000;
/// 30 s at 16 kHz, one Whisper window.
pub const MAX_AUDIO_SAMPLES: usize = 480_000;

fn check_length(audio: &[f32]) -> Result<(), SttError> {
    if audio.is_empty() {
        return Err(SttError::EmptyAudio);
    }
    if audio.len() > MAX_AUDIO_SAMPLES {
        return Err(SttError::AudioTooLong);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// whisper-rs backed engine.  A fresh `WhisperState` is created per call,
/// so one engine can serve any thread without locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: whisper-rs declares WhisperContext Send + Sync; the model weights
// are read-only after loading and every call builds its own state.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] when `model_path` does not exist.
    /// - [`SttError::ContextInit`] when whisper.cpp rejects the file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {} (language {})", path.display(), params.language);
        Ok(Self { ctx, params })
    }

    fn full_params(&self) -> FullParams<'_, '_> {
        use whisper_rs::SamplingStrategy as WS;
        let strategy = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch { beam_size, patience } => {
                WS::BeamSearch { beam_size, patience }
            }
        };

        let mut fp = FullParams::new(strategy);
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        // Commands are independent; don't let one bias the next.
        fp.set_no_context(true);
        fp.set_single_segment(true);
        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
            fp.set_print_special(false);
        }
        fp
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        check_length(audio)?;

        let padded;
        let audio = if audio.len() < MIN_AUDIO_SAMPLES {
            let mut v = audio.to_vec();
            v.resize(MIN_AUDIO_SAMPLES, 0.0);
            padded = v;
            &padded[..]
        } else {
            audio
        };

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;
        state
            .full(self.full_params(), audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        let text = text.trim();
        if is_blank(text) {
            return Err(SttError::Unintelligible);
        }
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns a fixed answer per call without loading a model; enforces the
/// same length contract as [`WhisperEngine`].
#[cfg(test)]
pub struct MockSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, SttError>>>,
    fallback: Result<String, SttError>,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::script(Vec::new(), Ok(text.into()))
    }

    pub fn err(error: SttError) -> Self {
        Self::script(Vec::new(), Err(error))
    }

    /// Answer with `responses` in order, then `fallback` forever.
    pub fn script(
        responses: Vec<Result<String, SttError>>,
        fallback: Result<String, SttError>,
    ) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            fallback,
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        check_length(audio)?;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_text() {
        let engine = MockSttEngine::ok("hello there");
        assert_eq!(engine.transcribe(&[0.1; 800]).unwrap(), "hello there");
    }

    #[test]
    fn mock_script_then_fallback() {
        let engine = MockSttEngine::script(
            vec![Err(SttError::Unintelligible), Ok("bye".into())],
            Err(SttError::Transcription("offline".into())),
        );
        let audio = [0.1; 100];
        assert!(matches!(engine.transcribe(&audio), Err(SttError::Unintelligible)));
        assert_eq!(engine.transcribe(&audio).unwrap(), "bye");
        assert!(matches!(engine.transcribe(&audio), Err(SttError::Transcription(_))));
    }

    #[test]
    fn empty_audio_is_rejected() {
        let engine = MockSttEngine::ok("x");
        assert!(matches!(engine.transcribe(&[]), Err(SttError::EmptyAudio)));
    }

    #[test]
    fn over_long_audio_is_rejected() {
        let engine = MockSttEngine::ok("x");
        let long = vec![0.0; MAX_AUDIO_SAMPLES + 1];
        assert!(matches!(engine.transcribe(&long), Err(SttError::AudioTooLong)));
    }

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperEngine::load("/nonexistent/model.bin", TranscribeParams::default());
        assert!(
            matches!(result, Err(SttError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert!(SttError::ModelNotFound("/m.bin".into()).to_string().contains("/m.bin"));
        assert!(SttError::Unintelligible.to_string().contains("intelligible"));
    }
}
