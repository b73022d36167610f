//! Speech listener worker.
//!
//! Runs on its own OS thread because both halves of its loop block: the
//! microphone read and the Whisper inference.
//!
//! ```text
//! open microphone ─▶ calibrate ambient noise (once)
//!        │
//!        ▼
//! ┌─ while running ─────────────────────────────────────────────┐
//! │  Recognizer::listen (≤ listen_timeout to start, ≤ phrase cap) │
//! │    ├─ WaitTimeout          → loop (cancellation checkpoint)   │
//! │    └─ clip → SttEngine::transcribe                            │
//! │         ├─ Unintelligible  → loop                             │
//! │         ├─ other error     → warn, loop                       │
//! │         └─ text            → utterances queue + heard cache   │
//! └───────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//! drop microphone (stream stops)
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tokio::sync::watch;

use crate::audio::{Microphone, MicrophoneError};
use crate::config::SpeechConfig;
use crate::pipeline::{SharedState, SheddingQueue};
use crate::speech::recognizer::{ListenError, ListenParams, Recognizer};
use crate::stt::{SttEngine, SttError};

/// Opens the microphone on the listener thread.
pub type MicrophoneOpener =
    Box<dyn FnOnce() -> Result<Box<dyn Microphone>, MicrophoneError> + Send>;

/// Last recognized text, for display.  Writing never consumes anything the
/// command processor will read.
pub type HeardText = watch::Sender<Option<String>>;

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// Recognized text plus when it was recognized.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub heard_at: Instant,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heard_at: Instant::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechListener
// ---------------------------------------------------------------------------

pub struct SpeechListener {
    state: SharedState,
    stt: Arc<dyn SttEngine>,
    utterances: SheddingQueue<Utterance>,
    heard: HeardText,
    config: SpeechConfig,
}

impl SpeechListener {
    pub fn new(
        state: SharedState,
        stt: Arc<dyn SttEngine>,
        utterances: SheddingQueue<Utterance>,
        heard: HeardText,
        config: SpeechConfig,
    ) -> Self {
        Self {
            state,
            stt,
            utterances,
            heard,
            config,
        }
    }

    /// Start the listener on a named thread.
    ///
    /// The microphone is opened, used and dropped entirely on that thread.
    pub fn spawn(self, open_mic: MicrophoneOpener) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("speech-listener".into())
            .spawn(move || self.run(open_mic))
    }

    fn run(self, open_mic: MicrophoneOpener) {
        let mut mic = match open_mic() {
            Ok(mic) => mic,
            Err(e) => {
                log::error!("listener: could not open microphone: {e}; speech input disabled");
                return;
            }
        };

        let recognizer = match Recognizer::calibrate(
            mic.as_mut(),
            self.config.ambient_calibration(),
            self.config.energy_ratio,
            self.config.min_energy,
            ListenParams::from_config(&self.config),
        ) {
            Ok(r) => r,
            Err(e) => {
                log::error!("listener: microphone failed during calibration: {e}");
                return;
            }
        };

        log::info!("listener: started");
        while self.state.is_running() {
            if self.listen_once(&recognizer, mic.as_mut()).is_break() {
                break;
            }
        }

        drop(mic);
        log::info!("listener: stopped");
    }

    /// One listen → transcribe → publish round.
    ///
    /// Breaks only when the microphone is gone.
    pub fn listen_once(
        &self,
        recognizer: &Recognizer,
        mic: &mut dyn Microphone,
    ) -> ControlFlow<()> {
        let clip = match recognizer.listen(mic) {
            Ok(clip) => clip,
            Err(ListenError::WaitTimeout) => {
                log::trace!("listener: no speech");
                return ControlFlow::Continue(());
            }
            Err(ListenError::Microphone(e)) => {
                log::error!("listener: {e}");
                return ControlFlow::Break(());
            }
        };

        // Shutdown may have arrived while the phrase was being recorded.
        if !self.state.is_running() {
            return ControlFlow::Continue(());
        }

        match self.stt.transcribe(&clip) {
            Ok(text) => {
                log::info!("listener: heard {text:?}");
                self.publish(text);
            }
            Err(SttError::Unintelligible) | Err(SttError::EmptyAudio) => {
                log::debug!("listener: could not understand audio");
            }
            Err(e) => {
                log::warn!("listener: speech recognition failed: {e}");
            }
        }
        ControlFlow::Continue(())
    }

    fn publish(&self, text: String) {
        self.heard.send_replace(Some(text.clone()));
        self.utterances.push(Utterance::new(text));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::audio::{EnergyDetector, FakeMicrophone};
    use crate::pipeline::{new_shared_state, Overflow};
    use crate::stt::MockSttEngine;

    const BLOCK: usize = 1_920;

    fn config() -> SpeechConfig {
        SpeechConfig {
            listen_timeout_ms: 30,
            phrase_time_limit_ms: 1_000,
            pause_threshold_ms: 200,
            ambient_calibration_ms: 120,
            ..SpeechConfig::default()
        }
    }

    struct Harness {
        state: SharedState,
        utterances: SheddingQueue<Utterance>,
        heard: watch::Receiver<Option<String>>,
        listener: SpeechListener,
    }

    fn harness(stt: MockSttEngine) -> Harness {
        let state = new_shared_state();
        let utterances = SheddingQueue::new(8, Overflow::DropOldest);
        let (heard_tx, heard) = watch::channel(None);
        let listener = SpeechListener::new(
            Arc::clone(&state),
            Arc::new(stt),
            utterances.clone(),
            heard_tx,
            config(),
        );
        Harness {
            state,
            utterances,
            heard,
            listener,
        }
    }

    fn recognizer() -> Recognizer {
        Recognizer::new(EnergyDetector::new(0.05), ListenParams::from_config(&config()))
    }

    /// One phrase: `n` loud blocks followed by a full pause.
    fn phrase(n: usize) -> Vec<Vec<f32>> {
        let mut blocks = FakeMicrophone::constant(0.4, BLOCK, n);
        blocks.extend(FakeMicrophone::constant(0.0, BLOCK, 2));
        blocks
    }

    #[test]
    fn recognized_text_is_published_to_queue_and_cache() {
        let h = harness(MockSttEngine::ok("hello there"));
        let mut mic = FakeMicrophone::new(phrase(3));

        assert!(h.listener.listen_once(&recognizer(), &mut mic).is_continue());

        let utterance = h.utterances.try_pop().expect("one utterance");
        assert_eq!(utterance.text, "hello there");
        assert_eq!(h.heard.borrow().as_deref(), Some("hello there"));
    }

    #[test]
    fn timeout_publishes_nothing() {
        let h = harness(MockSttEngine::ok("never"));
        let mut mic = FakeMicrophone::new(Vec::new());

        assert!(h.listener.listen_once(&recognizer(), &mut mic).is_continue());
        assert!(h.utterances.is_empty());
        assert!(h.heard.borrow().is_none());
    }

    #[test]
    fn unintelligible_and_service_errors_keep_listening() {
        let h = harness(MockSttEngine::script(
            vec![
                Err(SttError::Unintelligible),
                Err(SttError::Transcription("offline".into())),
            ],
            Ok("third time lucky".into()),
        ));
        let mut blocks = phrase(2);
        blocks.extend(phrase(2));
        blocks.extend(phrase(2));
        let mut mic = FakeMicrophone::new(blocks);
        let rec = recognizer();

        for _ in 0..3 {
            assert!(h.listener.listen_once(&rec, &mut mic).is_continue());
        }

        assert_eq!(h.utterances.len(), 1);
        assert_eq!(h.utterances.try_pop().unwrap().text, "third time lucky");
    }

    #[test]
    fn microphone_loss_ends_the_worker() {
        let h = harness(MockSttEngine::ok("x"));
        let mut mic = FakeMicrophone::disconnecting(Vec::new());
        assert!(h.listener.listen_once(&recognizer(), &mut mic).is_break());
    }

    #[test]
    fn phrase_finishing_after_shutdown_is_not_transcribed() {
        let h = harness(MockSttEngine::ok("too late"));
        h.state.request_shutdown();
        let mut mic = FakeMicrophone::new(phrase(2));

        assert!(h.listener.listen_once(&recognizer(), &mut mic).is_continue());
        assert!(h.utterances.is_empty());
    }

    #[test]
    fn spawned_listener_stops_on_shutdown() {
        let h = harness(MockSttEngine::ok("hi"));
        let state = Arc::clone(&h.state);
        let utterances = h.utterances.clone();

        let mut blocks = FakeMicrophone::constant(0.0, BLOCK, 1); // ambient
        blocks.extend(phrase(2));
        let handle = h
            .listener
            .spawn(Box::new(move || {
                Ok::<Box<dyn Microphone>, MicrophoneError>(Box::new(FakeMicrophone::new(blocks)))
            }))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while utterances.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(utterances.try_pop().map(|u| u.text).as_deref(), Some("hi"));

        state.request_shutdown();
        handle.join().expect("listener thread should not panic");
    }

    #[test]
    fn failing_microphone_open_ends_quietly() {
        let h = harness(MockSttEngine::ok("x"));
        let handle = h
            .listener
            .spawn(Box::new(|| Err::<Box<dyn Microphone>, _>(MicrophoneError::NoDevice)))
            .unwrap();
        handle.join().unwrap();
        assert!(h.state.is_running(), "mic failure alone must not stop the pipeline");
    }
}
