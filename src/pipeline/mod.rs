//! Pipeline coordination: queues, shared state, wiring and the display cycle.
//!
//! # Architecture
//!
//! ```text
//! UI thread (eframe)                 tokio runtime                      std thread
//! ──────────────────                 ─────────────                      ──────────
//! FrameCycle::step ──frames──▶ EmotionAnalyzer
//!        ▲                        │         │
//!        └──── overlay results ───┘         └─ command results ─▶ CommandProcessor ◀─ utterances ─ SpeechListener
//!        ▲                                                              │                               │
//!        └────────────────────────── heard text (watch) ────────────────┼───────────────────────────────┘
//!                                                                       ▼
//!                                                               ResponseSpeaker
//!
//! PipelineState (Arc): running flag · last emotion · last response time
//! ```
//!
//! Every queue is a bounded [`SheddingQueue`]: producers never block, a full
//! queue sheds according to its [`Overflow`] policy.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use emotion_assistant::audio::{Microphone, MicrophoneError};
//! use emotion_assistant::config::AppConfig;
//! use emotion_assistant::pipeline::{Capabilities, Pipeline};
//! use emotion_assistant::tts::SystemVoice;
//! use emotion_assistant::vision::{DeepFaceClient, SnapshotCamera};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let config = AppConfig::default();
//! let camera = SnapshotCamera::open(&config.camera).unwrap();
//!
//! let caps = Capabilities {
//!     model: Arc::new(DeepFaceClient::from_config(&config.analysis)),
//!     stt: None,
//!     synth: Arc::new(SystemVoice::from_config(&config.voice)),
//!     open_mic: Box::new(|| Err::<Box<dyn Microphone>, _>(MicrophoneError::NoDevice)),
//! };
//! let (mut pipeline, mut cycle) = Pipeline::start(rt.handle(), &config, caps, Box::new(camera));
//!
//! while !cycle.should_exit(false) {
//!     match cycle.step(std::time::Instant::now()) {
//!         Ok(_output) => { /* draw */ }
//!         Err(_) => break,
//!     }
//! }
//! pipeline.shutdown();
//! cycle.release();
//! ```

pub mod display;
pub mod queue;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use display::{CycleOutput, FrameCycle};
pub use queue::{Overflow, Push, SheddingQueue};
pub use runner::{Capabilities, Pipeline};
pub use state::{new_shared_state, PipelineState, SharedState};
