//! Emotion-aware voice assistant.
//!
//! Live camera frames are annotated with the emotions an inference service
//! detects, while a microphone listener turns speech into commands that are
//! answered out loud.
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | queues, shared state, worker wiring, display cycle |
//! | [`vision`] | frames, capture device, emotion model, analyzer worker |
//! | [`audio`] | microphone, resampling, energy-based speech detection |
//! | [`stt`] | Whisper speech-to-text |
//! | [`speech`] | phrase recognizer and listener worker |
//! | [`commands`] | command vocabulary and processor worker |
//! | [`tts`] | speech synthesis and speaker worker |
//! | [`assessment`] | personality questionnaire aggregates |
//! | [`config`] | settings and paths |
//! | [`app`] | eframe display window |

pub mod app;
pub mod assessment;
pub mod audio;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod speech;
pub mod stt;
pub mod tts;
pub mod vision;
