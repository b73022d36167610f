//! Spoken-command capture: microphone → phrase → text → [`Utterance`].
//!
//! * [`Recognizer`]: energy-gated phrase capture with a listen timeout, a
//!   pause threshold and a phrase length cap.
//! * [`SpeechListener`]: the worker thread that owns the microphone and
//!   feeds the command processor.

pub mod listener;
pub mod recognizer;

pub use listener::{HeardText, MicrophoneOpener, SpeechListener, Utterance};
pub use recognizer::{ListenError, ListenParams, Recognizer};
