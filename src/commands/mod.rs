//! Utterance → response dispatch.
//!
//! * [`classify`] / [`respond`]: the fixed command vocabulary.
//! * [`CommandProcessor`]: async worker applying the response cooldown,
//!   tracking the latest emotion, and owning the voice "quit" decision.

pub mod processor;
pub mod taxonomy;

pub use processor::{CommandProcessor, Dispatch};
pub use taxonomy::{classify, respond, Command, Response};
