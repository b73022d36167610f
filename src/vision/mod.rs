//! Video side of the pipeline.
//!
//! * [`CaptureDevice`] / [`SnapshotCamera`]: frame source driven by the
//!   display loop.
//! * [`FpsCounter`]: rolling frames-per-second estimate.
//! * [`EmotionModel`] / [`DeepFaceClient`]: facial emotion inference.
//! * [`EmotionAnalyzer`]: async worker turning queued frames into
//!   [`AnalysisResult`]s.

pub mod analyzer;
pub mod camera;
pub mod emotion;
pub mod fps;
pub mod frame;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use analyzer::EmotionAnalyzer;
pub use camera::{CaptureDevice, CaptureError, SnapshotCamera};
pub use emotion::{parse_faces, DeepFaceClient, EmotionModel, InferenceError};
pub use fps::FpsCounter;
pub use frame::{AnalysisOutcome, AnalysisResult, Annotation, Face, Frame, Region};

#[cfg(test)]
pub use camera::FakeCamera;
#[cfg(test)]
pub use emotion::ScriptedModel;
