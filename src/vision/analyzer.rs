//! Emotion analyzer worker.
//!
//! ```text
//! frames (SheddingQueue<Frame>, cap 2, drop-newest)
//!    │  pop  ── or ──  stopped()
//!    ▼
//! EmotionModel::analyze(frame)
//!    ├─ Ok(faces) → Some(AnalysisResult)
//!    └─ Err(e)    → warn + None
//!    │
//!    ├─▶ command_results (→ CommandProcessor)
//!    └─▶ overlay_results (→ display loop)
//! ```
//!
//! Exactly one outcome is published per analyzed frame.  Both result queues
//! shed their oldest entry when full, so a slow consumer never stalls
//! inference.

use std::sync::Arc;

use crate::pipeline::{SharedState, SheddingQueue};
use crate::vision::emotion::EmotionModel;
use crate::vision::frame::{AnalysisOutcome, AnalysisResult, Frame};

pub struct EmotionAnalyzer {
    state: SharedState,
    frames: SheddingQueue<Frame>,
    command_results: SheddingQueue<AnalysisOutcome>,
    overlay_results: SheddingQueue<AnalysisOutcome>,
    model: Arc<dyn EmotionModel>,
}

impl EmotionAnalyzer {
    pub fn new(
        state: SharedState,
        frames: SheddingQueue<Frame>,
        command_results: SheddingQueue<AnalysisOutcome>,
        overlay_results: SheddingQueue<AnalysisOutcome>,
        model: Arc<dyn EmotionModel>,
    ) -> Self {
        Self {
            state,
            frames,
            command_results,
            overlay_results,
            model,
        }
    }

    /// Run until shutdown is requested.
    ///
    /// An in-flight inference is abandoned when shutdown arrives; its result
    /// would have nobody left to read it.
    pub async fn run(self) {
        log::info!("analyzer: started");

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.state.stopped() => break,
                frame = self.frames.pop() => frame,
            };

            let outcome = tokio::select! {
                biased;
                _ = self.state.stopped() => break,
                outcome = self.analyze(&frame) => outcome,
            };

            self.publish(outcome);
        }

        log::info!("analyzer: stopped");
    }

    async fn analyze(&self, frame: &Frame) -> AnalysisOutcome {
        match self.model.analyze(frame).await {
            Ok(faces) => {
                log::trace!("analyzer: frame {} -> {} face(s)", frame.sequence, faces.len());
                Some(AnalysisResult::new(frame.sequence, faces))
            }
            Err(e) => {
                log::warn!("analyzer: frame {} failed: {e}", frame.sequence);
                None
            }
        }
    }

    fn publish(&self, outcome: AnalysisOutcome) {
        self.command_results.push(outcome.clone());
        self.overlay_results.push(outcome);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
