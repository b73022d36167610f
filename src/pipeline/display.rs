//! One display-loop cycle, independent of any windowing toolkit.
//!
//! ```text
//! FrameCycle::step(now)
//!   ├─ read one frame from the capture device       (error = fatal)
//!   ├─ tick the FPS counter
//!   ├─ offer the frame to the analysis queue        (drop-newest when full)
//!   ├─ drain overlay results, keep only the newest
//!   └─ read the last-heard cache                    (never consumes)
//! ```
//!
//! The UI layer calls [`step`](FrameCycle::step) once per repaint, draws the
//! returned [`CycleOutput`], and asks [`should_exit`](FrameCycle::should_exit)
//! whether to tear down.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::pipeline::{SharedState, SheddingQueue};
use crate::vision::{
    AnalysisOutcome, AnalysisResult, Annotation, CaptureDevice, CaptureError, FpsCounter, Frame,
};

/// Everything the UI needs to draw one cycle.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub frame: Frame,
    pub annotations: Vec<Annotation>,
    pub fps: f32,
    pub heard: Option<String>,
}

pub struct FrameCycle {
    state: SharedState,
    camera: Option<Box<dyn CaptureDevice>>,
    frames: SheddingQueue<Frame>,
    overlay_results: SheddingQueue<AnalysisOutcome>,
    heard: watch::Receiver<Option<String>>,
    fps: FpsCounter,
    sequence: u64,
    overlay: Option<AnalysisResult>,
}

impl FrameCycle {
    pub fn new(
        state: SharedState,
        camera: Box<dyn CaptureDevice>,
        frames: SheddingQueue<Frame>,
        overlay_results: SheddingQueue<AnalysisOutcome>,
        heard: watch::Receiver<Option<String>>,
    ) -> Self {
        Self {
            state,
            camera: Some(camera),
            frames,
            overlay_results,
            heard,
            fps: FpsCounter::new(Instant::now()),
            sequence: 0,
            overlay: None,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// Any [`CaptureError`]: the device stopped, or was already released.
    pub fn step(&mut self, now: Instant) -> Result<CycleOutput, CaptureError> {
        let camera = self.camera.as_mut().ok_or(CaptureError::Released)?;
        let image = camera.read_frame()?;

        self.sequence += 1;
        if let Some(fps) = self.fps.tick(now) {
            log::trace!("display: {fps:.1} fps, {} frame(s) shed", self.frames.shed_count());
        }

        let frame = Frame {
            image: Arc::new(image),
            sequence: self.sequence,
            captured_at: now,
        };
        self.frames.push(frame.clone());

        if let Some(outcome) = self.overlay_results.drain_latest() {
            // A failed analysis clears the overlay rather than freezing a
            // stale box on screen.
            self.overlay = outcome;
        }

        let annotations = self
            .overlay
            .as_ref()
            .map(|r| r.annotations().collect())
            .unwrap_or_default();

        Ok(CycleOutput {
            frame,
            annotations,
            fps: self.fps.fps(),
            heard: self.heard.borrow().clone(),
        })
    }

    /// `true` once the quit key was pressed or shutdown was requested
    /// elsewhere.
    pub fn should_exit(&self, quit_pressed: bool) -> bool {
        quit_pressed || !self.state.is_running()
    }

    /// Drop the capture device.  Idempotent.
    pub fn release(&mut self) {
        if self.camera.take().is_some() {
            log::info!("display: capture device released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.camera.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::{new_shared_state, Overflow};
    use crate::vision::{FakeCamera, Face, Region};

    struct Harness {
        cycle: FrameCycle,
        frames: SheddingQueue<Frame>,
        overlay: SheddingQueue<AnalysisOutcome>,
        heard: watch::Sender<Option<String>>,
    }

    fn harness(camera_frames: usize) -> Harness {
        let frames = SheddingQueue::new(2, Overflow::DropNewest);
        let overlay = SheddingQueue::new(4, Overflow::DropOldest);
        let (heard, heard_rx) = watch::channel(None);
        let cycle = FrameCycle::new(
            new_shared_state(),
            Box::new(FakeCamera::with_frames(camera_frames)),
            frames.clone(),
            overlay.clone(),
            heard_rx,
        );
        Harness {
            cycle,
            frames,
            overlay,
            heard,
        }
    }

    fn result(faces: Vec<Face>) -> AnalysisOutcome {
        Some(AnalysisResult::new(1, faces))
    }

    #[test]
    fn analysis_queue_never_exceeds_two_frames() {
        let mut h = harness(10);
        let t0 = Instant::now();
        for i in 0..10 {
            let out = h.cycle.step(t0 + Duration::from_millis(i * 10)).unwrap();
            assert_eq!(out.frame.sequence, i + 1);
            assert!(h.frames.len() <= 2);
        }
        // Nobody consumed: the first two were kept, the rest shed.
        assert_eq!(h.frames.try_pop().unwrap().sequence, 1);
        assert_eq!(h.frames.try_pop().unwrap().sequence, 2);
        assert_eq!(h.frames.shed_count(), 8);
    }

    #[test]
    fn camera_failure_is_an_error() {
        let mut h = harness(1);
        assert!(h.cycle.step(Instant::now()).is_ok());
        assert!(matches!(h.cycle.step(Instant::now()), Err(CaptureError::Stopped)));
    }

    #[test]
    fn only_usable_faces_are_annotated_from_newest_result() {
        let mut h = harness(2);
        h.overlay.push(result(vec![Face::new(Region::new(1, 1, 4, 4), "sad")]));
        h.overlay.push(result(vec![
            Face::new(Region::new(2, 3, 5, 6), "happy"),
            Face::new(Region::new(0, 0, 0, 0), "angry"),
        ]));

        let out = h.cycle.step(Instant::now()).unwrap();
        assert_eq!(out.annotations.len(), 1);
        assert_eq!(out.annotations[0].label, "Happy");
        assert!(h.overlay.is_empty());

        // No new result: the overlay persists.
        let out = h.cycle.step(Instant::now()).unwrap();
        assert_eq!(out.annotations.len(), 1);
    }

    #[test]
    fn failed_analysis_clears_overlay() {
        let mut h = harness(2);
        h.overlay.push(result(vec![Face::new(Region::new(1, 1, 4, 4), "sad")]));
        assert_eq!(h.cycle.step(Instant::now()).unwrap().annotations.len(), 1);

        h.overlay.push(None);
        assert!(h.cycle.step(Instant::now()).unwrap().annotations.is_empty());
    }

    #[test]
    fn heard_text_is_shown_without_being_consumed() {
        let mut h = harness(3);
        assert_eq!(h.cycle.step(Instant::now()).unwrap().heard, None);

        h.heard.send_replace(Some("hello there".into()));
        assert_eq!(
            h.cycle.step(Instant::now()).unwrap().heard.as_deref(),
            Some("hello there")
        );
        // Still shown on the next cycle.
        assert_eq!(
            h.cycle.step(Instant::now()).unwrap().heard.as_deref(),
            Some("hello there")
        );
    }

    #[test]
    fn fps_is_published_after_one_second() {
        let mut h = harness(3);
        let t0 = Instant::now();
        assert_eq!(h.cycle.step(t0).unwrap().fps, 0.0);
        let out = h.cycle.step(t0 + Duration::from_millis(1_500)).unwrap();
        assert!(out.fps > 0.0);
    }

    #[test]
    fn exit_on_quit_key_or_shutdown() {
        let h = harness(0);
        assert!(!h.cycle.should_exit(false));
        assert!(h.cycle.should_exit(true));

        h.cycle.state().request_shutdown();
        assert!(h.cycle.should_exit(false));
    }

    #[test]
    fn released_device_cannot_be_read() {
        let mut h = harness(5);
        h.cycle.release();
        h.cycle.release();
        assert!(h.cycle.is_released());
        assert!(matches!(h.cycle.step(Instant::now()), Err(CaptureError::Released)));
    }
}
