//! Rolling frames-per-second estimate.

use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts frames and republishes `count / elapsed` once at least one second
/// has passed since the last publication.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    count: u32,
    window_start: Instant,
    fps: f32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            fps: 0.0,
        }
    }

    /// Register one frame captured at `now`.
    ///
    /// Returns the new estimate when the window closed on this frame.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return None;
        }
        self.fps = self.count as f32 / elapsed.as_secs_f32();
        self.count = 0;
        self.window_start = now;
        Some(self.fps)
    }

    /// Last published estimate (`0.0` until the first window closes).
    pub fn fps(&self) -> f32 {
        self.fps
    }
}
