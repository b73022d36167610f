//! Cross-worker shared state.
//!
//! [`PipelineState`] holds the three values every worker may need to see:
//!
//! | Field | Writer | Readers |
//! |-------|--------|---------|
//! | `running` | display loop, command processor | every worker |
//! | `last_emotion` | command processor | command processor, UI |
//! | `last_response_at` | command processor | command processor |
//!
//! `running` lives in a [`tokio::sync::watch`] channel so async workers can
//! *await* shutdown inside a `select!` while plain threads poll
//! [`is_running`](PipelineState::is_running) at their own checkpoints.  It
//! moves from `true` to `false` exactly once.
//!
//! [`SharedState`] is an `Arc<PipelineState>`: cheap to clone, `Send + Sync`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

pub struct PipelineState {
    running: watch::Sender<bool>,
    last_emotion: Mutex<Option<String>>,
    last_response_at: Mutex<Option<Instant>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PipelineState {
    pub fn new() -> Self {
        let (running, _) = watch::channel(true);
        Self {
            running,
            last_emotion: Mutex::new(None),
            last_response_at: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // running
    // -----------------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Flip `running` to `false`.
    ///
    /// Idempotent; returns `true` only for the call that performed the
    /// transition.
    pub fn request_shutdown(&self) -> bool {
        self.running.send_if_modified(|running| {
            if *running {
                *running = false;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once shutdown has been requested (immediately if it already
    /// has been).
    pub async fn stopped(&self) {
        let mut rx = self.running.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|running| !*running).await;
    }

    // -----------------------------------------------------------------------
    // last_emotion
    // -----------------------------------------------------------------------

    pub fn last_emotion(&self) -> Option<String> {
        lock(&self.last_emotion).clone()
    }

    pub fn set_last_emotion(&self, emotion: Option<String>) {
        *lock(&self.last_emotion) = emotion;
    }

    // -----------------------------------------------------------------------
    // last_response_at
    // -----------------------------------------------------------------------

    pub fn last_response_at(&self) -> Option<Instant> {
        *lock(&self.last_response_at)
    }

    /// Record that a response was emitted at `at`.
    ///
    /// The timestamp only moves forward; an older `at` is ignored and
    /// `false` returned.
    pub fn record_response(&self, at: Instant) -> bool {
        let mut last = lock(&self.last_response_at);
        match *last {
            Some(prev) if prev >= at => false,
            _ => {
                *last = Some(at);
                true
            }
        }
    }

    /// `true` when at least `cooldown` has passed since the last recorded
    /// response, or when nothing has been recorded yet.
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_response_at() {
            None => true,
            Some(prev) => now.saturating_duration_since(prev) >= cooldown,
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("running", &self.is_running())
            .field("last_emotion", &self.last_emotion())
            .field("last_response_at", &self.last_response_at())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`PipelineState`].
pub type SharedState = Arc<PipelineState>;

pub fn new_shared_state() -> SharedState {
    Arc::new(PipelineState::new())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
