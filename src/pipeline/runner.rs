//! Pipeline wiring and coordinated shutdown.
//!
//! [`Pipeline::start`] builds every queue, spawns the workers and hands back
//! the [`FrameCycle`] the display loop drives on the UI thread:
//!
//! ```text
//!                 frames (2, drop-newest)
//! FrameCycle ───────────────────────────▶ EmotionAnalyzer ──┬─ command results ─▶ CommandProcessor
//!     ▲                                   (tokio task)      │                     (tokio task)
//!     │◀──────────── overlay results ─────────────────────────┘                        │
//!     │                                                                  responses     ▼
//!     │◀── heard text (watch) ── SpeechListener ── utterances ──▶ ┘      ResponseSpeaker
//!                                 (std thread)                            (tokio task)
//! ```
//!
//! [`Pipeline::shutdown`] sets the shared running flag and joins every
//! worker with a bounded wait.  A worker still running after its grace
//! period is logged; tokio tasks are then aborted, the listener thread is
//! left to end on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::commands::CommandProcessor;
use crate::config::AppConfig;
use crate::pipeline::display::FrameCycle;
use crate::pipeline::queue::{Overflow, SheddingQueue};
use crate::pipeline::state::{new_shared_state, SharedState};
use crate::speech::{MicrophoneOpener, SpeechListener};
use crate::stt::SttEngine;
use crate::tts::{ResponseSpeaker, SpeechSynthesizer};
use crate::vision::{CaptureDevice, EmotionAnalyzer, EmotionModel};

/// Poll interval while waiting for the listener thread.
const THREAD_POLL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// The external engines the workers drive.
///
/// `stt: None` runs the pipeline without speech input: frames are still
/// analyzed and annotated, nothing is ever heard.
pub struct Capabilities {
    pub model: Arc<dyn EmotionModel>,
    pub stt: Option<Arc<dyn SttEngine>>,
    pub synth: Arc<dyn SpeechSynthesizer>,
    pub open_mic: MicrophoneOpener,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    state: SharedState,
    handle: Handle,
    analyzer: Option<JoinHandle<()>>,
    commands: Option<JoinHandle<()>>,
    speaker: Option<JoinHandle<()>>,
    listener: Option<std::thread::JoinHandle<()>>,
    grace: Duration,
    speaker_grace: Duration,
    listener_grace: Duration,
}

impl Pipeline {
    /// Wire the queues and start every worker on `handle`.
    ///
    /// Failing to start the listener thread is logged and leaves speech
    /// input disabled; everything else keeps running.
    pub fn start(
        handle: &Handle,
        config: &AppConfig,
        caps: Capabilities,
        camera: Box<dyn CaptureDevice>,
    ) -> (Self, FrameCycle) {
        let state = new_shared_state();

        let frames = SheddingQueue::new(config.analysis.frame_capacity(), Overflow::DropNewest);
        let command_results =
            SheddingQueue::new(config.analysis.result_capacity(), Overflow::DropOldest);
        let overlay_results =
            SheddingQueue::new(config.analysis.result_capacity(), Overflow::DropOldest);
        let utterances =
            SheddingQueue::new(config.speech.utterance_capacity(), Overflow::DropOldest);
        let responses = SheddingQueue::new(config.voice.response_capacity(), Overflow::DropOldest);
        let (heard_tx, heard_rx) = watch::channel(None);

        let analyzer = EmotionAnalyzer::new(
            Arc::clone(&state),
            frames.clone(),
            command_results.clone(),
            overlay_results.clone(),
            caps.model,
        );
        let processor = CommandProcessor::new(
            Arc::clone(&state),
            utterances.clone(),
            command_results,
            responses.clone(),
            config.commands.cooldown(),
        );
        let speaker = ResponseSpeaker::new(
            Arc::clone(&state),
            responses,
            caps.synth,
            config.voice.drain_grace(),
        );

        let analyzer = handle.spawn(analyzer.run());
        let commands = handle.spawn(processor.run());
        let speaker = handle.spawn(speaker.run());

        let listener = match caps.stt {
            Some(stt) => {
                let listener = SpeechListener::new(
                    Arc::clone(&state),
                    stt,
                    utterances,
                    heard_tx,
                    config.speech.clone(),
                );
                match listener.spawn(caps.open_mic) {
                    Ok(join) => Some(join),
                    Err(e) => {
                        log::error!("pipeline: could not start listener thread: {e}");
                        None
                    }
                }
            }
            None => {
                log::warn!("pipeline: no speech recognizer; voice commands disabled");
                None
            }
        };

        let grace = config.ui.shutdown_grace();
        let pipeline = Self {
            state: Arc::clone(&state),
            handle: handle.clone(),
            analyzer: Some(analyzer),
            commands: Some(commands),
            speaker: Some(speaker),
            listener,
            grace,
            speaker_grace: grace + config.voice.drain_grace(),
            // A phrase already being recorded is finished before the flag
            // is seen again.
            listener_grace: grace + config.speech.phrase_time_limit(),
        };

        let cycle = FrameCycle::new(state, camera, frames, overlay_results, heard_rx);
        log::info!("pipeline: started");
        (pipeline, cycle)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Request shutdown and wait for every worker.  Idempotent.
    ///
    /// Blocks the calling thread; must not be called from inside the
    /// runtime.  Use [`shutdown_async`](Self::shutdown_async) there.
    pub fn shutdown(&mut self) {
        let handle = self.handle.clone();
        handle.block_on(self.shutdown_async());
    }

    pub async fn shutdown_async(&mut self) {
        if self.state.request_shutdown() {
            log::info!("pipeline: shutdown requested");
        }

        join_task("analyzer", self.analyzer.take(), self.grace).await;
        join_task("command processor", self.commands.take(), self.grace).await;
        join_task("speaker", self.speaker.take(), self.speaker_grace).await;

        if let Some(listener) = self.listener.take() {
            join_thread("listener", listener, self.listener_grace).await;
        }
    }

    /// `true` once every worker has been joined or given up on.
    pub fn is_shut_down(&self) -> bool {
        self.analyzer.is_none()
            && self.commands.is_none()
            && self.speaker.is_none()
            && self.listener.is_none()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Workers left unjoined must still see the flag.
        self.state.request_shutdown();
    }
}

async fn join_task(name: &str, task: Option<JoinHandle<()>>, grace: Duration) {
    let Some(mut task) = task else {
        return;
    };
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(())) => log::debug!("pipeline: {name} joined"),
        Ok(Err(e)) => log::error!("pipeline: {name} ended abnormally: {e}"),
        Err(_) => {
            log::error!("pipeline: {name} still running after {grace:?}; aborting");
            task.abort();
        }
    }
}

async fn join_thread(name: &str, thread: std::thread::JoinHandle<()>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    while !thread.is_finished() {
        if tokio::time::Instant::now() >= deadline {
            log::error!("pipeline: {name} thread still running after {grace:?}");
            return;
        }
        tokio::time::sleep(THREAD_POLL).await;
    }
    if thread.join().is_err() {
        log::error!("pipeline: {name} thread panicked");
    } else {
        log::debug!("pipeline: {name} joined");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
