//! Response speaker worker.
//!
//! Speaks queued responses strictly one at a time, oldest first.  Each
//! synthesis runs on the blocking pool so the async workers keep moving
//! while audio plays.
//!
//! On shutdown the speaker keeps draining what is already queued (the quit
//! announcement is queued just before shutdown is requested) until the queue
//! is empty or the drain grace period, counted from the shutdown request,
//! runs out.  A synthesis still playing at that point is cancelled so no
//! speech program outlives the pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::Response;
use crate::pipeline::{SharedState, SheddingQueue};
use crate::tts::{SpeechSynthesizer, SynthesisError};

pub struct ResponseSpeaker {
    state: SharedState,
    responses: SheddingQueue<Response>,
    synth: Arc<dyn SpeechSynthesizer>,
    drain_grace: Duration,
}

impl ResponseSpeaker {
    pub fn new(
        state: SharedState,
        responses: SheddingQueue<Response>,
        synth: Arc<dyn SpeechSynthesizer>,
        drain_grace: Duration,
    ) -> Self {
        Self {
            state,
            responses,
            synth,
            drain_grace,
        }
    }

    pub async fn run(self) {
        log::info!("speaker: started");

        let expired = async {
            self.state.stopped().await;
            tokio::time::sleep(self.drain_grace).await;
        };
        tokio::pin!(expired);

        loop {
            let response = tokio::select! {
                biased;
                _ = self.state.stopped() => break,
                response = self.responses.pop() => response,
            };
            if !self.speak_before(response, expired.as_mut()).await {
                log::warn!("speaker: response still playing at end of drain grace");
                log::info!("speaker: stopped");
                return;
            }
        }

        self.drain(expired).await;
        log::info!("speaker: stopped");
    }

    async fn drain(&self, mut expired: Pin<&mut impl Future<Output = ()>>) {
        while let Some(response) = self.responses.try_pop() {
            if !self.speak_before(response, expired.as_mut()).await {
                log::warn!(
                    "speaker: drain grace elapsed, dropping {} response(s)",
                    self.responses.len() + 1
                );
                return;
            }
        }
    }

    /// Speak `response` unless `expired` fires first, in which case the
    /// synthesis in progress is cancelled.  Returns `false` on expiry.
    ///
    /// `expired` must not be polled again once this returned `false`.
    async fn speak_before(
        &self,
        response: Response,
        expired: Pin<&mut impl Future<Output = ()>>,
    ) -> bool {
        tokio::select! {
            biased;
            _ = expired => {
                self.synth.cancel();
                false
            }
            _ = self.speak(response) => true,
        }
    }

    async fn speak(&self, response: Response) {
        let synth = Arc::clone(&self.synth);
        let text = response.text;
        log::debug!("speaker: {text:?}");

        let result: Result<Result<(), SynthesisError>, _> =
            tokio::task::spawn_blocking(move || synth.speak(&text)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("speaker: synthesis failed: {e}"),
            Err(e) => log::warn!("speaker: synthesis task panicked: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
