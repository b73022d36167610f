//! Command processor worker.
//!
//! Waits on two inputs at once and reacts to whichever is ready:
//!
//! ```text
//!            ┌─ stopped()           → exit
//! select! ───┼─ utterances.pop()    → refresh emotion, dispatch
//!            └─ results.pop()       → refresh emotion
//! ```
//!
//! Dispatching one utterance:
//!
//! ```text
//! classify(text)
//!   ├─ Quit                 → publish terminal response, request shutdown, exit
//!   ├─ cooldown not elapsed → drop silently
//!   └─ otherwise            → respond(), record response time, publish
//! ```
//!
//! The quit command ignores the cooldown: a user asking to stop is never
//! told to wait.
//!
//! The latest-emotion snapshot follows the newest analysis outcome: a result
//! with faces sets it to the first face's dominant emotion, a result with no
//! faces clears it, and a failed analysis (`None`) leaves it untouched.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::Instant;

use crate::commands::taxonomy::{classify, respond, Command, Response};
use crate::pipeline::{SharedState, SheddingQueue};
use crate::speech::Utterance;
use crate::vision::AnalysisOutcome;

/// What became of one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Inside the cooldown window; nothing published.
    Suppressed,
    /// A response was published.
    Responded(Response),
    /// The terminal response was published and shutdown requested.
    Shutdown,
}

pub struct CommandProcessor {
    state: SharedState,
    utterances: SheddingQueue<Utterance>,
    results: SheddingQueue<AnalysisOutcome>,
    responses: SheddingQueue<Response>,
    cooldown: Duration,
}

impl CommandProcessor {
    pub fn new(
        state: SharedState,
        utterances: SheddingQueue<Utterance>,
        results: SheddingQueue<AnalysisOutcome>,
        responses: SheddingQueue<Response>,
        cooldown: Duration,
    ) -> Self {
        Self {
            state,
            utterances,
            results,
            responses,
            cooldown,
        }
    }

    pub async fn run(self) {
        log::info!("commands: started (cooldown {:?})", self.cooldown);

        loop {
            let flow = tokio::select! {
                _ = self.state.stopped() => ControlFlow::Break(()),
                utterance = self.utterances.pop() => {
                    self.refresh_emotion(None);
                    match self.dispatch(&utterance, Instant::now()) {
                        Dispatch::Shutdown => ControlFlow::Break(()),
                        _ => ControlFlow::Continue(()),
                    }
                }
                outcome = self.results.pop() => {
                    self.refresh_emotion(Some(outcome));
                    ControlFlow::Continue(())
                }
            };
            if flow.is_break() {
                break;
            }
        }

        log::info!("commands: stopped");
    }

    /// Fold `popped` and everything still queued into `last_emotion`,
    /// keeping only the newest outcome.
    pub fn refresh_emotion(&self, popped: Option<AnalysisOutcome>) {
        let Some(latest) = self.results.drain_latest().or(popped) else {
            return;
        };
        if let Some(result) = latest {
            self.state
                .set_last_emotion(result.dominant_emotion().map(str::to_owned));
        }
    }

    /// Map one utterance to a response, honouring the cooldown.
    pub fn dispatch(&self, utterance: &Utterance, now: Instant) -> Dispatch {
        let command = classify(&utterance.text);

        if command == Command::Quit {
            let response = respond(command, &utterance.text, None);
            log::info!("commands: {:?} -> shutting down", utterance.text);
            self.responses.push(response);
            self.state.request_shutdown();
            return Dispatch::Shutdown;
        }

        if !self.state.cooldown_elapsed(now, self.cooldown) {
            log::debug!("commands: {:?} dropped (cooldown)", utterance.text);
            return Dispatch::Suppressed;
        }

        let emotion = self.state.last_emotion();
        let response = respond(command, &utterance.text, emotion.as_deref());
        log::info!("commands: {:?} -> {:?}", utterance.text, response.text);

        self.state.record_response(now);
        self.responses.push(response.clone());
        Dispatch::Responded(response)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::{new_shared_state, Overflow};
    use crate::vision::{AnalysisResult, Face, Region};

    const COOLDOWN: Duration = Duration::from_secs(5);

    struct Harness {
        state: SharedState,
        utterances: SheddingQueue<Utterance>,
        results: SheddingQueue<AnalysisOutcome>,
        responses: SheddingQueue<Response>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                state: new_shared_state(),
                utterances: SheddingQueue::new(8, Overflow::DropOldest),
                results: SheddingQueue::new(4, Overflow::DropOldest),
                responses: SheddingQueue::new(8, Overflow::DropOldest),
            }
        }

        fn processor(&self) -> CommandProcessor {
            CommandProcessor::new(
                Arc::clone(&self.state),
                self.utterances.clone(),
                self.results.clone(),
                self.responses.clone(),
                COOLDOWN,
            )
        }

        fn spawn(&self) -> tokio::task::JoinHandle<()> {
            tokio::spawn(self.processor().run())
        }

        fn sees(&self, emotion: &str) {
            self.results.push(Some(AnalysisResult::new(
                1,
                vec![Face::new(Region::new(0, 0, 10, 10), emotion)],
            )));
        }

        async fn next_response(&self) -> Response {
            tokio::time::timeout(Duration::from_secs(1), self.responses.pop())
                .await
                .expect("a response should be published")
        }

        async fn no_response(&self) {
            let got = tokio::time::timeout(Duration::from_millis(100), self.responses.pop()).await;
            assert!(got.is_err(), "unexpected response: {got:?}");
        }
    }

    fn text(d: Dispatch) -> String {
        match d {
            Dispatch::Responded(r) => r.text,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // dispatch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn hello_gets_greeting() {
        let h = Harness::new();
        let t0 = Instant::now();
        let got = h.processor().dispatch(&Utterance::new("Hello there"), t0);
        assert_eq!(text(got), "Hello! I am your emotion recognition assistant.");
        assert_eq!(h.state.last_response_at(), Some(t0));
        assert_eq!(h.responses.len(), 1);
    }

    #[tokio::test]
    async fn what_do_you_see_uses_latest_emotion() {
        let h = Harness::new();
        let p = h.processor();
        h.sees("sad");
        h.sees("happy");
        p.refresh_emotion(None);

        let got = p.dispatch(&Utterance::new("what do you see"), Instant::now());
        assert_eq!(text(got), "I can see that you appear to be happy.");
    }

    #[tokio::test]
    async fn what_do_you_see_without_emotion() {
        let h = Harness::new();
        let got = h.processor().dispatch(&Utterance::new("What do you see"), Instant::now());
        assert_eq!(text(got), "I don't detect any emotions at the moment.");
    }

    #[tokio::test]
    async fn unknown_text_is_echoed_verbatim() {
        let h = Harness::new();
        let got = h.processor().dispatch(&Utterance::new("tell me a joke"), Instant::now());
        assert_eq!(text(got), "I heard you say: tell me a joke");
    }

    #[tokio::test]
    async fn cooldown_suppresses_second_response() {
        let h = Harness::new();
        let p = h.processor();
        let t0 = Instant::now();

        assert!(matches!(p.dispatch(&Utterance::new("hi"), t0), Dispatch::Responded(_)));
        assert_eq!(
            p.dispatch(&Utterance::new("how are you"), t0 + Duration::from_millis(4_999)),
            Dispatch::Suppressed
        );
        assert_eq!(h.state.last_response_at(), Some(t0));

        assert!(matches!(
            p.dispatch(&Utterance::new("how are you"), t0 + COOLDOWN),
            Dispatch::Responded(_)
        ));
        assert_eq!(h.responses.len(), 2);
    }

    #[tokio::test]
    async fn quit_ignores_cooldown_and_stops_pipeline() {
        let h = Harness::new();
        let p = h.processor();
        let t0 = Instant::now();

        p.dispatch(&Utterance::new("hello"), t0);
        let got = p.dispatch(&Utterance::new("please quit now"), t0 + Duration::from_secs(1));

        assert_eq!(got, Dispatch::Shutdown);
        assert!(!h.state.is_running());
        h.responses.try_pop();
        assert_eq!(
            h.responses.try_pop(),
            Some(Response::terminal("Shutting down the application."))
        );
        // The quit does not count as a cooldown response.
        assert_eq!(h.state.last_response_at(), Some(t0));
    }

    #[tokio::test]
    async fn emotion_snapshot_follows_outcomes() {
        let h = Harness::new();
        let p = h.processor();

        h.sees("angry");
        p.refresh_emotion(None);
        assert_eq!(h.state.last_emotion().as_deref(), Some("angry"));

        // Failed analysis keeps the previous reading.
        p.refresh_emotion(Some(None));
        assert_eq!(h.state.last_emotion().as_deref(), Some("angry"));

        // A successful analysis with nobody in frame clears it.
        p.refresh_emotion(Some(Some(AnalysisResult::new(2, Vec::new()))));
        assert_eq!(h.state.last_emotion(), None);
    }

    #[tokio::test]
    async fn queued_results_win_over_popped_one() {
        let h = Harness::new();
        let p = h.processor();
        h.sees("surprise");

        let popped = Some(AnalysisResult::new(1, vec![Face::new(Region::default(), "fear")]));
        p.refresh_emotion(Some(popped));
        assert_eq!(h.state.last_emotion().as_deref(), Some("surprise"));
        assert!(h.results.is_empty());
    }

    // -----------------------------------------------------------------------
    // run loop
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn worker_enforces_cooldown_in_real_time() {
        let h = Harness::new();
        let worker = h.spawn();

        h.utterances.push(Utterance::new("Hello there"));
        assert_eq!(
            h.next_response().await.text,
            "Hello! I am your emotion recognition assistant."
        );

        h.utterances.push(Utterance::new("how are you"));
        h.no_response().await;

        tokio::time::advance(COOLDOWN).await;
        h.utterances.push(Utterance::new("how are you"));
        assert_eq!(
            h.next_response().await.text,
            "I'm functioning properly, thank you for asking."
        );

        h.state.request_shutdown();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn worker_picks_up_emotion_before_answering() {
        let h = Harness::new();
        let worker = h.spawn();

        h.sees("happy");
        h.utterances.push(Utterance::new("what do you see"));
        assert_eq!(
            h.next_response().await.text,
            "I can see that you appear to be happy."
        );

        h.state.request_shutdown();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn worker_exits_after_quit_and_ignores_the_rest() {
        let h = Harness::new();
        let worker = h.spawn();

        h.utterances.push(Utterance::new("please quit now"));
        let response = h.next_response().await;
        assert!(response.terminal);

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("processor should exit after quit")
            .unwrap();
        assert!(!h.state.is_running());

        h.utterances.push(Utterance::new("hello"));
        assert!(h.responses.is_empty());
    }

    #[tokio::test]
    async fn worker_exits_on_external_shutdown() {
        let h = Harness::new();
        let worker = h.spawn();
        h.state.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("processor should observe shutdown")
            .unwrap();
    }
}
