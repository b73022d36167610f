//! Spoken responses.
//!
//! [`SpeechSynthesizer`] is a blocking, one-utterance-at-a-time interface:
//! `speak` returns once playback has finished.  [`SystemVoice`] drives the
//! platform's command-line voice:
//!
//! | Platform | Default command |
//! |----------|-----------------|
//! | Linux | `espeak --stdin` |
//! | macOS | `say -f -` |
//! | Windows | PowerShell + `System.Speech` |
//!
//! The text goes to the child's stdin, never onto its command line, so
//! nothing the user says can be interpreted as an argument.
//!
//! [`SpeechSynthesizer::cancel`] cuts playback short from another thread;
//! for [`SystemVoice`] that kills the running child.

pub mod speaker;

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::config::VoiceConfig;

pub use speaker::ResponseSpeaker;

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("could not start speech program `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("speech program I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("speech program exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("playback cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Speak `text` and block until playback ends.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), SynthesisError>;

    /// Stop whatever `speak` is playing right now.  The interrupted call
    /// returns [`SynthesisError::Cancelled`].  No-op when idle.
    fn cancel(&self) {}
}

// ---------------------------------------------------------------------------
// SystemVoice
// ---------------------------------------------------------------------------

/// How often a playing child is checked for exit or cancellation.
const EXIT_POLL: Duration = Duration::from_millis(20);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct SystemVoice {
    program: String,
    args: Vec<String>,
    /// Serialises `speak` calls: one child at a time.
    turn: Mutex<()>,
    /// The child currently speaking.  `cancel` takes it out and kills it.
    playing: Mutex<Option<Child>>,
}

impl SystemVoice {
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            turn: Mutex::new(()),
            playing: Mutex::new(None),
        }
    }

    /// Wait for the stored child to exit, or for `cancel` to remove it.
    fn wait_playing(&self) -> Result<ExitStatus, SynthesisError> {
        loop {
            {
                let mut playing = lock(&self.playing);
                let Some(child) = playing.as_mut() else {
                    return Err(SynthesisError::Cancelled);
                };
                if let Some(status) = child.try_wait()? {
                    playing.take();
                    return Ok(status);
                }
            }
            std::thread::sleep(EXIT_POLL);
        }
    }
}

impl SpeechSynthesizer for SystemVoice {
    fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let _turn = lock(&self.turn);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SynthesisError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Read stderr on the side so a chatty program cannot stall on a
        // full pipe while we poll for its exit.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });
        let stdin = child.stdin.take();
        *lock(&self.playing) = Some(child);

        if let Some(mut stdin) = stdin {
            let written = stdin
                .write_all(text.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"));
            // Dropping stdin sends EOF so the program starts speaking.
            drop(stdin);
            if let Err(e) = written {
                self.cancel();
                return Err(e.into());
            }
        }

        let status = self.wait_playing()?;
        if !status.success() {
            let stderr = stderr
                .and_then(|reader| reader.join().ok())
                .unwrap_or_default();
            return Err(SynthesisError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn cancel(&self) {
        let Some(mut child) = lock(&self.playing).take() else {
            return;
        };
        match child.kill().and_then(|()| child.wait()) {
            Ok(status) => log::info!("voice: stopped `{}` ({status})", self.program),
            Err(e) => log::warn!("voice: could not stop `{}`: {e}", self.program),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSynth  (test-only)
// ---------------------------------------------------------------------------

/// Records every spoken text.  Texts containing `"fail"` are rejected.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSynth {
    spoken: std::sync::Mutex<Vec<String>>,
    delay: std::time::Duration,
    cancels: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl RecordingSynth {
    /// Every call blocks for `delay` first, like real playback.
    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SpeechSynthesizer for RecordingSynth {
    fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        std::thread::sleep(self.delay);
        if text.contains("fail") {
            return Err(SynthesisError::Failed {
                status: "exit status: 1".into(),
                stderr: "scripted failure".into(),
            });
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
