//! Pre-fetch worker — synthesizes upcoming paragraphs ahead of need.
//!
//! A single background thread turns "the next paragraph" into cached audio
//! while the current one is still being spoken, hiding synthesis latency
//! behind playback. The request queue is effectively a single slot: when
//! the worker wakes up it collapses its backlog down to the most recent
//! request, so paragraphs the listener has already skipped past are
//! discarded instead of wasting synthesis work that would starve the
//! truly-next paragraph.

use std::sync::Arc;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use narrata_core::SpeechSynthesizer;

use crate::cache::SpeechCache;
use crate::error::NarrationError;
use crate::fingerprint::Fingerprint;
use crate::threads::join_with_timeout;

/// One "prepare this text" request.
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    /// Paragraph text to synthesize.
    pub text: String,

    /// Backend voice identifier.
    pub voice_id: String,

    /// Rate offset in percent.
    pub rate_percent: i32,
}

enum Command {
    Prepare(PrefetchRequest),
    Shutdown,
}

/// Cloneable request sender, handed to the narration loop.
#[derive(Clone)]
pub struct PrefetchHandle {
    tx: mpsc::Sender<Command>,
}

impl PrefetchHandle {
    /// Queue a request, superseding any request the worker has not yet
    /// started. Non-blocking; silently dropped if the worker is gone
    /// (pre-fetch is best-effort by definition).
    pub fn request(&self, request: PrefetchRequest) {
        let _ = self.tx.send(Command::Prepare(request));
    }
}

/// Owner of the pre-fetch thread.
pub struct PrefetchWorker {
    tx: mpsc::Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PrefetchWorker {
    /// Spawn the worker thread over shared cache and synthesizer.
    pub fn spawn(
        cache: Arc<SpeechCache>,
        synth: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self, NarrationError> {
        let (tx, rx) = mpsc::channel::<Command>();

        let thread = thread::Builder::new()
            .name("narrata-prefetch".into())
            .spawn(move || run(&rx, &cache, synth.as_ref()))
            .map_err(|e| {
                NarrationError::Playback(format!("failed to spawn pre-fetch worker: {e}"))
            })?;

        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// Request sender for the narration loop.
    #[must_use]
    pub fn handle(&self) -> PrefetchHandle {
        PrefetchHandle {
            tx: self.tx.clone(),
        }
    }

    /// Shut the worker down, waiting at most `timeout` for it to exit.
    ///
    /// A worker stuck inside a slow synthesis call past the bound is
    /// reported as [`NarrationError::ShutdownTimeout`] and abandoned;
    /// its thread dies with the process.
    pub fn stop(mut self, timeout: Duration) -> Result<(), NarrationError> {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            if !join_with_timeout(handle, timeout) {
                return Err(NarrationError::ShutdownTimeout {
                    what: "pre-fetch worker",
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }
        Ok(())
    }
}

impl Drop for PrefetchWorker {
    fn drop(&mut self) {
        // Best-effort shutdown if `stop` was never called.
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn run(rx: &mpsc::Receiver<Command>, cache: &SpeechCache, synth: &dyn SpeechSynthesizer) {
    while let Ok(first) = rx.recv() {
        // Collapse the backlog: only the most recent command matters.
        let mut cmd = first;
        loop {
            match rx.try_recv() {
                Ok(newer) => cmd = newer,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        match cmd {
            Command::Shutdown => break,
            Command::Prepare(request) => prepare(cache, synth, &request),
        }
    }

    tracing::debug!("Pre-fetch worker shutting down");
}

fn prepare(cache: &SpeechCache, synth: &dyn SpeechSynthesizer, request: &PrefetchRequest) {
    let fingerprint =
        Fingerprint::compute(&request.text, &request.voice_id, request.rate_percent);

    if cache.get(&fingerprint).is_some() {
        tracing::trace!(%fingerprint, "Already cached — nothing to pre-fetch");
        return;
    }

    match synth.synthesize(&request.text, &request.voice_id, request.rate_percent) {
        Ok(audio) => {
            cache.put(fingerprint, Arc::new(audio));
            tracing::debug!(%fingerprint, "Pre-fetched paragraph audio");
        }
        // A failed pre-fetch only costs the fallback synthesis at playback
        // time; never let it take the worker down.
        Err(e) => {
            tracing::warn!(%fingerprint, error = %e, "Pre-fetch synthesis failed");
        }
    }
}
