//! Narration session — the top-level state machine and playback loop.
//!
//! ```text
//!   Idle → Running → {Paused ⇄ Running} → Stopped
//! ```
//!
//! `start()` spawns a dedicated narration thread that walks the cursor
//! across paragraphs and chapters, warming the speech cache one paragraph
//! ahead of playback. The presentation layer issues fire-and-forget
//! commands (pause, skip, jump, stop) and observes progress through an
//! event channel — it is never blocked on the narration thread.
//!
//! `Stopped` is terminal for a session instance: create a new session to
//! narrate again.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use narrata_core::{Chapter, ChapterStore, Cursor, SpeechSynthesizer};

use crate::cache::{DEFAULT_CACHE_CAPACITY, SpeechCache};
use crate::controls::{Controls, NarrationParams};
use crate::error::NarrationError;
use crate::output::AudioOutput;
use crate::playback::{POLL_INTERVAL, PlaybackController, SpeakOutcome};
use crate::prefetch::{PrefetchHandle, PrefetchRequest, PrefetchWorker};
use crate::threads::join_with_timeout;

/// Bound on how long `stop()` waits for each pipeline thread.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the narration thread waits for the opening paragraph's
/// pre-fetch before falling back to inline synthesis.
const BOOT_PREFETCH_WAIT: Duration = Duration::from_millis(500);

// ── Session state machine ──────────────────────────────────────────

/// Current state of a narration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not started.
    Idle,

    /// Narration thread is walking paragraphs.
    Running,

    /// Narration suspended mid-audio; resume continues mid-sentence.
    Paused,

    /// Finished or explicitly stopped. Terminal.
    Stopped,
}

// ── Events emitted to the presentation layer ───────────────────────

/// Events emitted by the session. Delivery is asynchronous and lossless;
/// the sender never blocks the narration thread.
#[derive(Debug, Clone)]
pub enum NarrationEvent {
    /// Session state changed.
    StateChanged(SessionState),

    /// A chapter was entered (at start, on rollover, or after a jump).
    ChapterStarted {
        chapter: u32,
        title: String,
        paragraphs: usize,
    },

    /// A paragraph is about to be narrated. Emitted before its audio
    /// starts so the UI can display text in sync with speech.
    Paragraph {
        chapter: u32,
        paragraph: usize,
        total: usize,
        text: String,
        is_paused: bool,
    },

    /// A non-fatal mid-run problem (e.g. the next chapter failed to load).
    Error(String),

    /// Natural end of content — no chapter follows the last one narrated.
    Finished,
}

// ── Configuration ──────────────────────────────────────────────────

/// Initial narration parameters for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend voice identifier.
    pub voice_id: String,

    /// Rate offset in percent (−50..+100).
    pub rate_percent: i32,

    /// Narration volume, 0.0–1.0.
    pub volume: f32,

    /// Speech cache capacity in paragraphs.
    pub cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice_id: narrata_core::DEFAULT_VOICE.voice_id.to_string(),
            rate_percent: 0,
            volume: 1.0,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

// ── Session ────────────────────────────────────────────────────────

/// Owns the narration thread, the pre-fetch worker, and the shared
/// control state for one listening session.
pub struct NarrationSession {
    store: Arc<dyn ChapterStore>,
    synth: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    cache: Arc<SpeechCache>,
    controls: Controls,
    event_tx: mpsc::UnboundedSender<NarrationEvent>,
    prefetch: Option<PrefetchWorker>,
    thread: Option<thread::JoinHandle<()>>,
}

impl NarrationSession {
    /// Create a session over its collaborators.
    ///
    /// Returns the session and the event receiver for the presentation
    /// layer.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChapterStore>,
        synth: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<NarrationEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = Self {
            store,
            synth,
            output,
            cache: Arc::new(SpeechCache::new(config.cache_capacity)),
            controls: Controls::new(NarrationParams {
                voice_id: config.voice_id,
                rate_percent: config.rate_percent,
                volume: config.volume.clamp(0.0, 1.0),
            }),
            event_tx,
            prefetch: None,
            thread: None,
        };

        (session, event_rx)
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.controls.state()
    }

    /// Current playback cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.controls.cursor()
    }

    /// Whether the session is running or paused.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state(), SessionState::Running | SessionState::Paused)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Begin narration at `chapter`/`paragraph` (1-based; clamped to the
    /// chapter's length).
    ///
    /// Validates the chapter before any thread is spawned: an unknown or
    /// empty chapter leaves the session `Idle`.
    pub fn start(&mut self, chapter: u32, paragraph: usize) -> Result<(), NarrationError> {
        if self.state() != SessionState::Idle {
            return Err(NarrationError::AlreadyStarted);
        }

        let opening = self
            .store
            .load_chapter(chapter)?
            .ok_or(NarrationError::ChapterNotFound { chapter })?;
        if opening.is_empty() {
            return Err(NarrationError::EmptyChapter { chapter });
        }

        let paragraph = paragraph.clamp(1, opening.len());
        self.controls.arm(Cursor::new(chapter, paragraph));

        let worker = PrefetchWorker::spawn(Arc::clone(&self.cache), Arc::clone(&self.synth))?;

        let ctx = LoopContext {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            controls: self.controls.clone(),
            events: self.event_tx.clone(),
            playback: PlaybackController::new(
                Arc::clone(&self.cache),
                Arc::clone(&self.synth),
                Arc::clone(&self.output),
                self.controls.clone(),
            ),
            prefetch: worker.handle(),
            chapter: opening,
        };

        // Running must be visible before the loop thread can possibly set
        // Stopped, or an ultra-short narration could be overwritten.
        self.transition(SessionState::Running);

        let thread = match thread::Builder::new()
            .name("narrata-narration".into())
            .spawn(move || run_loop(ctx))
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = worker.stop(SHUTDOWN_TIMEOUT);
                self.transition(SessionState::Idle);
                return Err(NarrationError::Playback(format!(
                    "failed to spawn narration thread: {e}"
                )));
            }
        };

        self.prefetch = Some(worker);
        self.thread = Some(thread);

        tracing::info!(chapter, paragraph, "Narration started");
        Ok(())
    }

    /// Stop narration and tear down both pipeline threads.
    ///
    /// Always leaves the session `Stopped`; a [`NarrationError::ShutdownTimeout`]
    /// is a warning that a thread had to be abandoned, not a failure to stop.
    pub fn stop(&mut self) -> Result<(), NarrationError> {
        self.controls.request_stop();
        self.output.stop();

        let mut result = Ok(());

        if let Some(handle) = self.thread.take() {
            if !join_with_timeout(handle, SHUTDOWN_TIMEOUT) {
                result = Err(NarrationError::ShutdownTimeout {
                    what: "narration thread",
                    timeout_ms: u64::try_from(SHUTDOWN_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }

        if let Some(worker) = self.prefetch.take() {
            let stopped = worker.stop(SHUTDOWN_TIMEOUT);
            if result.is_ok() {
                result = stopped;
            }
        }

        self.transition(SessionState::Stopped);
        tracing::info!("Narration stopped");
        result
    }

    // ── Commands ───────────────────────────────────────────────────

    /// Suspend narration. The current audio is paused at the channel
    /// level, not cancelled — resuming continues mid-sentence.
    pub fn pause(&self) -> Result<(), NarrationError> {
        self.ensure_active()?;
        if self.controls.set_paused(true) {
            self.transition(SessionState::Paused);
        }
        Ok(())
    }

    /// Resume from pause.
    pub fn resume(&self) -> Result<(), NarrationError> {
        self.ensure_active()?;
        if self.controls.set_paused(false) {
            self.transition(SessionState::Running);
        }
        Ok(())
    }

    /// Skip to the next paragraph, interrupting the current one.
    pub fn skip_forward(&self) -> Result<(), NarrationError> {
        self.ensure_active()?;
        let _ = self.controls.request_skip(1);
        Ok(())
    }

    /// Go back one paragraph, interrupting the current one.
    pub fn skip_back(&self) -> Result<(), NarrationError> {
        self.ensure_active()?;
        let _ = self.controls.request_skip(-1);
        Ok(())
    }

    /// Jump to an arbitrary position. Stops the current audio; if the
    /// session was running it continues from the new position.
    pub fn jump_to(&self, chapter: u32, paragraph: usize) -> Result<(), NarrationError> {
        self.ensure_active()?;

        let target = self
            .store
            .load_chapter(chapter)?
            .ok_or(NarrationError::ChapterNotFound { chapter })?;
        if target.is_empty() {
            return Err(NarrationError::EmptyChapter { chapter });
        }

        let paragraph = paragraph.clamp(1, target.len());
        self.controls.jump(Cursor::new(chapter, paragraph));
        self.output.stop();

        tracing::info!(chapter, paragraph, "Jumped");
        Ok(())
    }

    /// Change the narration volume, effective immediately.
    pub fn set_volume(&self, volume: f32) {
        self.controls.set_volume(volume);
        self.output.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Change the narration rate for subsequently synthesized paragraphs.
    ///
    /// Rate is baked into the audio, so already-cached entries at the old
    /// rate simply stop matching — no invalidation is needed.
    pub fn set_rate(&self, rate_percent: i32) {
        self.controls.set_rate(rate_percent);
    }

    /// Change the narrator voice.
    ///
    /// Cached audio is voice-specific, so a real change clears the speech
    /// cache; replaying an old paragraph re-synthesizes it in the new voice.
    pub fn set_voice(&self, voice_id: &str) {
        if self.controls.set_voice(voice_id) {
            self.cache.clear();
            tracing::info!(voice = voice_id, "Voice changed — speech cache cleared");
        }
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn ensure_active(&self) -> Result<(), NarrationError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(NarrationError::NotActive)
        }
    }

    fn transition(&self, state: SessionState) {
        if self.controls.set_state(state) {
            emit(&self.event_tx, NarrationEvent::StateChanged(state));
        }
    }
}

impl Drop for NarrationSession {
    fn drop(&mut self) {
        if self.thread.is_some() || self.prefetch.is_some() {
            let _ = self.stop();
        }
    }
}

// ── Narration loop ─────────────────────────────────────────────────

struct LoopContext {
    store: Arc<dyn ChapterStore>,
    cache: Arc<SpeechCache>,
    controls: Controls,
    events: mpsc::UnboundedSender<NarrationEvent>,
    playback: PlaybackController,
    prefetch: PrefetchHandle,
    chapter: Chapter,
}

fn emit(events: &mpsc::UnboundedSender<NarrationEvent>, event: NarrationEvent) {
    if events.send(event).is_err() {
        tracing::warn!("Narration event receiver dropped");
    }
}

/// The narration thread body.
fn run_loop(mut ctx: LoopContext) {
    emit(
        &ctx.events,
        NarrationEvent::ChapterStarted {
            chapter: ctx.chapter.number,
            title: ctx.chapter.title.clone(),
            paragraphs: ctx.chapter.len(),
        },
    );

    boot_prefetch(&ctx);

    let mut finished_naturally = false;

    loop {
        if ctx.controls.stop_requested() {
            break;
        }

        let cursor = ctx.controls.cursor();

        // A jump may have moved us to a different chapter.
        if cursor.chapter != ctx.chapter.number && !enter_chapter(&mut ctx, cursor.chapter) {
            break;
        }

        // Chapter exhausted: roll over to the next available chapter.
        if cursor.paragraph > ctx.chapter.len() {
            match ctx.store.next_chapter_after(ctx.chapter.number) {
                Some(next) => {
                    if enter_chapter(&mut ctx, next) {
                        ctx.controls.seat_cursor(Cursor::new(next, 1));
                        continue;
                    }
                    break;
                }
                None => {
                    tracing::info!(chapter = ctx.chapter.number, "End of content");
                    finished_naturally = true;
                    break;
                }
            }
        }

        let Some(text) = ctx.chapter.paragraph(cursor.paragraph).map(String::from) else {
            // Rewind clamps at 1, so the only unreachable index is a gap;
            // treat it as already narrated.
            ctx.controls.seat_cursor(cursor.advanced(ctx.chapter.len()));
            continue;
        };

        emit(
            &ctx.events,
            NarrationEvent::Paragraph {
                chapter: cursor.chapter,
                paragraph: cursor.paragraph,
                total: ctx.chapter.len(),
                text: text.clone(),
                is_paused: ctx.controls.is_paused(),
            },
        );

        // Warm the cache for whatever comes after this paragraph, before
        // blocking on its playback.
        request_next_prefetch(&ctx, cursor);

        let outcome = ctx.playback.speak(&text);

        if ctx.controls.stop_requested() {
            break;
        }

        let skip = ctx.controls.take_skip();
        let current = ctx.controls.cursor();
        if skip > 0 {
            ctx.controls.seat_cursor(current.advanced(ctx.chapter.len()));
        } else if skip < 0 {
            ctx.controls.seat_cursor(current.rewound());
        } else if outcome == SpeakOutcome::Completed {
            ctx.controls.seat_cursor(current.advanced(ctx.chapter.len()));
        }
        // Interrupted with no skip pending: a jump already seated the cursor.

        ctx.controls.clear_interrupt();
    }

    if ctx.controls.set_state(SessionState::Stopped) {
        emit(&ctx.events, NarrationEvent::StateChanged(SessionState::Stopped));
    }
    if finished_naturally {
        emit(&ctx.events, NarrationEvent::Finished);
    }
}

/// Load `number` and make it the loop's current chapter.
///
/// Returns `false` (after emitting an error event) when the chapter is
/// missing, empty, or unreadable — the loop then winds down.
fn enter_chapter(ctx: &mut LoopContext, number: u32) -> bool {
    match ctx.store.load_chapter(number) {
        Ok(Some(chapter)) if !chapter.is_empty() => {
            tracing::info!(chapter = number, title = %chapter.title, "Entering chapter");
            emit(
                &ctx.events,
                NarrationEvent::ChapterStarted {
                    chapter: number,
                    title: chapter.title.clone(),
                    paragraphs: chapter.len(),
                },
            );
            ctx.chapter = chapter;
            true
        }
        Ok(_) => {
            emit(
                &ctx.events,
                NarrationEvent::Error(format!("chapter {number} is missing or empty")),
            );
            false
        }
        Err(e) => {
            tracing::error!(chapter = number, error = %e, "Failed to load chapter");
            emit(&ctx.events, NarrationEvent::Error(e.to_string()));
            false
        }
    }
}

/// Ask the worker to prepare the opening paragraph and give it a short
/// head start, so the very first `speak()` can hit the cache too.
fn boot_prefetch(ctx: &LoopContext) {
    let cursor = ctx.controls.cursor();
    let Some(text) = ctx.chapter.paragraph(cursor.paragraph).map(String::from) else {
        return;
    };

    let params = ctx.controls.params();
    let fingerprint =
        crate::fingerprint::Fingerprint::compute(&text, &params.voice_id, params.rate_percent);
    ctx.prefetch.request(PrefetchRequest {
        text,
        voice_id: params.voice_id,
        rate_percent: params.rate_percent,
    });

    let deadline = Instant::now() + BOOT_PREFETCH_WAIT;
    while ctx.cache.get(&fingerprint).is_none()
        && Instant::now() < deadline
        && !ctx.controls.stop_requested()
    {
        thread::sleep(POLL_INTERVAL);
    }
}

/// Queue a pre-fetch for the paragraph that follows `cursor`: the next one
/// in this chapter, or the first paragraph of the next chapter when at the
/// chapter's end.
fn request_next_prefetch(ctx: &LoopContext, cursor: Cursor) {
    let next_text = if cursor.paragraph < ctx.chapter.len() {
        ctx.chapter.paragraph(cursor.paragraph + 1).map(String::from)
    } else {
        ctx.store
            .next_chapter_after(ctx.chapter.number)
            .and_then(|n| ctx.store.load_chapter(n).ok().flatten())
            .and_then(|ch| ch.paragraph(1).map(String::from))
    };

    if let Some(text) = next_text {
        let params = ctx.controls.params();
        ctx.prefetch.request(PrefetchRequest {
            text,
            voice_id: params.voice_id,
            rate_percent: params.rate_percent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_catalog_default_voice() {
        let config = SessionConfig::default();
        assert_eq!(config.voice_id, narrata_core::DEFAULT_VOICE.voice_id);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }
}
