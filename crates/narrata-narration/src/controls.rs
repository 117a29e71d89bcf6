//! Shared narration control state.
//!
//! One mutex guards everything the narration thread and the command-issuing
//! (UI) thread both touch: the cursor, the pause/stop flags, the pending
//! skip delta, and the active voice parameters. Commands are fire-and-forget
//! flag writes; the narration thread observes them inside its poll loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use narrata_core::Cursor;

use crate::session::SessionState;

/// Active narration parameters: who speaks, how fast, how loud.
#[derive(Debug, Clone)]
pub struct NarrationParams {
    /// Backend voice identifier.
    pub voice_id: String,

    /// Rate offset in percent (−50..+100).
    pub rate_percent: i32,

    /// Playback volume, 0.0–1.0. Not part of the cache fingerprint —
    /// volume is applied at playback time, not baked into the audio.
    pub volume: f32,
}

#[derive(Debug)]
struct ControlState {
    state: SessionState,
    cursor: Cursor,
    paused: bool,
    stop_requested: bool,
    pending_skip: i8,
    interrupted: bool,
    params: NarrationParams,
}

/// Cheaply clonable handle to the shared control state.
///
/// Every accessor takes the single lock for the duration of one read or
/// write — never across a sleep or an I/O call.
#[derive(Clone)]
pub struct Controls {
    inner: Arc<Mutex<ControlState>>,
}

impl Controls {
    /// Create control state in the `Idle` state.
    #[must_use]
    pub fn new(params: NarrationParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControlState {
                state: SessionState::Idle,
                cursor: Cursor::new(1, 1),
                paused: false,
                stop_requested: false,
                pending_skip: 0,
                interrupted: false,
                params,
            })),
        }
    }

    // ── Session state ──────────────────────────────────────────────

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Transition to `state`. Returns `true` if the state actually changed.
    pub fn set_state(&self, state: SessionState) -> bool {
        let mut inner = self.lock();
        if inner.state == state {
            return false;
        }
        tracing::debug!(old = ?inner.state, new = ?state, "Session state transition");
        inner.state = state;
        true
    }

    // ── Cursor ─────────────────────────────────────────────────────

    /// Current playback cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.lock().cursor
    }

    /// Move the cursor (natural advancement or rollover).
    pub fn seat_cursor(&self, cursor: Cursor) {
        self.lock().cursor = cursor;
    }

    /// Reset every flag for a fresh start and seat the opening cursor.
    pub fn arm(&self, cursor: Cursor) {
        let mut inner = self.lock();
        inner.cursor = cursor;
        inner.paused = false;
        inner.stop_requested = false;
        inner.pending_skip = 0;
        inner.interrupted = false;
    }

    /// Explicit jump: re-seat the cursor, drop any pending skip, and
    /// interrupt in-flight playback.
    pub fn jump(&self, cursor: Cursor) {
        let mut inner = self.lock();
        inner.cursor = cursor;
        inner.pending_skip = 0;
        inner.interrupted = true;
    }

    // ── Parameters ─────────────────────────────────────────────────

    /// Snapshot of the active narration parameters.
    #[must_use]
    pub fn params(&self) -> NarrationParams {
        self.lock().params.clone()
    }

    /// Change the active voice. Returns `true` if it differs from the
    /// previous one (the caller must then invalidate the speech cache).
    pub fn set_voice(&self, voice_id: &str) -> bool {
        let mut inner = self.lock();
        if inner.params.voice_id == voice_id {
            return false;
        }
        inner.params.voice_id = voice_id.to_string();
        true
    }

    /// Change the narration rate for subsequent synthesis.
    pub fn set_rate(&self, rate_percent: i32) {
        self.lock().params.rate_percent = rate_percent;
    }

    /// Change the playback volume.
    pub fn set_volume(&self, volume: f32) {
        self.lock().params.volume = volume.clamp(0.0, 1.0);
    }

    // ── Pause / stop / skip flags ──────────────────────────────────

    /// Whether narration is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Set the pause flag. Returns `true` on an actual transition.
    pub fn set_paused(&self, paused: bool) -> bool {
        let mut inner = self.lock();
        if inner.paused == paused {
            return false;
        }
        inner.paused = paused;
        true
    }

    /// Request a full stop: interrupt any in-flight playback and clear the
    /// pause flag so nothing keeps waiting on a pause that will never lift.
    pub fn request_stop(&self) {
        let mut inner = self.lock();
        inner.stop_requested = true;
        inner.interrupted = true;
        inner.paused = false;
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Record a pending skip of `delta` paragraphs (+1 or −1).
    ///
    /// Ignored while another skip is still pending — repeated key presses
    /// must not stack up into a multi-paragraph leap. Returns whether the
    /// request was accepted.
    pub fn request_skip(&self, delta: i8) -> bool {
        let mut inner = self.lock();
        if inner.pending_skip != 0 || inner.stop_requested {
            return false;
        }
        inner.pending_skip = delta;
        inner.interrupted = true;
        true
    }

    /// Take and clear the pending skip delta.
    #[must_use]
    pub fn take_skip(&self) -> i8 {
        let mut inner = self.lock();
        std::mem::take(&mut inner.pending_skip)
    }

    /// Whether in-flight playback should be abandoned promptly
    /// (stop, skip, or jump pending).
    #[must_use]
    pub fn interrupt_requested(&self) -> bool {
        let inner = self.lock();
        inner.stop_requested || inner.pending_skip != 0 || inner.interrupted
    }

    /// Clear the jump/skip interrupt marker after it has been honoured.
    pub fn clear_interrupt(&self) {
        self.lock().interrupted = false;
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> Controls {
        Controls::new(NarrationParams {
            voice_id: "voice-a".to_string(),
            rate_percent: 0,
            volume: 1.0,
        })
    }

    #[test]
    fn skip_requests_do_not_stack() {
        let c = controls();
        assert!(c.request_skip(1));
        assert!(!c.request_skip(1), "second skip must be ignored while pending");
        assert_eq!(c.take_skip(), 1);
        assert!(c.request_skip(-1), "accepted again once the pending skip is taken");
    }

    #[test]
    fn skip_raises_the_interrupt() {
        let c = controls();
        assert!(!c.interrupt_requested());
        let _ = c.request_skip(1);
        assert!(c.interrupt_requested());
        let _ = c.take_skip();
        c.clear_interrupt();
        assert!(!c.interrupt_requested());
    }

    #[test]
    fn stop_wins_over_skip() {
        let c = controls();
        c.request_stop();
        assert!(!c.request_skip(1));
        assert!(c.interrupt_requested());
    }

    #[test]
    fn jump_clears_pending_skip() {
        let c = controls();
        let _ = c.request_skip(1);
        c.jump(Cursor::new(5, 3));
        assert_eq!(c.take_skip(), 0);
        assert_eq!(c.cursor(), Cursor::new(5, 3));
        assert!(c.interrupt_requested());
    }

    #[test]
    fn voice_change_is_detected() {
        let c = controls();
        assert!(!c.set_voice("voice-a"));
        assert!(c.set_voice("voice-b"));
        assert_eq!(c.params().voice_id, "voice-b");
    }

    #[test]
    fn volume_is_clamped() {
        let c = controls();
        c.set_volume(7.0);
        assert!((c.params().volume - 1.0).abs() < f32::EPSILON);
        c.set_volume(-1.0);
        assert!(c.params().volume.abs() < f32::EPSILON);
    }
}
