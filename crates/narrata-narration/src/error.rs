//! Narration pipeline error types.

use narrata_core::{StoreError, SynthesisError};

/// Errors that can occur in the narration pipeline.
///
/// Only a handful of these ever reach the presentation layer: bad session
/// setup (`ChapterNotFound`, `EmptyChapter`), misuse (`AlreadyStarted`,
/// `NotActive`), and the non-fatal `ShutdownTimeout` warning. Everything
/// per-paragraph is logged and absorbed inside the loop.
#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    /// Requested chapter does not exist in the store.
    #[error("chapter {chapter} not found")]
    ChapterNotFound { chapter: u32 },

    /// Requested chapter exists but has no narratable content.
    #[error("chapter {chapter} has no paragraphs")]
    EmptyChapter { chapter: u32 },

    /// The session was already started; create a new session to restart.
    #[error("narration session already started — create a new session to restart")]
    AlreadyStarted,

    /// A control command was issued while no narration is running.
    #[error("narration session is not running")]
    NotActive,

    /// Chapter store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Speech synthesis failure.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// Audio device failure.
    #[error("audio playback failed: {0}")]
    Playback(String),

    /// The dedicated audio thread is no longer responding.
    #[error("audio thread died")]
    AudioThreadDied,

    /// A worker thread did not stop within its shutdown bound.
    ///
    /// Non-fatal: resources are reclaimed best-effort and the session is
    /// still considered stopped.
    #[error("{what} did not shut down within {timeout_ms} ms")]
    ShutdownTimeout { what: &'static str, timeout_ms: u64 },
}
