//! Narration playback pipeline.
//!
//! Turns a sequence of chapter paragraphs into continuous, low-latency
//! speech with interactive control. Four pieces cooperate:
//!
//! - [`SpeechCache`](cache::SpeechCache) — bounded fingerprint → audio
//!   store, evicted FIFO by insertion.
//! - [`PrefetchWorker`](prefetch::PrefetchWorker) — background thread that
//!   synthesizes the *next* paragraph while the current one plays.
//! - [`PlaybackController`](playback::PlaybackController) — makes one
//!   paragraph audible, honouring pause/skip within one 10 ms poll tick.
//! - [`NarrationSession`](session::NarrationSession) — the state machine
//!   and narration thread tying cursor advancement, chapter rollover, and
//!   commands together.
//!
//! Three threads are live per active session: the caller's (UI) thread
//! issuing commands, the narration thread, and the pre-fetch worker — plus
//! the audio actor thread that owns the `rodio` device. All shared state
//! sits behind a single control mutex and the cache's own lock.

pub mod audio_thread;
pub mod cache;
pub mod controls;
pub mod error;
pub mod fingerprint;
pub mod music;
pub mod output;
pub mod playback;
pub mod prefetch;
pub mod session;
pub mod synth;

mod threads;

// Re-export key types for convenience
pub use audio_thread::{AudioThreadHandle, RodioOutput};
pub use cache::{DEFAULT_CACHE_CAPACITY, SpeechCache};
pub use controls::{Controls, NarrationParams};
pub use error::NarrationError;
pub use fingerprint::Fingerprint;
pub use music::{Mood, MusicLibrary, MusicPlayer};
pub use output::AudioOutput;
pub use playback::{POLL_INTERVAL, PlaybackController, SpeakOutcome};
pub use prefetch::{PrefetchHandle, PrefetchRequest, PrefetchWorker};
pub use session::{
    NarrationEvent, NarrationSession, SHUTDOWN_TIMEOUT, SessionConfig, SessionState,
};
pub use synth::{CommandSynthesizer, DEFAULT_SYNTH_COMMAND};
