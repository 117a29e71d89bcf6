//! Port traits — the seams between the narration pipeline and its
//! collaborators.
//!
//! Adapter crates implement these: `narrata-library` provides the
//! filesystem-backed [`ChapterStore`]; the synthesizer adapter lives next to
//! the pipeline in `narrata-narration`. Both traits are object-safe and
//! `Send + Sync` so one instance can be shared between the narration thread
//! and the pre-fetch worker.

mod store;
mod synth;

pub use store::{ChapterStore, StoreError};
pub use synth::{SpeechAudio, SpeechSynthesizer, SynthesisError};
