//! Core domain types and port definitions for narrata.
//!
//! This crate is dependency-light on purpose: it holds the chapter/cursor
//! domain model, the voice catalog, and the port traits that adapter crates
//! implement ([`ChapterStore`], [`SpeechSynthesizer`]). Nothing here touches
//! the filesystem, the network, or an audio device.

pub mod chapter;
pub mod ports;
pub mod voice;

// Re-export commonly used types for convenience
pub use chapter::{Chapter, Cursor};
pub use ports::{ChapterStore, SpeechAudio, SpeechSynthesizer, StoreError, SynthesisError};
pub use voice::{DEFAULT_VOICE, VoiceProfile, find_voice, voice_catalog};
