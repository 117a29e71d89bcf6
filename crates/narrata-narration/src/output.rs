//! Audio output port.
//!
//! Abstraction over the speech playback channel, so the pipeline can be
//! driven by the rodio-backed device in production and by an instrumented
//! fake in tests. Object-safe; all methods take `&self` — implementations
//! use interior mutability (the rodio adapter routes every call through a
//! command channel to its dedicated audio thread).

use std::sync::Arc;

use narrata_core::SpeechAudio;

use crate::error::NarrationError;

/// One speech playback channel.
///
/// The playback controller is the sole writer to its channel; background
/// music plays on a separate channel and never goes through this trait.
pub trait AudioOutput: Send + Sync {
    /// Queue `audio` on the channel, replacing anything already loaded.
    /// The channel starts out paused; call [`play`](AudioOutput::play).
    fn load(&self, audio: Arc<SpeechAudio>) -> Result<(), NarrationError>;

    /// Start (or restart after [`pause`](AudioOutput::pause)) playback.
    fn play(&self);

    /// Suspend playback, keeping position.
    fn pause(&self);

    /// Resume playback from where [`pause`](AudioOutput::pause) left it.
    fn resume(&self);

    /// Halt playback and discard the loaded audio.
    fn stop(&self);

    /// Whether loaded audio has not yet finished playing.
    ///
    /// A paused channel still reports `true` — the audio is suspended,
    /// not gone.
    fn is_playing(&self) -> bool;

    /// Set channel volume (0.0 = muted, 1.0 = full).
    fn set_volume(&self, volume: f32);
}
