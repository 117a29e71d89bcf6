//! Speech synthesis port.

use std::time::Duration;

/// Decoded, playable speech audio produced by a synthesizer.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    /// Mono PCM f32 samples.
    pub samples: Vec<f32>,

    /// Sample rate of the audio in Hz.
    pub sample_rate: u32,

    /// Duration of the audio.
    pub duration: Duration,
}

/// Errors a speech backend can report.
///
/// All of these are treated as transient by the pipeline: a failed paragraph
/// is logged and skipped, never fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The backend service or process failed.
    #[error("speech backend failed: {0}")]
    Backend(String),

    /// The backend produced audio that could not be decoded.
    #[error("synthesized audio could not be decoded: {0}")]
    Decode(String),

    /// I/O failure talking to the backend.
    #[error("synthesis I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backend-agnostic text-to-speech engine.
///
/// The signature is synchronous: both call sites (the pre-fetch worker and
/// the narration thread's cache-miss fallback) are dedicated OS threads that
/// are allowed to block. Implementations wrapping async transports run their
/// own executor internally and are responsible for bounding their latency
/// with a timeout; a timeout surfaces as [`SynthesisError::Backend`].
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken by `voice_id` at `rate_percent`.
    ///
    /// `rate_percent` is a signed speed offset (`-50` = half again slower,
    /// `+100` = double speed), matching what neural TTS services accept.
    fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        rate_percent: i32,
    ) -> Result<SpeechAudio, SynthesisError>;
}
