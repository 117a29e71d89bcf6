//! Playback controller — makes one paragraph audible.
//!
//! `speak()` blocks the narration thread (never the UI thread) until the
//! paragraph's audio finishes or a command interrupts it. The cache is
//! checked first; a hit means the transition to the next paragraph is
//! essentially instant, which is the whole point of the pre-fetch design.
//! A miss falls back to synchronous synthesis on the calling thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use narrata_core::SpeechSynthesizer;

use crate::cache::SpeechCache;
use crate::controls::Controls;
use crate::fingerprint::Fingerprint;
use crate::output::AudioOutput;

/// How often the playback poll loop samples channel and control state.
///
/// Also the bound on command responsiveness: a skip or stop lands within
/// one interval of being issued.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How one `speak()` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Audio played to the end (or was skipped over a local failure);
    /// the session should advance to the next paragraph.
    Completed,

    /// A stop/skip/jump command cut playback short; the session must
    /// consult the pending command instead of auto-advancing.
    Interrupted,
}

/// Drives the speech channel for one paragraph at a time.
pub struct PlaybackController {
    cache: Arc<SpeechCache>,
    synth: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    controls: Controls,
}

impl PlaybackController {
    /// Assemble a controller over shared pipeline state.
    #[must_use]
    pub fn new(
        cache: Arc<SpeechCache>,
        synth: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        controls: Controls,
    ) -> Self {
        Self {
            cache,
            synth,
            output,
            controls,
        }
    }

    /// Narrate `text`, blocking until the audio completes or a command
    /// interrupts it.
    ///
    /// Failure semantics: synthesis and device errors are logged and the
    /// paragraph is treated as played — one bad paragraph must never halt
    /// the session.
    pub fn speak(&self, text: &str) -> SpeakOutcome {
        if text.trim().is_empty() {
            return SpeakOutcome::Completed;
        }

        let params = self.controls.params();
        let fingerprint = Fingerprint::compute(text, &params.voice_id, params.rate_percent);

        let audio = match self.cache.get(&fingerprint) {
            Some(audio) => {
                tracing::debug!(%fingerprint, "Cache hit — instant transition");
                audio
            }
            None => {
                tracing::debug!(%fingerprint, "Cache miss — synthesizing inline");
                match self
                    .synth
                    .synthesize(text, &params.voice_id, params.rate_percent)
                {
                    Ok(audio) => {
                        let audio = Arc::new(audio);
                        self.cache.put(fingerprint, Arc::clone(&audio));
                        audio
                    }
                    Err(e) => {
                        tracing::warn!(%fingerprint, error = %e, "Synthesis failed — skipping paragraph");
                        return SpeakOutcome::Completed;
                    }
                }
            }
        };

        if let Err(e) = self.output.load(audio) {
            tracing::warn!(error = %e, "Audio device rejected paragraph — treating as played");
            return SpeakOutcome::Completed;
        }
        self.output.set_volume(params.volume);

        // If we are already paused, leave the channel suspended; the poll
        // loop resumes it when the pause flag clears.
        let mut channel_paused = self.controls.is_paused();
        if !channel_paused {
            self.output.play();
        }

        loop {
            if self.controls.interrupt_requested() {
                self.output.stop();
                return SpeakOutcome::Interrupted;
            }

            let want_pause = self.controls.is_paused();
            if want_pause && !channel_paused {
                self.output.pause();
                channel_paused = true;
            } else if !want_pause && channel_paused {
                self.output.resume();
                channel_paused = false;
            }

            if !self.output.is_playing() && !want_pause {
                break;
            }

            thread::sleep(POLL_INTERVAL);
        }

        SpeakOutcome::Completed
    }
}
