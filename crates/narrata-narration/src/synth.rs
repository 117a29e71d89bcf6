//! External-command speech synthesizer.
//!
//! Shells out to a TTS command-line tool (by default `edge-tts`, which
//! fronts the Microsoft neural voices) and decodes the media file it
//! writes. This keeps the pipeline free of any particular TTS SDK: any
//! tool that accepts `--voice`, `--rate=+N%`, `--text`, and
//! `--write-media <file>` works.
//!
//! Each call is bounded by a wall-clock timeout; a stuck backend process
//! is killed and reported as a synthesis failure, which the pipeline
//! absorbs at the paragraph level.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use rodio::source::Source;
use rodio::Decoder;
use wait_timeout::ChildExt;

use narrata_core::{SpeechAudio, SpeechSynthesizer, SynthesisError};

/// Default backend command.
pub const DEFAULT_SYNTH_COMMAND: &str = "edge-tts";

/// Default bound on one synthesis call.
pub const DEFAULT_SYNTH_TIMEOUT: Duration = Duration::from_secs(30);

/// [`SpeechSynthesizer`] backed by an external TTS command.
pub struct CommandSynthesizer {
    program: String,
    timeout: Duration,
}

impl CommandSynthesizer {
    /// Use `program` as the TTS backend with the default timeout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_SYNTH_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTH_COMMAND)
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        rate_percent: i32,
    ) -> Result<SpeechAudio, SynthesisError> {
        let media = tempfile::Builder::new()
            .prefix("narrata-tts-")
            .suffix(".mp3")
            .tempfile()?;

        let mut child = Command::new(&self.program)
            .arg("--voice")
            .arg(voice_id)
            .arg(format!("--rate={rate_percent:+}%"))
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(media.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SynthesisError::Backend(format!("{}: {e}", self.program)))?;

        match child.wait_timeout(self.timeout)? {
            Some(status) if status.success() => decode_file(media.path()),
            Some(status) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                Err(SynthesisError::Backend(format!(
                    "{} exited with {status}: {}",
                    self.program,
                    stderr.trim()
                )))
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(SynthesisError::Backend(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                )))
            }
        }
    }
}

/// Decode an audio file into mono PCM.
fn decode_file(path: &Path) -> Result<SpeechAudio, SynthesisError> {
    let file = File::open(path)?;
    let decoder =
        Decoder::new(BufReader::new(file)).map_err(|e| SynthesisError::Decode(e.to_string()))?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let raw: Vec<f32> = decoder.convert_samples().collect();

    if raw.is_empty() {
        return Err(SynthesisError::Decode("backend produced no audio".to_string()));
    }

    let samples = downmix(raw, channels);

    #[allow(clippy::cast_precision_loss)]
    let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate));

    Ok(SpeechAudio {
        samples,
        sample_rate,
        duration,
    })
}

/// Average interleaved channels down to mono.
fn downmix(raw: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return raw;
    }
    let channels = usize::from(channels);
    raw.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
