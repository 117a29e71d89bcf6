//! Dedicated audio thread — isolates `!Send` rodio resources.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so rather than
//! spreading `unsafe impl Send` around, every rodio type is confined to a
//! single OS thread for its whole lifetime. The public
//! [`AudioThreadHandle`] is the `Send + Sync` proxy the rest of the crate
//! holds; each operation becomes an [`AudioCommand`] sent over a channel.
//!
//! The thread owns two independent sinks on one output stream: the speech
//! channel (driven by the playback controller through [`RodioOutput`]) and
//! the music channel (driven by the
//! [`MusicPlayer`](crate::music::MusicPlayer)). There is exactly one audio
//! thread per session; tearing down the handle shuts the thread down and
//! releases the device.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use rodio::source::Source;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use narrata_core::SpeechAudio;

use crate::error::NarrationError;
use crate::output::AudioOutput;

// ── Commands ───────────────────────────────────────────────────────

enum AudioCommand {
    /// Replace the speech channel's content; the new sink starts paused.
    LoadSpeech {
        audio: Arc<SpeechAudio>,
        reply: mpsc::Sender<Result<(), NarrationError>>,
    },

    /// Start or resume the speech channel (fire-and-forget).
    PlaySpeech,

    /// Suspend the speech channel, keeping position.
    PauseSpeech,

    /// Halt the speech channel and discard its content.
    StopSpeech,

    /// Query whether speech audio is still queued.
    SpeechIsPlaying { reply: mpsc::Sender<bool> },

    /// Set speech channel volume.
    SetSpeechVolume(f32),

    /// Loop an audio file on the music channel.
    PlayMusic {
        path: PathBuf,
        volume: f32,
        reply: mpsc::Sender<Result<(), NarrationError>>,
    },

    /// Halt the music channel.
    StopMusic,

    /// Set music channel volume.
    SetMusicVolume(f32),

    /// Shut down the audio thread, releasing the device.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated audio thread.
///
/// Request–reply methods block the caller until the audio thread responds;
/// the latency is channel round-trip plus the rodio call itself. Channel
/// failures map to [`NarrationError::AudioThreadDied`].
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread and open the default output device on it.
    ///
    /// Device-open errors are propagated back through a one-shot init
    /// channel so the caller fails fast instead of discovering a dead
    /// thread later.
    pub fn spawn() -> Result<Self, NarrationError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), NarrationError>>();

        let thread = thread::Builder::new()
            .name("narrata-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| NarrationError::Playback(format!("failed to spawn audio thread: {e}")))?;

        init_rx
            .recv()
            .map_err(|_| NarrationError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    // ── Speech channel ─────────────────────────────────────────────

    pub(crate) fn load_speech(&self, audio: Arc<SpeechAudio>) -> Result<(), NarrationError> {
        self.send_and_recv(|reply| AudioCommand::LoadSpeech { audio, reply })
    }

    pub(crate) fn play_speech(&self) {
        let _ = self.cmd_tx.send(AudioCommand::PlaySpeech);
    }

    pub(crate) fn pause_speech(&self) {
        let _ = self.cmd_tx.send(AudioCommand::PauseSpeech);
    }

    pub(crate) fn stop_speech(&self) {
        let _ = self.cmd_tx.send(AudioCommand::StopSpeech);
    }

    pub(crate) fn speech_is_playing(&self) -> bool {
        self.query(|reply| AudioCommand::SpeechIsPlaying { reply })
            .unwrap_or(false)
    }

    pub(crate) fn set_speech_volume(&self, volume: f32) {
        let _ = self.cmd_tx.send(AudioCommand::SetSpeechVolume(volume));
    }

    // ── Music channel ──────────────────────────────────────────────

    pub(crate) fn play_music(&self, path: PathBuf, volume: f32) -> Result<(), NarrationError> {
        self.send_and_recv(|reply| AudioCommand::PlayMusic {
            path,
            volume,
            reply,
        })
    }

    pub(crate) fn stop_music(&self) {
        let _ = self.cmd_tx.send(AudioCommand::StopMusic);
    }

    pub(crate) fn set_music_volume(&self, volume: f32) {
        let _ = self.cmd_tx.send(AudioCommand::SetMusicVolume(volume));
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn send_and_recv<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<T, NarrationError>>) -> AudioCommand,
    ) -> Result<T, NarrationError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| NarrationError::AudioThreadDied)?;
        rx.recv().map_err(|_| NarrationError::AudioThreadDied)?
    }

    fn query<T>(&self, build: impl FnOnce(mpsc::Sender<T>) -> AudioCommand) -> Option<T> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx.send(build(tx)).ok()?;
        rx.recv().ok()
    }

    // ── Audio thread event loop ────────────────────────────────────

    /// The body of the dedicated audio thread. Owns the output stream and
    /// both sinks for their entire lifetime — they never cross thread
    /// boundaries.
    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), NarrationError>>) {
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(NarrationError::Playback(e.to_string())));
                return;
            }
        };
        // Keep the stream alive for the thread's lifetime.
        let _stream = stream;

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        let mut speech_sink: Option<Sink> = None;
        let mut speech_volume: f32 = 1.0;
        let mut music_sink: Option<Sink> = None;

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::LoadSpeech { audio, reply } => {
                    let _ = reply.send(load_speech(
                        &stream_handle,
                        &mut speech_sink,
                        &audio,
                        speech_volume,
                    ));
                }

                AudioCommand::PlaySpeech => {
                    if let Some(ref sink) = speech_sink {
                        sink.play();
                    }
                }

                AudioCommand::PauseSpeech => {
                    if let Some(ref sink) = speech_sink {
                        sink.pause();
                    }
                }

                AudioCommand::StopSpeech => {
                    if let Some(sink) = speech_sink.take() {
                        sink.stop();
                    }
                }

                AudioCommand::SpeechIsPlaying { reply } => {
                    let playing = speech_sink.as_ref().is_some_and(|s| !s.empty());
                    let _ = reply.send(playing);
                }

                AudioCommand::SetSpeechVolume(volume) => {
                    speech_volume = volume.clamp(0.0, 1.0);
                    if let Some(ref sink) = speech_sink {
                        sink.set_volume(speech_volume);
                    }
                }

                AudioCommand::PlayMusic {
                    path,
                    volume,
                    reply,
                } => {
                    let _ = reply.send(play_music(&stream_handle, &mut music_sink, &path, volume));
                }

                AudioCommand::StopMusic => {
                    if let Some(sink) = music_sink.take() {
                        sink.stop();
                    }
                }

                AudioCommand::SetMusicVolume(volume) => {
                    if let Some(ref sink) = music_sink {
                        sink.set_volume(volume.clamp(0.0, 1.0));
                    }
                }

                AudioCommand::Shutdown => break,
            }
        }

        // Sinks and the stream are dropped here, on the audio thread.
        tracing::debug!("Audio thread shutting down");
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        // Best-effort shutdown — the thread may already be dead.
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Replace the speech sink with a fresh, paused sink holding `audio`.
fn load_speech(
    stream_handle: &OutputStreamHandle,
    slot: &mut Option<Sink>,
    audio: &SpeechAudio,
    volume: f32,
) -> Result<(), NarrationError> {
    if let Some(old) = slot.take() {
        old.stop();
    }

    let sink = Sink::try_new(stream_handle).map_err(|e| NarrationError::Playback(e.to_string()))?;
    sink.pause();
    sink.set_volume(volume);
    sink.append(rodio::buffer::SamplesBuffer::new(
        1,
        audio.sample_rate,
        audio.samples.clone(),
    ));
    *slot = Some(sink);
    Ok(())
}

/// Loop an audio file on the music sink.
fn play_music(
    stream_handle: &OutputStreamHandle,
    slot: &mut Option<Sink>,
    path: &std::path::Path,
    volume: f32,
) -> Result<(), NarrationError> {
    if let Some(old) = slot.take() {
        old.stop();
    }

    let file = File::open(path)
        .map_err(|e| NarrationError::Playback(format!("{}: {e}", path.display())))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| NarrationError::Playback(format!("{}: {e}", path.display())))?;

    let sink = Sink::try_new(stream_handle).map_err(|e| NarrationError::Playback(e.to_string()))?;
    sink.set_volume(volume.clamp(0.0, 1.0));
    sink.append(source.repeat_infinite());
    *slot = Some(sink);

    tracing::debug!(track = %path.display(), "Background music started");
    Ok(())
}

// ── Rodio-backed AudioOutput adapter ───────────────────────────────

/// Speech-channel [`AudioOutput`] backed by the dedicated audio thread.
pub struct RodioOutput {
    handle: Arc<AudioThreadHandle>,
}

impl RodioOutput {
    /// Open the default output device (spawning the audio thread).
    pub fn new() -> Result<Self, NarrationError> {
        Ok(Self {
            handle: Arc::new(AudioThreadHandle::spawn()?),
        })
    }

    /// Share the underlying audio thread, e.g. with a
    /// [`MusicPlayer`](crate::music::MusicPlayer).
    #[must_use]
    pub fn handle(&self) -> Arc<AudioThreadHandle> {
        Arc::clone(&self.handle)
    }
}

impl AudioOutput for RodioOutput {
    fn load(&self, audio: Arc<SpeechAudio>) -> Result<(), NarrationError> {
        self.handle.load_speech(audio)
    }

    fn play(&self) {
        self.handle.play_speech();
    }

    fn pause(&self) {
        self.handle.pause_speech();
    }

    fn resume(&self) {
        // A paused rodio sink resumes exactly where it left off.
        self.handle.play_speech();
    }

    fn stop(&self) {
        self.handle.stop_speech();
    }

    fn is_playing(&self) -> bool {
        self.handle.speech_is_playing()
    }

    fn set_volume(&self, volume: f32) {
        self.handle.set_speech_volume(volume);
    }
}
