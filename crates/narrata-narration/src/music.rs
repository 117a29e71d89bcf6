//! Background music.
//!
//! Looped ambience on its own channel, fully independent of narration:
//! pausing or skipping speech never touches the music, and vice versa.
//! Tracks are plain audio files discovered by filename prefix in a music
//! directory — `calm_*` for reading ambience, `combat_*` for fight scenes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio_thread::AudioThreadHandle;
use crate::error::NarrationError;

/// Music mood selected by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    /// Calm reading ambience.
    Reading,

    /// Combat-scene music.
    Combat,
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// Tracks discovered in a music directory, grouped by mood.
#[derive(Debug, Clone, Default)]
pub struct MusicLibrary {
    reading: Vec<PathBuf>,
    combat: Vec<PathBuf>,
}

impl MusicLibrary {
    /// Scan `dir` for `calm_*` / `combat_*` audio files.
    ///
    /// A missing directory yields an empty library — music is optional.
    #[must_use]
    pub fn discover(dir: &Path) -> Self {
        let mut library = Self::default();

        let Ok(entries) = fs::read_dir(dir) else {
            tracing::debug!(dir = %dir.display(), "No music directory");
            return library;
        };

        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let has_audio_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if !has_audio_ext {
                continue;
            }

            if name.starts_with("calm_") {
                library.reading.push(path);
            } else if name.starts_with("combat_") {
                library.combat.push(path);
            }
        }

        library.reading.sort();
        library.combat.sort();

        tracing::info!(
            reading = library.reading.len(),
            combat = library.combat.len(),
            "Music library loaded"
        );
        library
    }

    /// Tracks available for a mood.
    #[must_use]
    pub fn tracks(&self, mood: Mood) -> &[PathBuf] {
        match mood {
            Mood::Reading => &self.reading,
            Mood::Combat => &self.combat,
        }
    }

    /// Whether no tracks were found at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reading.is_empty() && self.combat.is_empty()
    }
}

/// Looped background-music player on the shared audio thread.
pub struct MusicPlayer {
    handle: Arc<AudioThreadHandle>,
    library: MusicLibrary,
    volume: f32,
    muted: bool,
    mood: Option<Mood>,
}

impl MusicPlayer {
    /// Create a player over an audio thread and a discovered library.
    #[must_use]
    pub fn new(handle: Arc<AudioThreadHandle>, library: MusicLibrary) -> Self {
        Self {
            handle,
            library,
            volume: 0.3,
            muted: false,
            mood: None,
        }
    }

    /// Start looping the first track of `mood`, replacing whatever plays.
    pub fn play(&mut self, mood: Mood) -> Result<(), NarrationError> {
        let Some(track) = self.library.tracks(mood).first().cloned() else {
            tracing::warn!(?mood, "No tracks for requested mood");
            return Ok(());
        };

        self.handle.play_music(track, self.effective_volume())?;
        self.mood = Some(mood);
        Ok(())
    }

    /// Stop the music channel.
    pub fn stop(&mut self) {
        self.handle.stop_music();
        self.mood = None;
    }

    /// Currently playing mood, if any.
    #[must_use]
    pub const fn mood(&self) -> Option<Mood> {
        self.mood
    }

    /// Set music volume (0.0–1.0), effective immediately unless muted.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.handle.set_music_volume(self.effective_volume());
    }

    /// Mute or unmute without losing the configured volume.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.handle.set_music_volume(self.effective_volume());
    }

    /// Whether the music is muted.
    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }
}
