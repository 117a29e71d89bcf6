//! Reading-progress persistence.
//!
//! A small JSON document remembering where the listener stopped, so the CLI
//! can resume mid-novel. Loading is lenient: a missing or unreadable file
//! yields defaults rather than an error — losing progress should never make
//! the reader unusable.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Persistent reading position and playback preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    /// Chapter the listener was on.
    pub chapter: u32,

    /// 1-based paragraph within that chapter.
    pub paragraph: usize,

    /// Friendly voice name (see the core voice catalog).
    pub voice: String,

    /// Narration rate offset in percent.
    pub rate_percent: i32,

    /// Narration volume, 0.0–1.0.
    pub volume: f32,

    /// Background-music volume, 0.0–1.0.
    pub music_volume: f32,

    /// When this progress was last written.
    pub saved_at: DateTime<Utc>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            chapter: 1,
            paragraph: 1,
            voice: narrata_core::DEFAULT_VOICE.name.to_string(),
            rate_percent: 0,
            volume: 1.0,
            music_volume: 0.3,
            saved_at: Utc::now(),
        }
    }
}

impl Progress {
    /// Load progress from `path`, falling back to defaults if the file is
    /// missing or unreadable.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed progress file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save progress to `path`, creating parent directories as needed.
    /// Refreshes `saved_at`.
    pub fn save(&mut self, path: &Path) -> Result<(), LibraryError> {
        self.saved_at = Utc::now();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(
            path = %path.display(),
            chapter = self.chapter,
            paragraph = self.paragraph,
            "Progress saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/progress.json");

        let mut progress = Progress {
            chapter: 961,
            paragraph: 14,
            voice: "antonio".to_string(),
            rate_percent: 25,
            volume: 0.8,
            music_volume: 0.2,
            ..Progress::default()
        };
        progress.save(&path).unwrap();

        let loaded = Progress::load(&path);
        assert_eq!(loaded.chapter, 961);
        assert_eq!(loaded.paragraph, 14);
        assert_eq!(loaded.voice, "antonio");
        assert_eq!(loaded.rate_percent, 25);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let loaded = Progress::load(Path::new("/nonexistent/progress.json"));
        assert_eq!(loaded.chapter, 1);
        assert_eq!(loaded.paragraph, 1);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "]]]").unwrap();

        let loaded = Progress::load(&path);
        assert_eq!(loaded.chapter, 1);
        assert_eq!(loaded.voice, narrata_core::DEFAULT_VOICE.name);
    }
}
