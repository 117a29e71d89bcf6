//! Filesystem chapter store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use narrata_core::{Chapter, ChapterStore, StoreError};

/// Novel-level metadata stored beside the chapter directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NovelMetadata {
    /// Novel title.
    pub title: String,

    /// Author, if known.
    pub author: Option<String>,
}

/// Chapter store reading `ch_NNNN.json` files from a novel directory.
///
/// Chapter files are probed with both 3- and 4-digit zero padding; scraped
/// libraries contain a mix of the two depending on when they were extracted.
pub struct FsChapterStore {
    chapters_dir: PathBuf,
    metadata: NovelMetadata,
}

impl FsChapterStore {
    /// Open a novel directory.
    ///
    /// The directory does not have to contain any chapters yet;
    /// `metadata.json` is optional and defaults to an untitled novel.
    pub fn open(novel_dir: impl AsRef<Path>) -> Self {
        let novel_dir = novel_dir.as_ref();
        let metadata = Self::load_metadata(novel_dir);

        tracing::debug!(
            dir = %novel_dir.display(),
            title = %metadata.title,
            "Opened novel directory"
        );

        Self {
            chapters_dir: novel_dir.join("chapters"),
            metadata,
        }
    }

    /// Novel metadata (title defaults to empty when `metadata.json` is absent).
    #[must_use]
    pub const fn metadata(&self) -> &NovelMetadata {
        &self.metadata
    }

    fn load_metadata(novel_dir: &Path) -> NovelMetadata {
        let path = novel_dir.join("metadata.json");
        match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed metadata.json");
                NovelMetadata::default()
            }),
            Err(_) => NovelMetadata::default(),
        }
    }

    /// Candidate file paths for a chapter number, most specific first.
    fn chapter_paths(&self, number: u32) -> [PathBuf; 2] {
        [
            self.chapters_dir.join(format!("ch_{number:04}.json")),
            self.chapters_dir.join(format!("ch_{number:03}.json")),
        ]
    }
}

impl ChapterStore for FsChapterStore {
    fn available_chapters(&self) -> Vec<u32> {
        let Ok(entries) = fs::read_dir(&self.chapters_dir) else {
            return Vec::new();
        };

        let mut numbers: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_prefix("ch_")?
                    .strip_suffix(".json")?
                    .parse()
                    .ok()
            })
            .collect();

        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    fn load_chapter(&self, number: u32) -> Result<Option<Chapter>, StoreError> {
        for path in self.chapter_paths(number) {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let chapter: Chapter = serde_json::from_str(&raw)
                .map_err(|e| StoreError::Malformed(format!("{}: {e}", path.display())))?;
            return Ok(Some(chapter));
        }
        Ok(None)
    }
}
