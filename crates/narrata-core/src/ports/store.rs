//! Chapter store port.

use crate::chapter::Chapter;

/// Errors a chapter store can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Chapter data could not be read.
    #[error("chapter file could not be read: {0}")]
    Io(#[from] std::io::Error),

    /// Chapter data exists but does not parse.
    #[error("chapter file is malformed: {0}")]
    Malformed(String),
}

/// Read-only provider of ordered chapter text.
///
/// The store never participates in playback; it is queried by the narration
/// session at start, on rollover, and on explicit jumps. A missing chapter
/// is `Ok(None)` — only I/O and parse failures are errors.
pub trait ChapterStore: Send + Sync {
    /// All chapter numbers the store can serve, sorted ascending.
    fn available_chapters(&self) -> Vec<u32>;

    /// Load one chapter, or `None` if the number is unknown.
    fn load_chapter(&self, number: u32) -> Result<Option<Chapter>, StoreError>;

    /// First available chapter number strictly greater than `number`.
    ///
    /// Chapter numbering may have gaps (scraped novels often skip announce
    /// chapters), so this is not simply `number + 1`.
    fn next_chapter_after(&self, number: u32) -> Option<u32> {
        self.available_chapters()
            .into_iter()
            .find(|&n| n > number)
    }
}
