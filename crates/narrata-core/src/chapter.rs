//! Chapter and cursor domain types.
//!
//! A [`Chapter`] is an ordered list of narratable paragraphs; a [`Cursor`]
//! points at the paragraph that is currently (or about to be) narrated.
//! Paragraph indices are **1-based** throughout — that is what chapter files
//! use, what the UI displays, and what listeners think in. A cursor whose
//! paragraph index is `len + 1` means "chapter exhausted, roll to the next".

use serde::{Deserialize, Serialize};

/// One chapter of a novel: a number, a title, and its paragraphs in reading
/// order. Immutable once loaded — the narration pipeline never mutates text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter number as published (numbering may have gaps).
    pub number: u32,

    /// Chapter title.
    pub title: String,

    /// Paragraph texts in reading order.
    pub paragraphs: Vec<String>,
}

impl Chapter {
    /// Number of paragraphs in this chapter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    /// Whether the chapter has no narratable content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Paragraph text at a **1-based** index, or `None` if out of range.
    #[must_use]
    pub fn paragraph(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.paragraphs.get(i))
            .map(String::as_str)
    }
}

/// Playback position: which paragraph of which chapter is being narrated.
///
/// Invariant: `1 <= paragraph <= chapter_len + 1`, where `chapter_len + 1`
/// is the rollover sentinel. The narration session is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Chapter number.
    pub chapter: u32,

    /// 1-based paragraph index within the chapter.
    pub paragraph: usize,
}

impl Cursor {
    /// Create a cursor at the given position.
    #[must_use]
    pub const fn new(chapter: u32, paragraph: usize) -> Self {
        Self { chapter, paragraph }
    }

    /// Cursor advanced by one paragraph, clamped to the rollover sentinel
    /// (`chapter_len + 1`).
    #[must_use]
    pub fn advanced(self, chapter_len: usize) -> Self {
        Self {
            chapter: self.chapter,
            paragraph: (self.paragraph + 1).min(chapter_len + 1),
        }
    }

    /// Cursor moved back by one paragraph, clamped to the first.
    #[must_use]
    pub fn rewound(self) -> Self {
        Self {
            chapter: self.chapter,
            paragraph: self.paragraph.saturating_sub(1).max(1),
        }
    }
}
