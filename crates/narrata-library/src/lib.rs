//! Filesystem-backed chapter library and reading-progress persistence.
//!
//! A novel lives in a directory:
//!
//! ```text
//! my-novel/
//!   metadata.json          { "title": "...", "author": "..." }
//!   chapters/
//!     ch_0001.json         { "number": 1, "title": "...", "paragraphs": [...] }
//!     ch_0002.json
//! ```
//!
//! [`FsChapterStore`] implements the `ChapterStore` port over that layout;
//! [`Progress`] remembers where the listener stopped.

pub mod error;
pub mod progress;
pub mod store;

pub use error::LibraryError;
pub use progress::Progress;
pub use store::{FsChapterStore, NovelMetadata};
