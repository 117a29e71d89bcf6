//! Library error types.

/// Errors from chapter-library and progress persistence.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// Filesystem failure.
    #[error("library I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("library data is malformed: {0}")]
    Json(#[from] serde_json::Error),
}
