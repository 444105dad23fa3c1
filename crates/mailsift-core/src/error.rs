//! Error types for the core library.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::views::ViewError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the archive failed.
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// A view configuration could not be resolved.
    #[error("View error: {0}")]
    View(#[from] ViewError),

    /// The index store was used before an archive namespace was bound.
    #[error("No archive cache opened yet")]
    StoreUnavailable,

    /// `extract` was requested while no archive is open.
    #[error("No archive opened yet")]
    NoArchiveOpen,

    /// The extraction was cancelled before it completed.
    #[error("Extraction cancelled")]
    Cancelled,

    /// The blocking traversal task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Writing extraction results to the index store failed.
    #[error("Persisting extraction results failed: {0}")]
    Persistence(Box<Error>),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the worker must terminate after this error.
    ///
    /// A half-written index cache cannot be trusted on the next read, so
    /// persistence failures end the worker process.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
