//! Domain-specific error types using `thiserror`.
//!
//! This module defines the error enum shared by every stage of a media
//! scan: enumeration, metadata, hashing, disposition checks and watching.

use std::{
    fmt::Display,
    io::Error as IoError,
    path::{Path, PathBuf},
};

use {thiserror::Error, tokio::task::JoinError};

/// Scan-related errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A fixed-entry scan was requested with no entries.
    #[error("Cannot scan empty list")]
    EmptyFileList,
    /// Filesystem access failed.
    #[error("IO error at {path:?}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: IoError,
    },
    /// Metadata could not be read or is unusable.
    #[error("Failed to read metadata for {path:?}: {reason}")]
    Metadata { path: PathBuf, reason: String },
    /// Hash generation failed.
    #[error("Failed to hash {path:?}: {reason}")]
    Hash { path: PathBuf, reason: String },
    /// The destination disposition check failed.
    #[error("Failed to determine disposition of {path:?}: {reason}")]
    Disposition { path: PathBuf, reason: String },
    /// Directory watch registration failed.
    #[error("Directory watch error: {reason}")]
    Watch { reason: String },
    /// Recursive enumeration failed.
    #[error("Failed to enumerate {path:?}: {reason}")]
    Enumeration { path: PathBuf, reason: String },
    /// The scan settled in the rejected state.
    #[error("{scan} was rejected: {reason}")]
    Rejected { scan: String, reason: String },
    /// A per-file classification task panicked or was aborted.
    #[error("Scan task failed: {0}")]
    Join(#[from] JoinError),
}

impl ScanError {
    /// Creates a new `Io` error for `path`.
    pub fn io(path: impl AsRef<Path>, source: IoError) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a new `Hash` error.
    pub fn hash(path: impl AsRef<Path>, reason: impl Display) -> Self {
        Self::Hash {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new `Watch` error.
    pub fn watch(reason: impl Display) -> Self {
        Self::Watch {
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a caller mistake rather than a scan failure.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::EmptyFileList)
    }
}
