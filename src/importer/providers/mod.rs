//! Collaborators the scanner depends on.
//!
//! Each concern sits behind a trait so the scanner can run against the real
//! filesystem or against in-memory doubles.

use std::path::Path;

use async_trait::async_trait;

use crate::{
    error::domain::ScanError,
    importer::models::{Destination, Disposition, Entry, FileEntry, FileMetadata},
};

mod disposition;
mod fs;
mod hash;
mod hash_cache;

pub use {
    disposition::DestinationIndexChecker,
    fs::{FsEnumerator, FsMetadataAccessor},
    hash::{ContentHashGenerator, MetadataHashGenerator},
    hash_cache::CachingHashGenerator,
};

/// Recursive directory enumeration.
#[async_trait]
pub trait EntryEnumerator: Send + Sync {
    /// Calls `visit` once for every file and directory below `root`.
    ///
    /// The root itself is not visited. Order is implementation-defined.
    async fn find_entries_recursively(
        &self,
        root: &Path,
        visit: &mut (dyn FnMut(Entry) + Send),
    ) -> Result<(), ScanError>;
}

/// File metadata lookup.
#[async_trait]
pub trait MetadataAccessor: Send + Sync {
    /// Reads the metadata of `entry`.
    async fn get_metadata(&self, entry: &FileEntry) -> Result<FileMetadata, ScanError>;
}

/// Deterministic file hashing.
#[async_trait]
pub trait HashGenerator: Send + Sync {
    /// Hashes `entry`. Equal content must give equal hashes.
    async fn hash(&self, entry: &FileEntry) -> Result<String, ScanError>;

    /// Drops hashes remembered from earlier scans. Called as a scan starts.
    fn reset(&self) {}
}

/// Destination-aware duplicate detection.
#[async_trait]
pub trait DispositionChecker: Send + Sync {
    /// Decides whether `entry` already exists at `destination`.
    async fn check_disposition(
        &self,
        entry: &FileEntry,
        destination: &Destination,
    ) -> Result<Disposition, ScanError>;

    /// Forgets what is known about destinations, so content imported since
    /// the last scan is seen. Called as a scan starts.
    fn reset(&self) {}
}
