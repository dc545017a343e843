//! Hash generators used for deduplication.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::File,
    io::copy,
    sync::Arc,
    time::UNIX_EPOCH,
};

use {async_trait::async_trait, blake3::Hasher, tokio::task::spawn_blocking};

use crate::{
    error::domain::ScanError,
    importer::{
        models::FileEntry,
        providers::{HashGenerator, MetadataAccessor},
    },
};

/// BLAKE3 digest of the file bytes, computed on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashGenerator;

#[async_trait]
impl HashGenerator for ContentHashGenerator {
    async fn hash(&self, entry: &FileEntry) -> Result<String, ScanError> {
        let path = entry.path().to_path_buf();
        let worker_path = path.clone();

        spawn_blocking(move || -> Result<String, ScanError> {
            let mut file = File::open(&worker_path).map_err(|e| ScanError::io(&worker_path, e))?;
            let mut hasher = Hasher::new();
            copy(&mut file, &mut hasher).map_err(|e| ScanError::io(&worker_path, e))?;
            Ok(hasher.finalize().to_hex().to_string())
        })
        .await
        .map_err(|e| ScanError::hash(&path, e))?
    }
}

/// Cheap hash of `<size>_<modification millis>`.
///
/// Two files with equal size and timestamp are treated as the same, which
/// holds for camera cards copied with timestamps preserved.
#[derive(Clone)]
pub struct MetadataHashGenerator {
    metadata: Arc<dyn MetadataAccessor>,
}

impl MetadataHashGenerator {
    /// Creates a generator reading metadata through `metadata`.
    pub fn new(metadata: Arc<dyn MetadataAccessor>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl HashGenerator for MetadataHashGenerator {
    async fn hash(&self, entry: &FileEntry) -> Result<String, ScanError> {
        let metadata = self.metadata.get_metadata(entry).await?;
        let modified = metadata
            .modified
            .ok_or_else(|| ScanError::hash(entry.path(), "modification time unavailable"))?
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ScanError::hash(entry.path(), e))?;

        Ok(format!("{}_{}", metadata.size, modified.as_millis()))
    }
}

impl Debug for MetadataHashGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MetadataHashGenerator").finish_non_exhaustive()
    }
}
