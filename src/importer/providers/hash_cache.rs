//! Hash caching so a file is read at most once per scanner.

use std::{
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::Arc,
};

use {async_trait::async_trait, parking_lot::RwLock, tracing::debug};

use crate::{
    error::domain::ScanError,
    importer::{models::FileEntry, providers::HashGenerator},
};

/// Caches hashes per path in front of another generator.
///
/// The destination check and the intra-scan check both hash the same
/// files; sharing one `CachingHashGenerator` between them halves the reads.
#[derive(Clone)]
pub struct CachingHashGenerator {
    /// Generator used on cache misses.
    inner: Arc<dyn HashGenerator>,
    /// Internal cache storage.
    cache: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl CachingHashGenerator {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn HashGenerator>) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Gets a cached hash.
    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.cache.read().get(path.as_ref()).cloned()
    }

    /// Drops the cached hash for `path`, e.g. after the file changed.
    pub fn invalidate<P: AsRef<Path>>(&self, path: P) {
        self.cache.write().remove(path.as_ref());
    }

    /// Clears the entire cache.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Gets the current cache size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Checks if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

#[async_trait]
impl HashGenerator for CachingHashGenerator {
    async fn hash(&self, entry: &FileEntry) -> Result<String, ScanError> {
        if let Some(hash) = self.get(entry.path()) {
            return Ok(hash);
        }

        let hash = self.inner.hash(entry).await?;
        self.cache
            .write()
            .insert(entry.path().to_path_buf(), hash.clone());
        Ok(hash)
    }

    fn reset(&self) {
        let dropped = self.len();
        self.clear();
        self.inner.reset();
        debug!("Dropped {} cached hashes", dropped);
    }
}

impl Debug for CachingHashGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CachingHashGenerator")
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::importer::{
        models::FileEntry,
        providers::{CachingHashGenerator, HashGenerator},
        testing::MemoryHasher,
    };

    #[tokio::test]
    async fn test_cache_hits_skip_inner_generator() {
        let inner = Arc::new(MemoryHasher::new([("a.jpg", "h1"), ("b.jpg", "h2")]));
        let cache = CachingHashGenerator::new(inner.clone());

        assert_eq!(cache.hash(&FileEntry::new("a.jpg")).await.unwrap(), "h1");
        assert_eq!(cache.hash(&FileEntry::new("a.jpg")).await.unwrap(), "h1");
        assert_eq!(cache.hash(&FileEntry::new("b.jpg")).await.unwrap(), "h2");

        assert_eq!(inner.calls(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b.jpg").as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let inner = Arc::new(MemoryHasher::new([("a.jpg", "h1")]));
        let cache = CachingHashGenerator::new(inner.clone());

        cache.hash(&FileEntry::new("a.jpg")).await.unwrap();
        cache.invalidate("a.jpg");
        assert!(cache.is_empty());

        cache.hash(&FileEntry::new("a.jpg")).await.unwrap();
        assert_eq!(inner.calls(), 2);

        cache.clear();
        assert!(cache.get("a.jpg").is_none());
    }

    #[tokio::test]
    async fn test_reset_forgets_hashes_between_scans() {
        let inner = Arc::new(MemoryHasher::new([("a.jpg", "h1")]));
        let cache = CachingHashGenerator::new(inner.clone());
        let shared: Arc<dyn HashGenerator> = Arc::new(cache.clone());

        shared.hash(&FileEntry::new("a.jpg")).await.unwrap();
        shared.reset();
        assert!(cache.is_empty());

        shared.hash(&FileEntry::new("a.jpg")).await.unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = CachingHashGenerator::new(Arc::new(MemoryHasher::new([("a.jpg", "h1")])));
        assert!(cache.hash(&FileEntry::new("unknown.jpg")).await.is_err());
        assert!(cache.is_empty());
    }
}
