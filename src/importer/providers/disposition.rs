//! Destination-aware disposition checks.

use std::{
    collections::{HashMap, HashSet},
    fmt::{Debug, Formatter, Result as FmtResult},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    async_trait::async_trait,
    tokio::{fs::try_exists, sync::Mutex},
    tracing::{debug, info},
};

use crate::{
    error::domain::ScanError,
    importer::{
        media_types::MediaTypeFilter,
        models::{Destination, Disposition, Entry, FileEntry},
        providers::{DispositionChecker, EntryEnumerator, HashGenerator},
    },
};

/// Compares files against the hashes of media already at the destination.
///
/// The destination is indexed on the first check against it and the index
/// is reused until [`reset`](DispositionChecker::reset) starts a new
/// generation, which happens at the start of every scan.
pub struct DestinationIndexChecker {
    enumerator: Arc<dyn EntryEnumerator>,
    hash_generator: Arc<dyn HashGenerator>,
    media_types: MediaTypeFilter,
    generation: AtomicU64,
    indexes: Mutex<HashMap<PathBuf, (u64, Arc<HashSet<String>>)>>,
}

impl DestinationIndexChecker {
    /// Creates a checker.
    ///
    /// # Arguments
    ///
    /// * `enumerator` - Used to list the destination.
    /// * `hash_generator` - Must match the generator used by the scan.
    /// * `media_types` - Destination files outside this filter are ignored.
    pub fn new(
        enumerator: Arc<dyn EntryEnumerator>,
        hash_generator: Arc<dyn HashGenerator>,
        media_types: MediaTypeFilter,
    ) -> Self {
        Self {
            enumerator,
            hash_generator,
            media_types,
            generation: AtomicU64::new(0),
            indexes: Mutex::new(HashMap::new()),
        }
    }

    async fn index_for(&self, destination: &Destination) -> Result<Arc<HashSet<String>>, ScanError> {
        // Held across the build so concurrent first checks index only once.
        let mut indexes = self.indexes.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some((built, index)) = indexes.get(destination.root())
            && *built == generation
        {
            return Ok(index.clone());
        }

        let index = Arc::new(self.build_index(destination).await?);
        info!(
            "Indexed {} existing media files at destination {}",
            index.len(),
            destination
        );
        indexes.insert(destination.root().to_path_buf(), (generation, index.clone()));
        Ok(index)
    }

    async fn build_index(&self, destination: &Destination) -> Result<HashSet<String>, ScanError> {
        let root = destination.root();
        let exists = try_exists(root)
            .await
            .map_err(|e| ScanError::io(root, e))?;
        if !exists {
            debug!("Destination {} does not exist yet", destination);
            return Ok(HashSet::new());
        }

        let mut files = Vec::new();
        let media_types = &self.media_types;
        let mut visit = |entry: Entry| {
            if let Entry::File(file) = entry
                && media_types.is_eligible(file.path())
            {
                files.push(file);
            }
        };
        self.enumerator
            .find_entries_recursively(root, &mut visit)
            .await?;

        let mut hashes = HashSet::with_capacity(files.len());
        for file in &files {
            hashes.insert(self.hash_generator.hash(file).await?);
        }
        Ok(hashes)
    }
}

#[async_trait]
impl DispositionChecker for DestinationIndexChecker {
    async fn check_disposition(
        &self,
        entry: &FileEntry,
        destination: &Destination,
    ) -> Result<Disposition, ScanError> {
        let index = self.index_for(destination).await.map_err(|e| ScanError::Disposition {
            path: entry.path().to_path_buf(),
            reason: e.to_string(),
        })?;
        if index.is_empty() {
            return Ok(Disposition::Original);
        }

        let hash = self.hash_generator.hash(entry).await?;
        if index.contains(&hash) {
            Ok(Disposition::ContentDuplicate)
        } else {
            Ok(Disposition::Original)
        }
    }

    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.hash_generator.reset();
    }
}

impl Debug for DestinationIndexChecker {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DestinationIndexChecker")
            .field("media_types", &self.media_types)
            .finish_non_exhaustive()
    }
}
