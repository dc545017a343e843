//! In-memory collaborators for scanner tests.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    error::domain::ScanError,
    importer::{
        models::{Destination, Disposition, Entry, FileEntry, FileMetadata},
        providers::{DispositionChecker, EntryEnumerator, HashGenerator, MetadataAccessor},
    },
};

/// Hook run before a disposition is answered.
pub(crate) type CheckHook = Arc<dyn Fn(&FileEntry) + Send + Sync>;

fn table<P, V>(pairs: impl IntoIterator<Item = (P, V)>) -> HashMap<PathBuf, V>
where
    P: Into<PathBuf>,
{
    pairs.into_iter().map(|(path, value)| (path.into(), value)).collect()
}

/// Hashes from a fixed table. Unknown paths fail.
pub(crate) struct MemoryHasher {
    hashes: HashMap<PathBuf, String>,
    calls: AtomicUsize,
}

impl MemoryHasher {
    pub(crate) fn new<P, H>(pairs: impl IntoIterator<Item = (P, H)>) -> Self
    where
        P: Into<PathBuf>,
        H: Into<String>,
    {
        Self {
            hashes: table(pairs.into_iter().map(|(path, hash)| (path, hash.into()))),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HashGenerator for MemoryHasher {
    async fn hash(&self, entry: &FileEntry) -> Result<String, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hashes
            .get(entry.path())
            .cloned()
            .ok_or_else(|| ScanError::hash(entry.path(), "no such file"))
    }
}

/// Enumerates a fixed list of entries, in list order.
pub(crate) struct MemoryEnumerator {
    entries: Vec<Entry>,
}

impl MemoryEnumerator {
    pub(crate) fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Builds a flat listing of files directly under `root`.
    pub(crate) fn files(root: impl AsRef<Path>, names: &[&str]) -> Self {
        let root = root.as_ref();
        Self::new(
            names
                .iter()
                .map(|name| Entry::File(FileEntry::new(root.join(name))))
                .collect(),
        )
    }
}

#[async_trait]
impl EntryEnumerator for MemoryEnumerator {
    async fn find_entries_recursively(
        &self,
        root: &Path,
        visit: &mut (dyn FnMut(Entry) + Send),
    ) -> Result<(), ScanError> {
        for entry in &self.entries {
            let path = match entry {
                Entry::File(file) => file.path(),
                Entry::Directory(directory) => directory.as_path(),
            };
            if path != root && path.starts_with(root) {
                visit(entry.clone());
            }
        }
        Ok(())
    }
}

/// Sizes from a fixed table. Unknown paths fail.
pub(crate) struct MemoryMetadata {
    sizes: HashMap<PathBuf, u64>,
}

impl MemoryMetadata {
    pub(crate) fn new<P: Into<PathBuf>>(pairs: impl IntoIterator<Item = (P, u64)>) -> Self {
        Self { sizes: table(pairs) }
    }
}

#[async_trait]
impl MetadataAccessor for MemoryMetadata {
    async fn get_metadata(&self, entry: &FileEntry) -> Result<FileMetadata, ScanError> {
        let size = self
            .sizes
            .get(entry.path())
            .copied()
            .ok_or_else(|| ScanError::Metadata {
                path: entry.path().to_path_buf(),
                reason: "no such file".to_string(),
            })?;
        Ok(FileMetadata {
            size,
            modified: None,
        })
    }
}

/// Answers dispositions from a table; unlisted files are originals.
#[derive(Default)]
pub(crate) struct MemoryDispositions {
    dispositions: HashMap<PathBuf, Disposition>,
    hook: Option<CheckHook>,
}

impl MemoryDispositions {
    pub(crate) fn new<P: Into<PathBuf>>(pairs: impl IntoIterator<Item = (P, Disposition)>) -> Self {
        Self {
            dispositions: table(pairs),
            hook: None,
        }
    }

    /// Runs `hook` at the start of every check.
    pub(crate) fn with_hook(mut self, hook: CheckHook) -> Self {
        self.hook = Some(hook);
        self
    }
}

#[async_trait]
impl DispositionChecker for MemoryDispositions {
    async fn check_disposition(
        &self,
        entry: &FileEntry,
        _destination: &Destination,
    ) -> Result<Disposition, ScanError> {
        if let Some(hook) = &self.hook {
            hook(entry);
        }
        Ok(self
            .dispositions
            .get(entry.path())
            .copied()
            .unwrap_or(Disposition::Original))
    }
}
