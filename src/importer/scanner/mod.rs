//! Media scanner coordinator.
//!
//! This module crawls directories for importable media, classifies every
//! file against the import destination and within the scan itself, and
//! reports progress to registered observers.

use std::{
    collections::{BTreeSet, HashSet},
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    tokio::{spawn, task::JoinSet},
    tracing::{debug, error, info, warn},
};

use crate::{
    config::settings::{HashStrategy, ImportSettings},
    error::domain::ScanError,
    importer::{
        models::{Destination, Entry, FileEntry},
        observer::{ObserverRegistry, ScanEvent, ScanObserver},
        providers::{
            CachingHashGenerator, ContentHashGenerator, DestinationIndexChecker, DispositionChecker,
            EntryEnumerator, FsEnumerator, FsMetadataAccessor, HashGenerator, MetadataAccessor,
            MetadataHashGenerator,
        },
        scan_result::ScanResult,
        watcher::{ChangeNotifier, DefaultDirectoryWatcherFactory, DirectoryWatcher, DirectoryWatcherFactory},
    },
};

mod config;
mod handlers;

pub use config::{SCAN_BATCH_SIZE, ScannerConfig};

/// Scans for importable media.
pub trait MediaScanner: Send + Sync {
    /// Starts a recursive scan of `directory`.
    ///
    /// The returned result is live; await [`ScanResult::when_final`] or
    /// observe [`ScanEvent::Finalized`] to learn when it is complete.
    fn scan_directory(&self, directory: &Path) -> Arc<ScanResult>;

    /// Starts a scan of a fixed set of files.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::EmptyFileList` immediately if `entries` is empty.
    fn scan_files(&self, entries: Vec<FileEntry>) -> Result<Arc<ScanResult>, ScanError>;

    /// Adds an observer, which will be notified on scan events.
    fn add_observer(&self, observer: Arc<dyn ScanObserver>);

    /// Removes a previously registered observer.
    fn remove_observer(&self, observer: &Arc<dyn ScanObserver>);
}

/// Collaborators injected into [`DefaultMediaScanner`].
#[derive(Clone)]
pub struct ScanDependencies {
    /// Recursive directory enumeration.
    pub enumerator: Arc<dyn EntryEnumerator>,
    /// Metadata lookup.
    pub metadata: Arc<dyn MetadataAccessor>,
    /// Hash used for intra-scan deduplication.
    pub hash_generator: Arc<dyn HashGenerator>,
    /// Destination duplicate check.
    pub disposition_checker: Arc<dyn DispositionChecker>,
    /// Creates one directory watcher per directory scan.
    pub watcher_factory: Arc<dyn DirectoryWatcherFactory>,
}

impl ScanDependencies {
    /// Builds filesystem-backed collaborators from user settings.
    ///
    /// Both deduplication layers share one hash cache, so each file is
    /// hashed at most once.
    pub fn from_settings(settings: &ImportSettings, notifier: Arc<dyn ChangeNotifier>) -> Self {
        let enumerator: Arc<dyn EntryEnumerator> = Arc::new(FsEnumerator::new(settings.include_hidden));
        let metadata: Arc<dyn MetadataAccessor> = Arc::new(FsMetadataAccessor);
        let base_hasher: Arc<dyn HashGenerator> = match settings.hash_strategy {
            HashStrategy::Content => Arc::new(ContentHashGenerator),
            HashStrategy::Metadata => Arc::new(MetadataHashGenerator::new(metadata.clone())),
        };
        let hash_generator: Arc<dyn HashGenerator> = Arc::new(CachingHashGenerator::new(base_hasher));
        let disposition_checker = Arc::new(DestinationIndexChecker::new(
            enumerator.clone(),
            hash_generator.clone(),
            ScannerConfig::from(settings).media_types,
        ));

        Self {
            enumerator,
            metadata,
            hash_generator,
            disposition_checker,
            watcher_factory: Arc::new(DefaultDirectoryWatcherFactory::new(notifier)),
        }
    }
}

impl Debug for ScanDependencies {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScanDependencies").finish_non_exhaustive()
    }
}

/// State shared between the scanner handle and its scan tasks.
pub(crate) struct ScannerCore {
    enumerator: Arc<dyn EntryEnumerator>,
    metadata: Arc<dyn MetadataAccessor>,
    hash_generator: Arc<dyn HashGenerator>,
    disposition_checker: Arc<dyn DispositionChecker>,
    watcher_factory: Arc<dyn DirectoryWatcherFactory>,
    destination: Destination,
    config: ScannerConfig,
    observers: ObserverRegistry,
}

/// Recursively scans directories, or fixed file lists, for media files.
#[derive(Clone)]
pub struct DefaultMediaScanner {
    core: Arc<ScannerCore>,
}

impl DefaultMediaScanner {
    /// Creates a new media scanner.
    ///
    /// # Arguments
    ///
    /// * `dependencies` - Filesystem, hashing and watching collaborators.
    /// * `destination` - Import target used for disposition checks.
    /// * `config` - Optional scanner configuration.
    pub fn new(
        dependencies: ScanDependencies,
        destination: Destination,
        config: Option<ScannerConfig>,
    ) -> Self {
        let ScanDependencies {
            enumerator,
            metadata,
            hash_generator,
            disposition_checker,
            watcher_factory,
        } = dependencies;

        Self {
            core: Arc::new(ScannerCore {
                enumerator,
                metadata,
                hash_generator,
                disposition_checker,
                watcher_factory,
                destination,
                config: config.unwrap_or_default(),
                observers: ObserverRegistry::new(),
            }),
        }
    }

    /// Gets the current scanner configuration.
    pub fn config(&self) -> &ScannerConfig {
        &self.core.config
    }

    /// Gets the import destination.
    pub fn destination(&self) -> &Destination {
        &self.core.destination
    }
}

impl MediaScanner for DefaultMediaScanner {
    fn scan_directory(&self, directory: &Path) -> Arc<ScanResult> {
        let scan = Arc::new(ScanResult::new());
        info!("{}: Scanning directory {:?}", scan.name(), directory);
        self.core.reset_caches();

        let watcher = self.core.create_watcher(&scan);
        scan.attach_watcher(watcher.clone());

        let core = self.core.clone();
        let task_scan = scan.clone();
        let root = directory.to_path_buf();
        spawn(async move {
            let outcome = match core.crawl_directory(&root, watcher.as_ref()).await {
                Ok(files) => core.scan_media_files(&task_scan, files).await,
                Err(e) => Err(e),
            };
            core.settle(&task_scan, outcome);
        });

        scan
    }

    fn scan_files(&self, entries: Vec<FileEntry>) -> Result<Arc<ScanResult>, ScanError> {
        if entries.is_empty() {
            return Err(ScanError::EmptyFileList);
        }

        let scan = Arc::new(ScanResult::new());
        info!(
            "{}: Scanning fixed set of {} entries.",
            scan.name(),
            entries.len()
        );
        self.core.reset_caches();

        let requested = entries.len();
        let mut seen = HashSet::with_capacity(requested);
        let entries: Vec<FileEntry> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.path().to_path_buf()))
            .collect();
        if entries.len() < requested {
            debug!(
                "{}: Ignoring {} repeated paths",
                scan.name(),
                requested - entries.len()
            );
        }

        let watcher = self.core.create_watcher(&scan);
        for directory in Self::parent_directories(&entries) {
            watcher.add_directory(&directory);
        }
        scan.attach_watcher(watcher);

        let core = self.core.clone();
        let task_scan = scan.clone();
        spawn(async move {
            let mut tasks = JoinSet::new();
            for entry in entries {
                let core = core.clone();
                let scan = task_scan.clone();
                tasks.spawn(async move { core.on_file_entry_found(&scan, entry).await });
            }
            let outcome = core.join_classifications(tasks).await;
            core.settle(&task_scan, outcome);
        });

        Ok(scan)
    }

    fn add_observer(&self, observer: Arc<dyn ScanObserver>) {
        self.core.observers.add(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn ScanObserver>) {
        if !self.core.observers.remove(observer) {
            warn!("Ignoring request to remove observer that is not registered.");
        }
    }
}

impl DefaultMediaScanner {
    /// Distinct directories holding `entries`, in path order.
    fn parent_directories(entries: &[FileEntry]) -> BTreeSet<PathBuf> {
        entries
            .iter()
            .filter_map(|entry| entry.path().parent())
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect()
    }
}

impl ScannerCore {
    /// Drops collaborator caches so this scan sees the current filesystem.
    fn reset_caches(&self) {
        self.hash_generator.reset();
        self.disposition_checker.reset();
    }

    /// Creates a watcher whose trigger cancels `scan` and reports it invalid.
    fn create_watcher(self: &Arc<Self>, scan: &Arc<ScanResult>) -> Arc<dyn DirectoryWatcher> {
        let scan = Arc::downgrade(scan);
        let core = Arc::downgrade(self);
        self.watcher_factory.create(Box::new(move || {
            if let (Some(scan), Some(core)) = (scan.upgrade(), core.upgrade()) {
                info!("{}: Invalidated by a directory change", scan.name());
                scan.cancel();
                core.observers.notify(ScanEvent::Invalidated, &scan);
            }
        }))
    }

    /// Finds all media files beneath `root` and watches every directory seen.
    async fn crawl_directory(
        &self,
        root: &Path,
        watcher: &dyn DirectoryWatcher,
    ) -> Result<Vec<FileEntry>, ScanError> {
        watcher.add_directory(root);

        let mut media_files = Vec::new();
        let media_types = &self.config.media_types;
        let mut visit = |entry: Entry| {
            if watcher.triggered() {
                return;
            }
            match entry {
                // Enumeration already recurses; directories only need watching.
                Entry::Directory(directory) => watcher.add_directory(&directory),
                Entry::File(file) => {
                    if media_types.is_eligible(file.path()) {
                        media_files.push(file);
                    }
                }
            }
        };
        self.enumerator
            .find_entries_recursively(root, &mut visit)
            .await
            .map_err(|e| match e {
                ScanError::Io { path, source } => ScanError::Enumeration {
                    path,
                    reason: source.to_string(),
                },
                other => other,
            })?;

        debug!("Found {} media files under {:?}", media_files.len(), root);
        Ok(media_files)
    }

    /// Classifies `entries` in sequential batches, stopping early on cancel.
    async fn scan_media_files(
        self: &Arc<Self>,
        scan: &Arc<ScanResult>,
        entries: Vec<FileEntry>,
    ) -> Result<(), ScanError> {
        let batch_size = self.config.scan_batch_size.max(1);
        let total = entries.len();

        for (index, batch) in entries.chunks(batch_size).enumerate() {
            let begin = index * batch_size;
            if scan.canceled() {
                debug!(
                    "{}: Skipping remaining {} entries. Scan was canceled.",
                    scan.name(),
                    total - begin
                );
                return Ok(());
            }

            debug!(
                "{}: Processing batch {}-{}",
                scan.name(),
                begin,
                begin + batch.len() - 1
            );
            let mut tasks = JoinSet::new();
            for entry in batch.iter().cloned() {
                let core = self.clone();
                let scan = scan.clone();
                tasks.spawn(async move { core.on_file_entry_found(&scan, entry).await });
            }
            self.join_classifications(tasks).await?;
        }

        Ok(())
    }

    /// Waits for every classification task.
    ///
    /// The first failure is returned unless file errors are isolated, in
    /// which case failures are logged and skipped.
    async fn join_classifications(
        &self,
        mut tasks: JoinSet<Result<(), ScanError>>,
    ) -> Result<(), ScanError> {
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(()) => {}
                Err(e) if self.config.isolate_file_errors => {
                    warn!("Skipping file that failed to classify: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Resolves or rejects `scan` and emits `Finalized`.
    fn settle(&self, scan: &ScanResult, outcome: Result<(), ScanError>) {
        let settled = match outcome {
            Ok(()) => scan.resolve(),
            Err(e) => {
                error!("{}: Scan failed: {}", scan.name(), e);
                scan.reject(e)
            }
        };

        if settled {
            info!("{}: Finished.", scan.name());
            self.observers.notify(ScanEvent::Finalized, scan);
        }
    }
}

impl Debug for DefaultMediaScanner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DefaultMediaScanner")
            .field("destination", &self.core.destination)
            .field("config", &self.core.config)
            .field("observers", &self.core.observers)
            .finish()
    }
}
