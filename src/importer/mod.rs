//! Media import scanning.
//!
//! This module finds importable media in a directory tree or a fixed list
//! of files, separates originals from duplicates, and keeps each result
//! live until it settles or the scanned directories change.

pub mod media_types;
pub mod models;
pub mod observer;
pub mod providers;
pub mod scan_result;
pub mod scanner;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    media_types::{MediaKind, MediaTypeFilter},
    models::{Destination, Disposition, Entry, FileEntry, FileMetadata},
    observer::{BroadcastObserver, ObserverRegistry, ScanEvent, ScanNotification, ScanObserver},
    providers::{
        CachingHashGenerator, ContentHashGenerator, DestinationIndexChecker, DispositionChecker,
        EntryEnumerator, FsEnumerator, FsMetadataAccessor, HashGenerator, MetadataAccessor,
        MetadataHashGenerator,
    },
    scan_result::{Finality, ScanResult, ScanStatistics},
    scanner::{DefaultMediaScanner, MediaScanner, ScanDependencies, ScannerConfig},
    watcher::{
        ChangeNotifier, DefaultDirectoryWatcher, DefaultDirectoryWatcherFactory, DirectoryChange,
        DirectoryWatcher, DirectoryWatcherFactory, InertChangeNotifier, NotifyChangeNotifier,
    },
};
