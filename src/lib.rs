//! Mediaimport - media import scanning
//!
//! Finds photos and videos that are candidates for import, in a directory
//! tree or a fixed list of files. Every file is classified as new, as a
//! copy of something already at the import destination, or as a copy of
//! another file in the same scan. Results stay live while the scan runs and
//! are invalidated when a scanned directory changes underneath them.

pub mod cli;
pub mod config;
pub mod error;
pub mod importer;
pub mod logging;

// Re-export key types for convenience
pub use {
    config::{HashStrategy, ImportSettings, SettingsManager},
    error::{ErrorReporter, ScanError},
    importer::{
        DefaultMediaScanner, Destination, Disposition, FileEntry, MediaScanner, ScanDependencies,
        ScanEvent, ScanObserver, ScanResult, ScanStatistics, ScannerConfig,
    },
};
