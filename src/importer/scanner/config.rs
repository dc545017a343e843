//! Configuration for scan behavior.

use crate::{config::settings::ImportSettings, importer::media_types::MediaTypeFilter};

/// Default number of files classified per batch in directory scans.
pub const SCAN_BATCH_SIZE: usize = 1;

/// Configuration for scan behavior.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Files classified concurrently per batch in directory scans.
    pub scan_batch_size: usize,
    /// Log and skip files that fail to classify instead of rejecting the scan.
    pub isolate_file_errors: bool,
    /// Which files are eligible for import.
    pub media_types: MediaTypeFilter,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: SCAN_BATCH_SIZE,
            isolate_file_errors: false,
            media_types: MediaTypeFilter::default(),
        }
    }
}

impl From<&ImportSettings> for ScannerConfig {
    fn from(settings: &ImportSettings) -> Self {
        Self {
            scan_batch_size: settings.scan_batch_size.max(1),
            isolate_file_errors: settings.isolate_file_errors,
            media_types: MediaTypeFilter::from_extensions(&settings.supported_extensions),
        }
    }
}
