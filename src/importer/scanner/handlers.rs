//! Per-file classification handlers for the media scanner.

use tracing::debug;

use crate::{
    error::domain::ScanError,
    importer::{
        models::{Disposition, FileEntry},
        observer::ScanEvent,
        scan_result::ScanResult,
        scanner::ScannerCore,
    },
};

impl ScannerCore {
    /// Classifies one file and records it in `scan`.
    ///
    /// Originals go through the intra-scan hash check; anything the
    /// destination already holds is recorded as a duplicate directly.
    ///
    /// # Errors
    ///
    /// Returns `ScanError` if the disposition, metadata or hash lookup fails.
    pub(super) async fn on_file_entry_found(
        &self,
        scan: &ScanResult,
        entry: FileEntry,
    ) -> Result<(), ScanError> {
        if !self.config.media_types.is_eligible(entry.path()) {
            debug!("{}: Skipping ineligible file {:?}", scan.name(), entry.path());
            return Ok(());
        }

        let disposition = self
            .disposition_checker
            .check_disposition(&entry, &self.destination)
            .await?;

        match disposition {
            Disposition::Original => self.on_unique_file_found(scan, entry).await,
            duplicate => {
                self.on_duplicate_file_found(scan, entry, duplicate);
                Ok(())
            }
        }
    }

    /// Adds a file the destination does not know to the scan.
    async fn on_unique_file_found(&self, scan: &ScanResult, entry: FileEntry) -> Result<(), ScanError> {
        let metadata = self.metadata.get_metadata(&entry).await?;
        let hashcode = self.hash_generator.hash(&entry).await?;

        if scan.add_file_entry(entry, &metadata, hashcode) {
            if scan.canceled() {
                debug!("{}: Not announcing entry added after cancel", scan.name());
            } else {
                self.observers.notify(ScanEvent::Updated, scan);
            }
        }
        Ok(())
    }

    /// Records a duplicate reported by the destination check.
    fn on_duplicate_file_found(&self, scan: &ScanResult, entry: FileEntry, disposition: Disposition) {
        debug!(
            "{}: {:?} is a duplicate ({})",
            scan.name(),
            entry.path(),
            disposition
        );
        scan.add_duplicate_entry(entry, disposition);
    }
}
