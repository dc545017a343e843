//! Live results of a single scan.
//!
//! A [`ScanResult`] is shared between the scan task that fills it and any
//! number of readers. It settles exactly once, either resolved or rejected,
//! and ignores every mutation attempted afterwards.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    path::PathBuf,
    time::{Duration, Instant},
};

use {
    parking_lot::Mutex,
    serde::{Serialize, Serializer},
    tokio::sync::watch::{Sender, channel},
    tracing::{debug, warn},
};

use crate::{
    error::domain::ScanError,
    importer::{
        models::{Disposition, FileEntry, FileMetadata},
        watcher::DirectoryWatcher,
    },
};

static NEXT_SCAN_ID: AtomicU64 = AtomicU64::new(1);

/// Settlement state of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finality {
    /// Still collecting entries.
    Pending,
    /// Finished normally, or canceled.
    Resolved,
    /// Failed with the given reason.
    Rejected(String),
}

/// Summary numbers for a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatistics {
    /// Time between scan start and the last classification.
    #[serde(rename = "scanDurationMs", serialize_with = "serialize_millis")]
    pub scan_duration: Duration,
    /// Number of unique entries.
    pub new_file_count: usize,
    /// Duplicate counts keyed by disposition.
    pub duplicates: BTreeMap<Disposition, usize>,
    /// Total size of the unique entries.
    pub size_bytes: u64,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Mutable part of a scan, guarded by one lock.
struct ScanState {
    file_entries: Vec<FileEntry>,
    duplicate_file_entries: Vec<FileEntry>,
    /// First entry seen for every content hash.
    file_hashcodes: HashMap<String, FileEntry>,
    /// Every path already placed in either list.
    recorded_paths: HashSet<PathBuf>,
    total_bytes: u64,
    duplicate_stats: BTreeMap<Disposition, usize>,
    last_activity: Instant,
}

/// Results of a scan operation.
///
/// The object is "live": entries accumulate while the scan runs and the
/// object becomes static once [`when_final`](Self::when_final) completes.
pub struct ScanResult {
    scan_id: u64,
    name: String,
    started: Instant,
    canceled: AtomicBool,
    state: Mutex<ScanState>,
    finality: Sender<Finality>,
    /// Keeps the directory watcher alive for as long as the result is.
    watcher: Mutex<Option<Arc<dyn DirectoryWatcher>>>,
}

impl ScanResult {
    /// Creates a new pending scan result with a fresh id.
    pub(crate) fn new() -> Self {
        let scan_id = NEXT_SCAN_ID.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let (finality, _) = channel(Finality::Pending);

        Self {
            scan_id,
            name: format!("ScanResult({scan_id})"),
            started,
            canceled: AtomicBool::new(false),
            state: Mutex::new(ScanState {
                file_entries: Vec::new(),
                duplicate_file_entries: Vec::new(),
                file_hashcodes: HashMap::new(),
                recorded_paths: HashSet::new(),
                total_bytes: 0,
                duplicate_stats: BTreeMap::new(),
                last_activity: started,
            }),
            finality,
            watcher: Mutex::new(None),
        }
    }

    /// Unique id of this scan.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.scan_id
    }

    /// Display name, `ScanResult(<id>)`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the scan has settled.
    #[must_use]
    pub fn is_final(&self) -> bool {
        *self.finality.borrow() != Finality::Pending
    }

    /// Current settlement state.
    #[must_use]
    pub fn finality(&self) -> Finality {
        self.finality.borrow().clone()
    }

    /// Asks the scan to stop. Work already in flight may still complete,
    /// but no new batch is started.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Whether the scan has been canceled.
    #[must_use]
    pub fn canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Unique entries discovered so far.
    #[must_use]
    pub fn file_entries(&self) -> Vec<FileEntry> {
        self.state.lock().file_entries.clone()
    }

    /// Duplicate entries discovered so far, excluding `Original` ones.
    #[must_use]
    pub fn duplicate_file_entries(&self) -> Vec<FileEntry> {
        self.state.lock().duplicate_file_entries.clone()
    }

    /// Waits until the scan settles.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Rejected` if the scan failed.
    pub async fn when_final(&self) -> Result<(), ScanError> {
        let mut receiver = self.finality.subscribe();
        let finality = receiver
            .wait_for(|finality| *finality != Finality::Pending)
            .await
            .map(|finality| finality.clone())
            .map_err(|e| ScanError::Rejected {
                scan: self.name.clone(),
                reason: e.to_string(),
            })?;

        match finality {
            Finality::Rejected(reason) => Err(ScanError::Rejected {
                scan: self.name.clone(),
                reason,
            }),
            _ => Ok(()),
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn statistics(&self) -> ScanStatistics {
        let state = self.state.lock();
        ScanStatistics {
            scan_duration: state.last_activity.saturating_duration_since(self.started),
            new_file_count: state.file_entries.len(),
            duplicates: state.duplicate_stats.clone(),
            size_bytes: state.total_bytes,
        }
    }

    /// Adds a newly classified original file.
    ///
    /// Returns `true` if the entry was added, `false` if its hash was
    /// already present (it is then recorded as a scan duplicate), its path
    /// was already recorded, or the scan has already settled.
    pub(crate) fn add_file_entry(
        &self,
        mut entry: FileEntry,
        metadata: &FileMetadata,
        hashcode: String,
    ) -> bool {
        let mut state = self.state.lock();
        if self.is_final() {
            debug!("{}: Ignoring {:?}, scan is final", self.name, entry.path());
            return false;
        }
        if !state.recorded_paths.insert(entry.path().to_path_buf()) {
            debug!("{}: {:?} already recorded", self.name, entry.path());
            return false;
        }
        state.last_activity = Instant::now();

        if state.file_hashcodes.contains_key(&hashcode) {
            Self::record_duplicate(&mut state, entry, Disposition::ScanDuplicate);
            return false;
        }

        entry.set_size(metadata.size);
        state.total_bytes += metadata.size;
        state.file_hashcodes.insert(hashcode, entry.clone());
        state.file_entries.push(entry);
        true
    }

    /// Records a duplicate found by the destination check.
    pub(crate) fn add_duplicate_entry(&self, entry: FileEntry, disposition: Disposition) {
        if !disposition.is_duplicate() {
            warn!(
                "{}: Refusing to record {:?} as a duplicate with disposition {}",
                self.name,
                entry.path(),
                disposition
            );
            return;
        }

        let mut state = self.state.lock();
        if self.is_final() {
            debug!("{}: Ignoring {:?}, scan is final", self.name, entry.path());
            return;
        }
        if !state.recorded_paths.insert(entry.path().to_path_buf()) {
            debug!("{}: {:?} already recorded", self.name, entry.path());
            return;
        }
        state.last_activity = Instant::now();
        Self::record_duplicate(&mut state, entry, disposition);
    }

    fn record_duplicate(state: &mut ScanState, entry: FileEntry, disposition: Disposition) {
        state.duplicate_file_entries.push(entry);
        *state.duplicate_stats.entry(disposition).or_insert(0) += 1;
    }

    /// Entry first accepted with `hashcode`, if any.
    #[must_use]
    pub fn original_for_hash(&self, hashcode: &str) -> Option<FileEntry> {
        self.state.lock().file_hashcodes.get(hashcode).cloned()
    }

    /// Settles the scan successfully. Returns `false` if already final.
    pub(crate) fn resolve(&self) -> bool {
        self.settle(Finality::Resolved)
    }

    /// Settles the scan as failed. Returns `false` if already final.
    pub(crate) fn reject(&self, reason: impl Display) -> bool {
        self.settle(Finality::Rejected(reason.to_string()))
    }

    fn settle(&self, outcome: Finality) -> bool {
        // Held so that no mutation can interleave with settlement.
        let _state = self.state.lock();
        self.finality.send_if_modified(|current| {
            if *current == Finality::Pending {
                *current = outcome;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn attach_watcher(&self, watcher: Arc<dyn DirectoryWatcher>) {
        *self.watcher.lock() = Some(watcher);
    }
}

impl Debug for ScanResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScanResult")
            .field("name", &self.name)
            .field("canceled", &self.canceled())
            .field("finality", &self.finality())
            .field("statistics", &self.statistics())
            .finish()
    }
}
