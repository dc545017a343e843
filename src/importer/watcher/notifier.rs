//! Directory change notification backends.

use std::{
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    async_channel::{Receiver, Sender, unbounded},
    notify::{Config, Error, Event, RecommendedWatcher, RecursiveMode::NonRecursive, Watcher},
    parking_lot::{Mutex, RwLock},
    tokio::{spawn, task::JoinHandle},
    tracing::{debug, error},
};

use crate::{error::domain::ScanError, importer::watcher::events::{DirectoryChange, changes_from_event}};

/// Callback receiving directory changes.
pub type ChangeListener = Arc<dyn Fn(&DirectoryChange) + Send + Sync>;

/// Handle for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Source of directory change notifications.
///
/// Listeners must be invoked outside any lock the notifier holds, so a
/// listener may call back into the notifier.
pub trait ChangeNotifier: Send + Sync {
    /// Registers a listener for changes under any watched directory.
    fn add_listener(&self, listener: ChangeListener) -> ListenerId;

    /// Unregisters a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);

    /// Starts watching `directory` (not recursively).
    fn add_watch(&self, directory: &Path) -> Result<(), ScanError>;

    /// Stops watching `directory`.
    fn remove_watch(&self, directory: &Path) -> Result<(), ScanError>;
}

/// Listener bookkeeping shared by the notifier implementations.
#[derive(Default)]
struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<ListenerId, ChangeListener>>,
}

impl ListenerSet {
    fn add(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().insert(id, listener);
        id
    }

    fn remove(&self, id: ListenerId) {
        self.listeners.write().remove(&id);
    }

    fn dispatch(&self, change: &DirectoryChange) {
        let snapshot: Vec<ChangeListener> = self.listeners.read().values().cloned().collect();
        for listener in snapshot {
            listener(change);
        }
    }

    fn len(&self) -> usize {
        self.listeners.read().len()
    }
}

/// Per-directory watch counts.
///
/// Several scans may watch the same directory through one notifier; the
/// backend watch is added for the first and removed after the last.
#[derive(Debug, Default)]
struct WatchCounts {
    counts: HashMap<PathBuf, usize>,
}

impl WatchCounts {
    /// Counts a new watch on `directory`. Returns `true` for the first one.
    fn acquire(&mut self, directory: &Path) -> bool {
        let count = self.counts.entry(directory.to_path_buf()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drops one watch on `directory`. Returns `true` when none remain.
    fn release(&mut self, directory: &Path) -> bool {
        match self.counts.get_mut(directory) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(directory);
                true
            }
            None => false,
        }
    }

    fn directories(&self) -> Vec<PathBuf> {
        let mut directories: Vec<PathBuf> = self.counts.keys().cloned().collect();
        directories.sort();
        directories
    }
}

/// Backend watcher and its watch counts, locked together.
struct WatchTable {
    watcher: RecommendedWatcher,
    counts: WatchCounts,
}

/// Change notifier backed by the `notify` crate.
///
/// Raw events arrive on the backend's thread and are forwarded over a
/// channel to a Tokio task that runs the listeners. Listeners therefore may
/// add or remove watches without re-entering the backend thread.
///
/// Watches are counted per directory, so one scan releasing a directory
/// does not blind another scan of the same directory.
pub struct NotifyChangeNotifier {
    /// Internal notify watcher with per-directory counts.
    watches: Mutex<WatchTable>,
    /// Registered listeners.
    listeners: Arc<ListenerSet>,
    /// Task running listeners for forwarded events.
    _dispatcher: JoinHandle<()>,
}

impl NotifyChangeNotifier {
    /// Creates a notifier. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Watch` if the platform watcher cannot be created.
    pub fn new() -> Result<Self, ScanError> {
        let (sender, receiver) = unbounded();

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, Error>| {
                Self::handle_raw_event(res, &sender);
            },
            Config::default(),
        )
        .map_err(|e| ScanError::watch(format!("Failed to create file watcher: {e}")))?;

        let listeners = Arc::new(ListenerSet::default());
        let dispatcher = spawn(Self::dispatch(receiver, listeners.clone()));

        Ok(Self {
            watches: Mutex::new(WatchTable {
                watcher,
                counts: WatchCounts::default(),
            }),
            listeners,
            _dispatcher: dispatcher,
        })
    }

    /// Handles raw events from the notify crate.
    fn handle_raw_event(res: Result<Event, Error>, sender: &Sender<DirectoryChange>) {
        match res {
            Ok(event) => {
                for change in changes_from_event(&event) {
                    debug!("Directory change: {:?}", change.path);
                    let _ = sender.try_send(change);
                }
            }
            Err(e) => {
                error!("File system watcher error: {}", e);
            }
        }
    }

    async fn dispatch(receiver: Receiver<DirectoryChange>, listeners: Arc<ListenerSet>) {
        // Ends once the watcher, and with it the sender, is dropped.
        while let Ok(change) = receiver.recv().await {
            listeners.dispatch(&change);
        }
    }
}

impl ChangeNotifier for NotifyChangeNotifier {
    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn add_watch(&self, directory: &Path) -> Result<(), ScanError> {
        let mut watches = self.watches.lock();
        if !watches.counts.acquire(directory) {
            return Ok(());
        }

        if let Err(e) = watches.watcher.watch(directory, NonRecursive) {
            watches.counts.release(directory);
            return Err(ScanError::watch(format!(
                "Failed to watch directory {directory:?}: {e}"
            )));
        }
        debug!("Started watching directory: {:?}", directory);
        Ok(())
    }

    fn remove_watch(&self, directory: &Path) -> Result<(), ScanError> {
        let mut watches = self.watches.lock();
        if !watches.counts.release(directory) {
            return Ok(());
        }

        watches
            .watcher
            .unwatch(directory)
            .map_err(|e| ScanError::watch(format!("Failed to unwatch directory {directory:?}: {e}")))?;
        debug!("Stopped watching directory: {:?}", directory);
        Ok(())
    }
}

impl Debug for NotifyChangeNotifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("NotifyChangeNotifier")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Notifier that never reports changes.
///
/// Used when scans should not be invalidated by concurrent edits.
#[derive(Default)]
pub struct InertChangeNotifier {
    listeners: ListenerSet,
}

impl InertChangeNotifier {
    /// Creates an inert notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeNotifier for InertChangeNotifier {
    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn add_watch(&self, _directory: &Path) -> Result<(), ScanError> {
        Ok(())
    }

    fn remove_watch(&self, _directory: &Path) -> Result<(), ScanError> {
        Ok(())
    }
}

impl Debug for InertChangeNotifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InertChangeNotifier").finish_non_exhaustive()
    }
}

/// Notifier driven by hand, for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ManualChangeNotifier {
    listeners: ListenerSet,
    watched: Mutex<WatchCounts>,
}

#[cfg(test)]
impl ManualChangeNotifier {
    /// Delivers `path` as a change to every listener.
    pub(crate) fn fire(&self, path: impl Into<PathBuf>) {
        self.listeners.dispatch(&DirectoryChange::new(path));
    }

    /// Directories with at least one watch, in path order.
    pub(crate) fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().directories()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
impl ChangeNotifier for ManualChangeNotifier {
    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn add_watch(&self, directory: &Path) -> Result<(), ScanError> {
        self.watched.lock().acquire(directory);
        Ok(())
    }

    fn remove_watch(&self, directory: &Path) -> Result<(), ScanError> {
        self.watched.lock().release(directory);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::write, sync::Arc, time::Duration};

    use {
        tempfile::TempDir,
        tokio::{sync::mpsc::unbounded_channel, time::timeout},
    };

    use crate::importer::watcher::{
        events::DirectoryChange,
        notifier::{
            ChangeNotifier, InertChangeNotifier, ManualChangeNotifier, NotifyChangeNotifier,
            WatchCounts,
        },
    };

    #[test]
    fn test_watch_counts_release_after_last_holder() {
        let mut counts = WatchCounts::default();
        let directory = std::path::Path::new("/card/DCIM");

        assert!(counts.acquire(directory));
        assert!(!counts.acquire(directory));
        assert!(!counts.release(directory));
        assert_eq!(counts.directories().len(), 1);
        assert!(counts.release(directory));
        assert!(counts.directories().is_empty());
        assert!(!counts.release(directory));
    }

    #[test]
    fn test_manual_notifier_dispatch_and_removal() {
        let notifier = ManualChangeNotifier::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = notifier.add_listener(Arc::new(move |change: &DirectoryChange| {
            sink.lock().push(change.path.clone());
        }));

        notifier.fire("/card/DCIM/a.jpg");
        notifier.remove_listener(id);
        notifier.fire("/card/DCIM/b.jpg");

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_inert_notifier_accepts_watches() {
        let notifier = InertChangeNotifier::new();
        assert!(notifier.add_watch(std::path::Path::new("/nowhere")).is_ok());
        assert!(notifier.remove_watch(std::path::Path::new("/nowhere")).is_ok());
    }

    #[tokio::test]
    async fn test_notify_backend_reports_file_creation() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = NotifyChangeNotifier::new().unwrap();
        let (sender, mut receiver) = unbounded_channel();

        notifier.add_listener(Arc::new(move |change: &DirectoryChange| {
            let _ = sender.send(change.clone());
        }));
        notifier.add_watch(temp_dir.path()).unwrap();

        write(temp_dir.path().join("new.jpg"), b"pixels").unwrap();

        let change = timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("no change reported")
            .unwrap();
        assert!(change.affects(temp_dir.path()));
    }
}
