//! Invalidation of scans whose directories change.
//!
//! A directory watcher collects the directories visited during a crawl and
//! fires its invalidation callback, once, as soon as any of them changes.

use std::{
    collections::HashSet,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    parking_lot::Mutex,
    tracing::{debug, warn},
};

mod events;
mod notifier;

#[cfg(test)]
pub(crate) use notifier::ManualChangeNotifier;
pub use {
    events::DirectoryChange,
    notifier::{ChangeListener, ChangeNotifier, InertChangeNotifier, ListenerId, NotifyChangeNotifier},
};

/// Callback run when a watched directory changes.
pub type InvalidationCallback = Box<dyn FnOnce() + Send>;

/// Watcher for directories visited by a scan.
pub trait DirectoryWatcher: Send + Sync {
    /// Registers a directory to be watched. Ignored once triggered.
    fn add_directory(&self, directory: &Path);

    /// Whether a watched directory has changed.
    fn triggered(&self) -> bool;
}

/// Creates a watcher for each new scan.
pub trait DirectoryWatcherFactory: Send + Sync {
    /// Creates a watcher that runs `on_invalidated` when triggered.
    fn create(&self, on_invalidated: InvalidationCallback) -> Arc<dyn DirectoryWatcher>;
}

impl<F> DirectoryWatcherFactory for F
where
    F: Fn(InvalidationCallback) -> Arc<dyn DirectoryWatcher> + Send + Sync,
{
    fn create(&self, on_invalidated: InvalidationCallback) -> Arc<dyn DirectoryWatcher> {
        self(on_invalidated)
    }
}

/// Lifecycle of a [`DefaultDirectoryWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// Nothing registered, no listener attached.
    Idle,
    /// At least one directory registered, listener attached.
    Watching,
    /// A change was seen; watches removed. Terminal.
    Triggered,
}

struct WatcherState {
    phase: WatchPhase,
    watched: HashSet<PathBuf>,
    listener: Option<ListenerId>,
}

/// Directory watcher built on a [`ChangeNotifier`].
pub struct DefaultDirectoryWatcher {
    notifier: Arc<dyn ChangeNotifier>,
    state: Mutex<WatcherState>,
    triggered: AtomicBool,
    callback: Mutex<Option<InvalidationCallback>>,
    this: Weak<Self>,
}

impl DefaultDirectoryWatcher {
    /// Creates an idle watcher.
    ///
    /// # Arguments
    ///
    /// * `notifier` - Source of change notifications.
    /// * `on_invalidated` - Run once, on the first change to a watched directory.
    pub fn create(notifier: Arc<dyn ChangeNotifier>, on_invalidated: InvalidationCallback) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            notifier,
            state: Mutex::new(WatcherState {
                phase: WatchPhase::Idle,
                watched: HashSet::new(),
                listener: None,
            }),
            triggered: AtomicBool::new(false),
            callback: Mutex::new(Some(on_invalidated)),
            this: this.clone(),
        })
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> WatchPhase {
        self.state.lock().phase
    }

    /// Directories currently watched.
    #[must_use]
    pub fn watched_directories(&self) -> Vec<PathBuf> {
        self.state.lock().watched.iter().cloned().collect()
    }

    fn on_watched_directory_modified(&self, change: &DirectoryChange) {
        let (watched, listener) = {
            let mut state = self.state.lock();
            if state.phase != WatchPhase::Watching
                || !state.watched.iter().any(|directory| change.affects(directory))
            {
                return;
            }
            debug!("Watched directory changed: {:?}", change.path);
            state.phase = WatchPhase::Triggered;
            self.triggered.store(true, Ordering::SeqCst);
            (std::mem::take(&mut state.watched), state.listener.take())
        };

        self.tear_down(watched, listener);

        if let Some(callback) = self.callback.lock().take() {
            callback();
        }
    }

    fn tear_down(&self, watched: HashSet<PathBuf>, listener: Option<ListenerId>) {
        for directory in watched {
            if let Err(e) = self.notifier.remove_watch(&directory) {
                warn!("Failed to remove watch on {:?}: {}", directory, e);
            }
        }
        if let Some(id) = listener {
            self.notifier.remove_listener(id);
        }
    }
}

impl DirectoryWatcher for DefaultDirectoryWatcher {
    fn add_directory(&self, directory: &Path) {
        let mut state = self.state.lock();
        if state.phase == WatchPhase::Triggered {
            return;
        }

        if state.listener.is_none() {
            let this = self.this.clone();
            let listener: ChangeListener = Arc::new(move |change: &DirectoryChange| {
                if let Some(watcher) = this.upgrade() {
                    watcher.on_watched_directory_modified(change);
                }
            });
            state.listener = Some(self.notifier.add_listener(listener));
            state.phase = WatchPhase::Watching;
        }

        if state.watched.insert(directory.to_path_buf())
            && let Err(e) = self.notifier.add_watch(directory)
        {
            warn!("Failed to watch directory {:?}: {}", directory, e);
        }
    }

    fn triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Drop for DefaultDirectoryWatcher {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.phase == WatchPhase::Watching {
            let watched = std::mem::take(&mut state.watched);
            let listener = state.listener.take();
            self.tear_down(watched, listener);
        }
    }
}

impl Debug for DefaultDirectoryWatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.state.lock();
        f.debug_struct("DefaultDirectoryWatcher")
            .field("phase", &state.phase)
            .field("watched", &state.watched.len())
            .finish_non_exhaustive()
    }
}

/// Factory producing [`DefaultDirectoryWatcher`]s that share one notifier.
#[derive(Clone)]
pub struct DefaultDirectoryWatcherFactory {
    notifier: Arc<dyn ChangeNotifier>,
}

impl DefaultDirectoryWatcherFactory {
    /// Creates a factory over `notifier`.
    pub fn new(notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { notifier }
    }
}

impl DirectoryWatcherFactory for DefaultDirectoryWatcherFactory {
    fn create(&self, on_invalidated: InvalidationCallback) -> Arc<dyn DirectoryWatcher> {
        DefaultDirectoryWatcher::create(self.notifier.clone(), on_invalidated)
    }
}

impl Debug for DefaultDirectoryWatcherFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DefaultDirectoryWatcherFactory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::write,
        path::Path,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use {
        tempfile::TempDir,
        tokio::{sync::mpsc::unbounded_channel, time::timeout},
    };

    use crate::importer::watcher::{
        ChangeNotifier, DefaultDirectoryWatcher, DirectoryWatcher, ManualChangeNotifier,
        NotifyChangeNotifier, WatchPhase,
    };

    fn counting_watcher(
        notifier: &Arc<ManualChangeNotifier>,
    ) -> (Arc<DefaultDirectoryWatcher>, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let watcher = DefaultDirectoryWatcher::create(
            notifier.clone(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (watcher, fired)
    }

    #[test]
    fn test_listener_attached_lazily() {
        let notifier = Arc::new(ManualChangeNotifier::default());
        let (watcher, _) = counting_watcher(&notifier);

        assert_eq!(watcher.phase(), WatchPhase::Idle);
        assert_eq!(notifier.listener_count(), 0);

        watcher.add_directory(Path::new("/card/DCIM"));
        watcher.add_directory(Path::new("/card/DCIM/100CANON"));
        watcher.add_directory(Path::new("/card/DCIM"));

        assert_eq!(watcher.phase(), WatchPhase::Watching);
        assert_eq!(notifier.listener_count(), 1);
        assert_eq!(notifier.watched().len(), 2);
    }

    #[test]
    fn test_first_change_triggers_once_and_tears_down() {
        let notifier = Arc::new(ManualChangeNotifier::default());
        let (watcher, fired) = counting_watcher(&notifier);
        watcher.add_directory(Path::new("/card/DCIM"));

        notifier.fire("/elsewhere/file.jpg");
        assert!(!watcher.triggered());

        notifier.fire("/card/DCIM/IMG_9.JPG");
        assert!(watcher.triggered());
        assert_eq!(watcher.phase(), WatchPhase::Triggered);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(notifier.watched().is_empty());
        assert_eq!(notifier.listener_count(), 0);

        notifier.fire("/card/DCIM/IMG_10.JPG");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_triggered_is_terminal() {
        let notifier = Arc::new(ManualChangeNotifier::default());
        let (watcher, _) = counting_watcher(&notifier);
        watcher.add_directory(Path::new("/card"));
        notifier.fire("/card/new.jpg");

        watcher.add_directory(Path::new("/card/more"));
        assert!(watcher.triggered());
        assert!(watcher.watched_directories().is_empty());
        assert!(notifier.watched().is_empty());
    }

    #[test]
    fn test_drop_removes_watches() {
        let notifier = Arc::new(ManualChangeNotifier::default());
        let (watcher, fired) = counting_watcher(&notifier);
        watcher.add_directory(Path::new("/card"));

        drop(watcher);
        assert!(notifier.watched().is_empty());
        assert_eq!(notifier.listener_count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shared_directory_survives_other_watcher_teardown() {
        let notifier = Arc::new(ManualChangeNotifier::default());
        let (first, first_fired) = counting_watcher(&notifier);
        let (second, second_fired) = counting_watcher(&notifier);
        first.add_directory(Path::new("/card"));
        second.add_directory(Path::new("/card"));

        drop(first);
        assert_eq!(notifier.watched(), vec![Path::new("/card").to_path_buf()]);

        notifier.fire("/card/new.jpg");
        assert_eq!(first_fired.load(Ordering::SeqCst), 0);
        assert_eq!(second_fired.load(Ordering::SeqCst), 1);
        assert!(notifier.watched().is_empty());
    }

    #[tokio::test]
    async fn test_notify_watch_kept_for_remaining_watcher() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let notifier: Arc<dyn ChangeNotifier> = Arc::new(NotifyChangeNotifier::new().unwrap());

        let first = DefaultDirectoryWatcher::create(notifier.clone(), Box::new(|| {}));
        let (sender, mut receiver) = unbounded_channel();
        let second = DefaultDirectoryWatcher::create(
            notifier.clone(),
            Box::new(move || {
                let _ = sender.send(());
            }),
        );
        first.add_directory(&root);
        second.add_directory(&root);

        drop(first);
        write(root.join("new.jpg"), b"pixels").unwrap();

        timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("remaining watcher was not notified")
            .unwrap();
        assert!(second.triggered());
    }
}
