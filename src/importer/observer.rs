//! Scan lifecycle notifications.
//!
//! Observers register with a scanner and are told when a scan gains an
//! entry, is invalidated by a directory change, or settles.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use {
    parking_lot::RwLock,
    serde::Serialize,
    tokio::sync::broadcast::{Receiver, Sender, channel},
    tracing::error,
};

use crate::importer::scan_result::{ScanResult, ScanStatistics};

/// Events emitted over the life of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanEvent {
    /// A new unique entry was added.
    Updated,
    /// A watched directory changed; the scan was canceled.
    Invalidated,
    /// The scan settled.
    Finalized,
}

/// Subscriber to scan events.
///
/// Closures of the form `Fn(ScanEvent, &ScanResult)` implement this trait.
pub trait ScanObserver: Send + Sync {
    /// Handles one event for `result`.
    fn notify(&self, event: ScanEvent, result: &ScanResult);
}

impl<F> ScanObserver for F
where
    F: Fn(ScanEvent, &ScanResult) + Send + Sync,
{
    fn notify(&self, event: ScanEvent, result: &ScanResult) {
        self(event, result);
    }
}

/// Set of observers owned by a scanner.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn ScanObserver>>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer`.
    pub fn add(&self, observer: Arc<dyn ScanObserver>) {
        self.observers.write().push(observer);
    }

    /// Unregisters `observer`, comparing by identity.
    ///
    /// Returns `false` if it was not registered.
    pub fn remove(&self, observer: &Arc<dyn ScanObserver>) -> bool {
        let mut observers = self.observers.write();
        match observers.iter().position(|known| Arc::ptr_eq(known, observer)) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Delivers `event` to every observer.
    ///
    /// Observers run outside the registry lock, so they may add or remove
    /// observers. A panicking observer is logged and skipped.
    pub fn notify(&self, event: ScanEvent, result: &ScanResult) {
        let observers = self.observers.read().clone();
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer.notify(event, result))).is_err() {
                error!("{}: Observer panicked while handling {:?}", result.name(), event);
            }
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl Debug for ObserverRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

/// Snapshot of a scan taken when an event fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanNotification {
    /// What happened.
    pub event: ScanEvent,
    /// Id of the scan.
    pub scan_id: u64,
    /// Statistics at the time of the event.
    pub statistics: ScanStatistics,
}

/// Observer that republishes events on a Tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: Sender<ScanNotification>,
}

impl BroadcastObserver {
    /// Creates an observer whose channel buffers `capacity` notifications.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to scan notifications.
    pub fn subscribe(&self) -> Receiver<ScanNotification> {
        self.sender.subscribe()
    }
}

impl ScanObserver for BroadcastObserver {
    fn notify(&self, event: ScanEvent, result: &ScanResult) {
        // No subscribers is fine.
        let _ = self.sender.send(ScanNotification {
            event,
            scan_id: result.id(),
            statistics: result.statistics(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use crate::importer::{
        observer::{BroadcastObserver, ObserverRegistry, ScanEvent, ScanObserver},
        scan_result::ScanResult,
    };

    fn counting_observer(counter: &Arc<AtomicUsize>) -> Arc<dyn ScanObserver> {
        let counter = counter.clone();
        Arc::new(move |_event: ScanEvent, _result: &ScanResult| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn panicking_observer(_event: ScanEvent, _result: &ScanResult) {
        panic!("observer failure");
    }

    #[test]
    fn test_add_and_remove_by_identity() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = counting_observer(&counter);
        let second = counting_observer(&counter);

        registry.add(first.clone());
        registry.add(second.clone());
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&first));
        assert!(!registry.remove(&first));
        assert_eq!(registry.len(), 1);

        registry.notify(ScanEvent::Updated, &ScanResult::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.add(Arc::new(panicking_observer));
        registry.add(counting_observer(&counter));

        registry.notify(ScanEvent::Finalized, &ScanResult::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_observer_forwards_events() {
        let observer = BroadcastObserver::new(8);
        let mut receiver = observer.subscribe();
        let scan = ScanResult::new();

        observer.notify(ScanEvent::Invalidated, &scan);

        let notification = receiver.recv().await.unwrap();
        assert_eq!(notification.event, ScanEvent::Invalidated);
        assert_eq!(notification.scan_id, scan.id());
        assert_eq!(notification.statistics.new_file_count, 0);
    }
}
