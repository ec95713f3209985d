//! Observer registry
//!
//! Listeners are kept in registration order and notified synchronously.
//! The listener list is cloned before notifying, so an observer may be
//! added or removed from another thread while a notification is running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use originsync_core::domain::{
    RemoteServiceState, SyncAction, SyncDirection, SyncFileStatus, SyncUrl,
};
use originsync_core::ports::{IFileStatusObserver, IRemoteServiceObserver};

/// Handle returned on registration, used to remove the observer again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type ServiceEntries = Mutex<Vec<(ObserverHandle, Arc<dyn IRemoteServiceObserver>)>>;
type FileStatusEntries = Mutex<Vec<(ObserverHandle, Arc<dyn IFileStatusObserver>)>>;

fn lock<V>(entries: &Mutex<V>) -> MutexGuard<'_, V> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Explicit registry of service and file-status observers
#[derive(Default)]
pub struct ObserverRegistry {
    next_handle: AtomicU64,
    service_observers: ServiceEntries,
    file_status_observers: FileStatusEntries,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&self) -> ObserverHandle {
        ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_service_observer(&self, observer: Arc<dyn IRemoteServiceObserver>) -> ObserverHandle {
        let handle = self.next_handle();
        lock(&self.service_observers).push((handle, observer));
        handle
    }

    pub fn add_file_status_observer(&self, observer: Arc<dyn IFileStatusObserver>) -> ObserverHandle {
        let handle = self.next_handle();
        lock(&self.file_status_observers).push((handle, observer));
        handle
    }

    /// Removes the observer registered under `handle`; returns false if unknown
    pub fn remove(&self, handle: ObserverHandle) -> bool {
        let mut service = lock(&self.service_observers);
        if let Some(pos) = service.iter().position(|(h, _)| *h == handle) {
            service.remove(pos);
            return true;
        }
        drop(service);

        let mut file_status = lock(&self.file_status_observers);
        if let Some(pos) = file_status.iter().position(|(h, _)| *h == handle) {
            file_status.remove(pos);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        lock(&self.service_observers).len() + lock(&self.file_status_observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn service_snapshot(&self) -> Vec<Arc<dyn IRemoteServiceObserver>> {
        lock(&self.service_observers)
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect()
    }

    pub fn notify_queue_updated(&self, pending_changes: usize) {
        for observer in self.service_snapshot() {
            observer.on_remote_change_queue_updated(pending_changes);
        }
    }

    pub fn notify_service_state(&self, state: RemoteServiceState, description: &str) {
        for observer in self.service_snapshot() {
            observer.on_remote_service_state_updated(state, description);
        }
    }

    pub fn notify_file_status(
        &self,
        url: &SyncUrl,
        sync_status: SyncFileStatus,
        action: SyncAction,
        direction: SyncDirection,
    ) {
        let observers: Vec<_> = lock(&self.file_status_observers)
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer.on_file_status_changed(url, sync_status, action, direction);
        }
    }
}
