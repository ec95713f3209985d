//! Observer ports (driving notifications out of the core)
//!
//! Observers are notified synchronously, in the order events occur.
//! Implementations must return quickly and must not call back into the
//! sync service from inside a notification.

use crate::domain::{
    newtypes::SyncUrl,
    status::{RemoteServiceState, SyncAction, SyncDirection, SyncFileStatus},
};

/// Receives queue size and service availability updates
pub trait IRemoteServiceObserver: Send + Sync {
    /// The number of pending remote changes changed
    fn on_remote_change_queue_updated(&self, pending_changes: usize);

    /// The remote service state changed
    fn on_remote_service_state_updated(&self, state: RemoteServiceState, description: &str);
}

/// Receives per-file sync results
pub trait IFileStatusObserver: Send + Sync {
    fn on_file_status_changed(
        &self,
        url: &SyncUrl,
        sync_status: SyncFileStatus,
        action: SyncAction,
        direction: SyncDirection,
    );
}
