//! Shared state of the sync core
//!
//! All mutable core state (queue, in-memory origin table, sync flag and
//! service state) lives behind one mutex. The lock is only taken for short
//! synchronous sections: it is never held across an `.await`, and
//! observers are always notified after it has been released.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use originsync_core::config::SyncConfig;
use originsync_core::domain::{
    Changestamp, FileRecord, Origin, OriginRecord, PendingChange, RemoteServiceState, SyncUrl,
};
use originsync_core::ports::{IMetadataStore, IRemoteApiClient, RemoteApiError, RemoteEntry};

use crate::observers::ObserverRegistry;
use crate::queue::RemoteChangeQueue;
use crate::SyncError;

/// Settings the core reads from [`SyncConfig`]
#[derive(Debug, Clone)]
pub(crate) struct SyncSettings {
    pub sync_root_title: String,
    pub cleanup_remote_on_unregister: bool,
    pub origin_scheme: String,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            sync_root_title: config.sync_root_title.clone(),
            cleanup_remote_on_unregister: config.cleanup_remote_on_unregister,
            origin_scheme: config.origin_scheme.clone(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CoreState {
    pub queue: RemoteChangeQueue,
    /// Registered origins (Batch, Incremental or Disabled)
    pub origins: HashMap<Origin, OriginRecord>,
    /// Origins whose registration has remote calls in flight
    pub registering: HashSet<Origin>,
    pub sync_enabled: bool,
    pub service_state: RemoteServiceState,
}

pub(crate) struct SyncContext {
    pub remote_api: Arc<dyn IRemoteApiClient + Send + Sync>,
    pub metadata_store: Arc<dyn IMetadataStore + Send + Sync>,
    pub observers: ObserverRegistry,
    pub settings: SyncSettings,
    state: Mutex<CoreState>,
}

impl SyncContext {
    pub fn new(
        remote_api: Arc<dyn IRemoteApiClient + Send + Sync>,
        metadata_store: Arc<dyn IMetadataStore + Send + Sync>,
        config: &SyncConfig,
    ) -> Self {
        let service_state = if config.enabled {
            RemoteServiceState::Ok
        } else {
            RemoteServiceState::Disabled
        };

        Self {
            remote_api,
            metadata_store,
            observers: ObserverRegistry::new(),
            settings: SyncSettings::from(config),
            state: Mutex::new(CoreState {
                queue: RemoteChangeQueue::new(),
                origins: HashMap::new(),
                registering: HashSet::new(),
                sync_enabled: config.enabled,
                service_state,
            }),
        }
    }

    /// Runs `f` with exclusive access to the core state
    pub fn with_state<R>(&self, f: impl FnOnce(&mut CoreState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.with_state(|s| s.sync_enabled)
    }

    pub fn notify_queue_updated(&self) {
        let pending = self.with_state(|s| s.queue.len());
        self.observers.notify_queue_updated(pending);
    }

    /// Moves the service to `state`, notifying observers if it changed
    pub fn set_service_state(&self, state: RemoteServiceState, description: &str) -> bool {
        let changed = self.with_state(|s| {
            if s.service_state == state {
                false
            } else {
                s.service_state = state;
                true
            }
        });

        if changed {
            info!(%state, description, "Remote service state changed");
            self.observers.notify_service_state(state, description);
        }
        changed
    }

    /// Passes a remote call result through, recording its effect on the service state
    pub fn track_remote<T>(&self, result: Result<T, RemoteApiError>) -> crate::Result<T> {
        match result {
            Ok(value) => {
                self.report_remote_success();
                Ok(value)
            }
            Err(err) => {
                self.report_remote_error(&err);
                Err(SyncError::RemoteApi(err))
            }
        }
    }

    fn report_remote_error(&self, err: &RemoteApiError) {
        if matches!(err, RemoteApiError::Cancelled) || !self.is_sync_enabled() {
            return;
        }
        self.set_service_state(err.service_state(), &err.to_string());
    }

    fn report_remote_success(&self) {
        if self.is_sync_enabled() {
            self.set_service_state(RemoteServiceState::Ok, "Remote service is available");
        }
    }

    /// Whether the file at `url` already holds the content described by `entry`
    async fn is_already_synced(&self, url: &SyncUrl, entry: &RemoteEntry) -> crate::Result<bool> {
        if entry.is_deleted {
            return Ok(false);
        }
        let record = self
            .metadata_store
            .get_file(url)
            .await
            .map_err(SyncError::MetadataStore)?;
        Ok(record.is_some_and(|r| matches_record(&r, entry)))
    }

    /// Decides what a remote entry observed at `changestamp` does to the queue
    pub async fn entry_update(
        &self,
        url: SyncUrl,
        changestamp: Changestamp,
        entry: &RemoteEntry,
    ) -> crate::Result<EntryUpdate> {
        if self.is_already_synced(&url, entry).await? {
            debug!(url = %url, %changestamp, "Remote file already synced");
            return Ok(EntryUpdate::Settled { url, changestamp });
        }
        Ok(EntryUpdate::Queue(pending_change_from_entry(
            url,
            changestamp,
            entry,
        )))
    }
}

fn matches_record(record: &FileRecord, entry: &RemoteEntry) -> bool {
    record.resource_id == entry.resource_id && record.content_hash == entry.content_hash
}

/// Effect of one mapped remote entry on the queue
#[derive(Debug, Clone)]
pub(crate) enum EntryUpdate {
    /// The entry differs from the local file and is offered to the queue
    Queue(PendingChange),
    /// The local file already matches the entry; older queued changes are obsolete
    Settled {
        url: SyncUrl,
        changestamp: Changestamp,
    },
}

impl EntryUpdate {
    pub fn url(&self) -> &SyncUrl {
        match self {
            EntryUpdate::Queue(change) => change.url(),
            EntryUpdate::Settled { url, .. } => url,
        }
    }
}

/// Counts of what [`apply_entry_updates`] did to the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct QueueDelta {
    pub accepted: usize,
    pub superseded: usize,
}

impl QueueDelta {
    pub fn changed(&self) -> bool {
        self.accepted + self.superseded > 0
    }
}

/// Applies updates in changelist order
pub(crate) fn apply_entry_updates(
    queue: &mut RemoteChangeQueue,
    updates: impl IntoIterator<Item = EntryUpdate>,
) -> QueueDelta {
    let mut delta = QueueDelta::default();
    for update in updates {
        match update {
            EntryUpdate::Queue(change) => {
                if queue.append_change(change) {
                    delta.accepted += 1;
                }
            }
            EntryUpdate::Settled { url, changestamp } => {
                if queue.remove_superseded_change(&url, changestamp).is_some() {
                    delta.superseded += 1;
                }
            }
        }
    }
    delta
}

/// Maps a flat remote entry to a url inside `origin`
///
/// Titles containing `/` would name a nested path and are skipped.
pub(crate) fn entry_url(origin: &Origin, entry: &RemoteEntry) -> Option<SyncUrl> {
    if entry.title.contains('/') {
        warn!(title = %entry.title, "Skipping remote entry with '/' in its title");
        return None;
    }
    match SyncUrl::new(origin.clone(), entry.title.as_str()) {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(title = %entry.title, error = %err, "Skipping remote entry");
            None
        }
    }
}

/// Builds the queue entry for a remote entry observed at `changestamp`
fn pending_change_from_entry(
    url: SyncUrl,
    changestamp: Changestamp,
    entry: &RemoteEntry,
) -> PendingChange {
    let change = if entry.is_deleted {
        PendingChange::deletion(
            url,
            changestamp,
            entry.resource_id.clone(),
            entry.content_hash.clone(),
        )
    } else {
        PendingChange::file(
            url,
            changestamp,
            entry.resource_id.clone(),
            entry.content_hash.clone(),
        )
    };
    change.with_file_type(entry.kind)
}
