//! Sync service
//!
//! [`SyncService`] is the entry point of the sync core. It owns the
//! pending change queue (through the shared context), delegates origin
//! lifecycle to the [`OriginRegistrationCoordinator`], and drives one
//! remote change at a time through the processing state machine:
//!
//! ```text
//! pop ─► PREPARE ─┬─ FileBusy ─► clear local ─► FileBusy
//!                 └─ otherwise ─► CLEAR_LOCAL ─► FETCH ─► APPLY ─► Ok
//! ```
//!
//! FETCH is skipped for deletions. A popped change is never re-queued:
//! a busy or failed change comes back only if a later changelist reports
//! it again with a higher changestamp.
//!
//! Processing does not look at the sync-enabled flag; disabling sync stops
//! change discovery (registration listings and changelist fetches), not the
//! draining of changes already queued.

use std::cmp::max;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use originsync_core::config::SyncConfig;
use originsync_core::domain::{
    Changestamp, FileRecord, Origin, OriginRecord, OriginSyncState, PendingChange,
    RemoteServiceState, ResourceId, SyncAction, SyncDirection, SyncFileStatus, SyncStatus,
    SyncUrl,
};
use originsync_core::ports::{
    IFileStatusObserver, IMetadataStore, IRemoteApiClient, IRemoteChangeProcessor,
    IRemoteServiceObserver, PrepareStatus, RemoteEntry, RemoteFileChange,
};

use crate::context::{apply_entry_updates, entry_url, EntryUpdate, SyncContext};
use crate::observers::ObserverHandle;
use crate::registration::{OriginRegistrationCoordinator, ReconcileReport};
use crate::{Result, SyncError};

// ============================================================================
// ProcessOutcome
// ============================================================================

/// Terminal, non-error result of [`SyncService::process_remote_change`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub status: SyncStatus,
    /// The url of the popped change (absent for `NoChangeToSync`)
    pub url: Option<SyncUrl>,
    /// The applied action (only for `Ok`)
    pub action: Option<SyncAction>,
}

impl ProcessOutcome {
    fn no_change() -> Self {
        Self {
            status: SyncStatus::NoChangeToSync,
            url: None,
            action: None,
        }
    }

    fn file_busy(url: SyncUrl) -> Self {
        Self {
            status: SyncStatus::FileBusy,
            url: Some(url),
            action: None,
        }
    }

    fn synced(url: SyncUrl, action: SyncAction) -> Self {
        Self {
            status: SyncStatus::Ok,
            url: Some(url),
            action: Some(action),
        }
    }
}

// ============================================================================
// SyncService
// ============================================================================

/// Remote-to-local sync core for many origins
pub struct SyncService {
    ctx: Arc<SyncContext>,
    coordinator: OriginRegistrationCoordinator,
    processor: Arc<dyn IRemoteChangeProcessor + Send + Sync>,
    /// Held for the whole of one `process_remote_change` call
    processing: tokio::sync::Mutex<()>,
}

impl SyncService {
    /// Creates a new `SyncService` with the given collaborators
    ///
    /// # Arguments
    /// * `remote_api` - Remote file store (IRemoteApiClient)
    /// * `metadata_store` - Persistent origin mappings (IMetadataStore)
    /// * `processor` - Local apply interface (IRemoteChangeProcessor)
    /// * `config` - Sync settings; `enabled` is the initial sync-enabled flag
    pub fn new(
        remote_api: Arc<dyn IRemoteApiClient + Send + Sync>,
        metadata_store: Arc<dyn IMetadataStore + Send + Sync>,
        processor: Arc<dyn IRemoteChangeProcessor + Send + Sync>,
        config: &SyncConfig,
    ) -> Self {
        let ctx = Arc::new(SyncContext::new(remote_api, metadata_store, config));
        Self {
            coordinator: OriginRegistrationCoordinator::new(Arc::clone(&ctx)),
            ctx,
            processor,
            processing: tokio::sync::Mutex::new(()),
        }
    }

    /// Loads the persisted origin table; returns the number of origins
    ///
    /// Origins persisted in Batch are picked up by
    /// [`run_pending_batch_syncs`](Self::run_pending_batch_syncs).
    pub async fn initialize(&self) -> Result<usize> {
        self.coordinator.load_origins().await
    }

    pub fn coordinator(&self) -> &OriginRegistrationCoordinator {
        &self.coordinator
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn add_service_observer(&self, observer: Arc<dyn IRemoteServiceObserver>) -> ObserverHandle {
        self.ctx.observers.add_service_observer(observer)
    }

    pub fn add_file_status_observer(&self, observer: Arc<dyn IFileStatusObserver>) -> ObserverHandle {
        self.ctx.observers.add_file_status_observer(observer)
    }

    pub fn remove_observer(&self, handle: ObserverHandle) -> bool {
        self.ctx.observers.remove(handle)
    }

    // ------------------------------------------------------------------------
    // Origin lifecycle
    // ------------------------------------------------------------------------

    pub async fn register_origin_for_tracking_changes(&self, origin: &Origin) -> Result<()> {
        self.coordinator.register_origin(origin).await
    }

    pub async fn unregister_origin_for_tracking_changes(&self, origin: &Origin) -> Result<()> {
        self.coordinator.unregister_origin(origin).await
    }

    pub async fn update_registered_origins(
        &self,
        enabled: &HashSet<Origin>,
        installed: &HashSet<Origin>,
    ) -> Result<ReconcileReport> {
        self.coordinator
            .update_registered_origins(enabled, installed)
            .await
    }

    pub async fn run_pending_batch_syncs(&self) -> Result<usize> {
        self.coordinator.run_pending_batch_syncs().await
    }

    /// Turns remote sync on or off
    ///
    /// Disabling publishes `RemoteServiceState::Disabled`. Enabling
    /// publishes `Ok` and runs the batch syncs deferred while disabled;
    /// their failures are logged, not returned.
    pub async fn set_sync_enabled(&self, enabled: bool) {
        let changed = self.ctx.with_state(|s| {
            if s.sync_enabled == enabled {
                false
            } else {
                s.sync_enabled = enabled;
                true
            }
        });
        if !changed {
            return;
        }

        if enabled {
            info!("Remote sync enabled");
            self.ctx
                .set_service_state(RemoteServiceState::Ok, "Remote sync enabled");
            if let Err(err) = self.coordinator.run_pending_batch_syncs().await {
                warn!(error = %err, "Deferred batch sync failed");
            }
        } else {
            info!("Remote sync disabled");
            self.ctx
                .set_service_state(RemoteServiceState::Disabled, "Remote sync disabled");
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn is_sync_enabled(&self) -> bool {
        self.ctx.is_sync_enabled()
    }

    pub fn service_state(&self) -> RemoteServiceState {
        self.ctx.with_state(|s| s.service_state)
    }

    /// Number of queued remote changes
    pub fn pending_changes(&self) -> usize {
        self.ctx.with_state(|s| s.queue.len())
    }

    pub fn has_changes(&self) -> bool {
        self.ctx.with_state(|s| s.queue.has_changes())
    }

    /// The queued change for `url`, if any
    pub fn pending_change(&self, url: &SyncUrl) -> Option<PendingChange> {
        self.ctx.with_state(|s| s.queue.get_change(url).cloned())
    }

    /// Offers a remote change to the queue through the override rules
    pub fn append_change(&self, change: PendingChange) -> bool {
        let accepted = self.ctx.with_state(|s| s.queue.append_change(change));
        if accepted {
            self.ctx.notify_queue_updated();
        }
        accepted
    }

    pub fn origin_state(&self, origin: &Origin) -> Option<OriginSyncState> {
        self.coordinator.origin_state(origin)
    }

    pub fn registered_origins(&self) -> Vec<OriginRecord> {
        self.coordinator.registered_origins()
    }

    // ------------------------------------------------------------------------
    // Incremental fetch
    // ------------------------------------------------------------------------

    /// Fetches the remote changelist since the stored largest changestamp
    /// and queues the changes of Incremental origins
    ///
    /// Returns the number of accepted changes. Does nothing while sync is
    /// disabled.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_remote_changes(&self) -> Result<usize> {
        if !self.ctx.is_sync_enabled() {
            debug!("Sync disabled, skipping changelist fetch");
            return Ok(0);
        }

        let largest = self
            .ctx
            .metadata_store
            .largest_changestamp()
            .await
            .map_err(SyncError::MetadataStore)?;
        let change_list = self
            .ctx
            .track_remote(self.ctx.remote_api.get_changes_since(largest.next()).await)?;

        let directories: HashMap<ResourceId, Origin> = self.ctx.with_state(|s| {
            s.origins
                .values()
                .filter(|r| r.state() == OriginSyncState::Incremental)
                .map(|r| (r.directory().clone(), r.origin().clone()))
                .collect()
        });

        let mut newest = max(largest, change_list.largest_changestamp);
        let mut updates = Vec::new();
        for change in &change_list.changes {
            newest = max(newest, change.changestamp);
            let Some(url) = self.resolve_change_url(&directories, &change.entry).await? else {
                continue;
            };
            updates.push(
                self.ctx
                    .entry_update(url, change.changestamp, &change.entry)
                    .await?,
            );
        }

        let delta = self.ctx.with_state(|s| {
            let incremental: Vec<EntryUpdate> = updates
                .into_iter()
                .filter(|u| {
                    s.origins
                        .get(u.url().origin())
                        .is_some_and(|r| r.state() == OriginSyncState::Incremental)
                })
                .collect();
            apply_entry_updates(&mut s.queue, incremental)
        });

        if newest > largest {
            self.ctx
                .metadata_store
                .set_largest_changestamp(newest)
                .await
                .map_err(SyncError::MetadataStore)?;
        }

        info!(
            fetched = change_list.changes.len(),
            queued = delta.accepted,
            superseded = delta.superseded,
            changestamp = %newest,
            "Remote changelist processed"
        );
        if delta.changed() {
            self.ctx.notify_queue_updated();
        }
        Ok(delta.accepted)
    }

    /// Maps a changelist entry to a url inside an Incremental origin
    async fn resolve_change_url(
        &self,
        directories: &HashMap<ResourceId, Origin>,
        entry: &RemoteEntry,
    ) -> Result<Option<SyncUrl>> {
        if let Some(origin) = entry.parent_ids.iter().find_map(|p| directories.get(p)) {
            return Ok(entry_url(origin, entry));
        }

        if !entry.is_deleted {
            return Ok(None);
        }

        // Deleted entries may come without parents; fall back to the last applied record.
        let record = self
            .ctx
            .metadata_store
            .find_file_by_resource_id(&entry.resource_id)
            .await
            .map_err(SyncError::MetadataStore)?;
        Ok(record
            .map(|r| r.url)
            .filter(|url| directories.values().any(|o| o == url.origin())))
    }

    // ------------------------------------------------------------------------
    // ProcessRemoteChange
    // ------------------------------------------------------------------------

    /// Pops one pending change and applies it locally
    ///
    /// Only one change is processed at a time; concurrent callers wait for
    /// the current change to reach a terminal state.
    #[tracing::instrument(skip(self))]
    pub async fn process_remote_change(&self) -> Result<ProcessOutcome> {
        let _slot = self.processing.lock().await;

        let Some(change) = self.ctx.with_state(|s| s.queue.pop_next_change()) else {
            return Ok(ProcessOutcome::no_change());
        };
        self.ctx.notify_queue_updated();

        let url = change.url().clone();
        self.ensure_tracked(&url)?;

        // PREPARE
        let prepared = self
            .processor
            .prepare_for_process_remote_change(&url)
            .await
            .map_err(SyncError::ChangeProcessor)?;

        if prepared.status == PrepareStatus::FileBusy {
            self.processor
                .clear_local_changes(&url)
                .await
                .map_err(SyncError::ChangeProcessor)?;
            warn!(url = %url, changestamp = %change.changestamp(), "Local file busy, change dropped");
            return Ok(ProcessOutcome::file_busy(url));
        }

        let action = if change.is_deleted() {
            SyncAction::Deleted
        } else if prepared.status == PrepareStatus::NotFound {
            SyncAction::Added
        } else {
            SyncAction::Updated
        };

        // CLEAR_LOCAL
        self.processor
            .clear_local_changes(&url)
            .await
            .map_err(SyncError::ChangeProcessor)?;

        // FETCH
        let remote_change = if change.is_deleted() {
            RemoteFileChange::Delete
        } else {
            let downloaded = self
                .ctx
                .track_remote(self.ctx.remote_api.download_file(change.resource_id()).await)?;
            RemoteFileChange::AddOrUpdate {
                content: downloaded.content,
            }
        };

        // The origin may have been unregistered or disabled during FETCH
        self.ensure_tracked(&url)?;

        // APPLY
        self.processor
            .apply_remote_change(remote_change, &url)
            .await
            .map_err(SyncError::ChangeProcessor)?;

        self.ensure_tracked(&url)?;
        self.record_applied(&change).await;

        info!(
            url = %url,
            %action,
            changestamp = %change.changestamp(),
            "Remote change applied"
        );
        self.ctx.observers.notify_file_status(
            &url,
            SyncFileStatus::Synced,
            action,
            SyncDirection::RemoteToLocal,
        );
        Ok(ProcessOutcome::synced(url, action))
    }

    /// Fails with InvalidState unless the origin of `url` is Batch or Incremental
    fn ensure_tracked(&self, url: &SyncUrl) -> Result<()> {
        let tracked = self.ctx.with_state(|s| {
            s.origins
                .get(url.origin())
                .is_some_and(|r| r.state().is_tracking())
        });
        if tracked {
            return Ok(());
        }
        warn!(url = %url, "Dropping change for an origin that is not tracked");
        Err(SyncError::invalid_state(format!(
            "origin {} is not tracked",
            url.origin()
        )))
    }

    /// Records the applied remote state so unchanged files are not queued again
    async fn record_applied(&self, change: &PendingChange) {
        let store = &self.ctx.metadata_store;
        let result = if change.is_deleted() {
            store.remove_file(change.url()).await
        } else {
            store
                .save_file(&FileRecord::new(
                    change.url().clone(),
                    change.resource_id().clone(),
                    change.content_hash().cloned(),
                ))
                .await
        };
        if let Err(err) = result {
            warn!(url = %change.url(), error = %err, "Failed to record applied change");
        }
    }

    /// The largest changestamp recorded in the metadata store
    pub async fn largest_changestamp(&self) -> Result<Changestamp> {
        self.ctx
            .metadata_store
            .largest_changestamp()
            .await
            .map_err(SyncError::MetadataStore)
    }
}
