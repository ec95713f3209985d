//! Origin registration and reconciliation
//!
//! The [`OriginRegistrationCoordinator`] owns the origin lifecycle:
//!
//! ```text
//! register ──► Batch ──(batch sync)──► Incremental
//!                ▲                          │
//!                │ re-enable                │ extension disabled
//!                └──────── Disabled ◄───────┘
//! ```
//!
//! Uninstalling the extension removes the origin entirely.
//!
//! Every write that follows a remote call re-checks the in-memory origin
//! table first, so an unregistration that races an in-flight remote call
//! never resurrects the origin.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use originsync_core::domain::{Origin, OriginRecord, OriginSyncState, ResourceId};

use crate::context::{apply_entry_updates, entry_url, CoreState, SyncContext};
use crate::{Result, SyncError};

/// Origins whose state changed during [`OriginRegistrationCoordinator::update_registered_origins`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub disabled: Vec<Origin>,
    pub enabled: Vec<Origin>,
    pub unregistered: Vec<Origin>,
}

impl ReconcileReport {
    /// True when reconciliation changed nothing
    pub fn is_empty(&self) -> bool {
        self.disabled.is_empty() && self.enabled.is_empty() && self.unregistered.is_empty()
    }
}

enum RegistrationStart {
    Fresh,
    Reenable,
}

enum Removal {
    CancelledRegistration,
    Removed { record: OriginRecord, dropped: usize },
}

/// Registers, unregisters and reconciles origins against extension state
pub struct OriginRegistrationCoordinator {
    ctx: Arc<SyncContext>,
}

impl OriginRegistrationCoordinator {
    pub(crate) fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn origin_state(&self, origin: &Origin) -> Option<OriginSyncState> {
        self.ctx
            .with_state(|s| s.origins.get(origin).map(|r| r.state()))
    }

    /// All registered origins, sorted by origin
    pub fn registered_origins(&self) -> Vec<OriginRecord> {
        let mut records: Vec<OriginRecord> =
            self.ctx.with_state(|s| s.origins.values().cloned().collect());
        records.sort_by(|a, b| a.origin().cmp(b.origin()));
        records
    }

    fn origins_in_state(&self, state: OriginSyncState) -> Vec<Origin> {
        let mut origins: Vec<Origin> = self.ctx.with_state(|s| {
            s.origins
                .values()
                .filter(|r| r.state() == state)
                .map(|r| r.origin().clone())
                .collect()
        });
        origins.sort();
        origins
    }

    /// Loads the persisted origin table into memory
    pub async fn load_origins(&self) -> Result<usize> {
        let records = self
            .ctx
            .metadata_store
            .list_origins()
            .await
            .map_err(SyncError::MetadataStore)?;
        let count = records.len();

        self.ctx.with_state(|s| {
            for record in records {
                s.origins.insert(record.origin().clone(), record);
            }
        });

        info!(count, "Loaded registered origins");
        Ok(count)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers `origin` for remote change tracking
    ///
    /// Resolves (or creates) the sync root and the origin's remote
    /// directory, persists the mapping in Batch state and, if sync is
    /// enabled, runs the initial batch sync. No mapping is written when
    /// directory resolution fails. A Disabled origin is re-enabled instead.
    #[tracing::instrument(skip(self), fields(origin = %origin))]
    pub async fn register_origin(&self, origin: &Origin) -> Result<()> {
        if origin.scheme() != self.ctx.settings.origin_scheme {
            return Err(SyncError::invalid_state(format!(
                "origin {origin} does not use the '{}' scheme",
                self.ctx.settings.origin_scheme
            )));
        }

        let start = self.ctx.with_state(|s| {
            if s.registering.contains(origin) {
                return Err(SyncError::invalid_state(format!(
                    "origin {origin} is already being registered"
                )));
            }
            match s.origins.get(origin).map(|r| r.state()) {
                Some(OriginSyncState::Disabled) => Ok(RegistrationStart::Reenable),
                Some(state) => Err(SyncError::invalid_state(format!(
                    "origin {origin} is already registered ({state})"
                ))),
                None => {
                    s.registering.insert(origin.clone());
                    Ok(RegistrationStart::Fresh)
                }
            }
        })?;

        match start {
            RegistrationStart::Reenable => {
                self.enable_origin(origin).await?;
            }
            RegistrationStart::Fresh => {
                let result = self.create_origin_mapping(origin).await;
                self.ctx.with_state(|s| s.registering.remove(origin));
                if let Err(err) = result {
                    error!(error = %err, "Origin registration failed");
                    return Err(err);
                }
            }
        }

        if self.ctx.is_sync_enabled() {
            self.run_batch_sync(origin).await?;
        } else {
            info!("Sync disabled, batch sync deferred");
        }
        Ok(())
    }

    async fn create_origin_mapping(&self, origin: &Origin) -> Result<()> {
        let directory = self.resolve_origin_directory(origin).await?;
        let record = OriginRecord::new(origin.clone(), directory);

        self.ctx
            .metadata_store
            .save_origin(&record)
            .await
            .map_err(SyncError::MetadataStore)?;

        let committed = self.ctx.with_state(|s| {
            if s.registering.contains(origin) {
                s.origins.insert(origin.clone(), record.clone());
                true
            } else {
                false
            }
        });

        if !committed {
            self.forget_persisted_origin(origin).await;
            return Err(SyncError::invalid_state(format!(
                "registration of {origin} was cancelled"
            )));
        }

        info!(directory = %record.directory(), "Origin registered");
        Ok(())
    }

    async fn resolve_origin_directory(&self, origin: &Origin) -> Result<ResourceId> {
        let cached_root = self
            .ctx
            .metadata_store
            .sync_root()
            .await
            .map_err(SyncError::MetadataStore)?;
        let had_cached_root = cached_root.is_some();
        let root = match cached_root {
            Some(root) => root,
            None => self.refresh_sync_root().await?,
        };

        let title = origin.directory_title();
        let found = match self.ctx.remote_api.find_or_create_directory(title, &root).await {
            Err(err) if err.is_not_found() && had_cached_root => {
                warn!(sync_root = %root, "Cached sync root no longer exists, resolving again");
                let root = self.refresh_sync_root().await?;
                self.ctx
                    .remote_api
                    .find_or_create_directory(title, &root)
                    .await
            }
            other => other,
        };
        let directory = self.ctx.track_remote(found)?;

        debug!(
            directory = %directory.resource_id,
            created = directory.created,
            "Resolved origin directory"
        );
        Ok(directory.resource_id)
    }

    async fn refresh_sync_root(&self) -> Result<ResourceId> {
        let root = self.ctx.track_remote(
            self.ctx
                .remote_api
                .get_or_create_sync_root(&self.ctx.settings.sync_root_title)
                .await,
        )?;
        self.ctx
            .metadata_store
            .set_sync_root(&root)
            .await
            .map_err(SyncError::MetadataStore)?;
        Ok(root)
    }

    // ========================================================================
    // Batch sync
    // ========================================================================

    /// Lists the origin's remote directory, queues its files, and moves the
    /// origin from Batch to Incremental
    ///
    /// Returns the number of queued changes.
    #[tracing::instrument(skip(self), fields(origin = %origin))]
    pub async fn run_batch_sync(&self, origin: &Origin) -> Result<usize> {
        let directory = self.ctx.with_state(|s| match s.origins.get(origin) {
            Some(r) if r.state() == OriginSyncState::Batch => Ok(r.directory().clone()),
            Some(r) => Err(SyncError::invalid_state(format!(
                "origin {origin} is {} and not awaiting batch sync",
                r.state()
            ))),
            None => Err(SyncError::invalid_state(format!(
                "origin {origin} is not registered"
            ))),
        })?;

        let ceiling = self
            .ctx
            .track_remote(self.ctx.remote_api.get_largest_changestamp().await)?;
        let entries = self
            .ctx
            .track_remote(self.ctx.remote_api.list_directory(&directory).await)?;

        let mut updates = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.is_deleted {
                continue;
            }
            let Some(url) = entry_url(origin, entry) else {
                continue;
            };
            updates.push(self.ctx.entry_update(url, ceiling, entry).await?);
        }

        let still_batch = |s: &CoreState| {
            s.origins.get(origin).is_some_and(|r| {
                r.state() == OriginSyncState::Batch && r.directory() == &directory
            })
        };
        if !self.ctx.with_state(|s| still_batch(s)) {
            return Err(SyncError::invalid_state(format!(
                "origin {origin} changed during batch sync"
            )));
        }

        let mut record =
            OriginRecord::with_state(origin.clone(), directory.clone(), OriginSyncState::Batch);
        record.mark_incremental()?;
        self.ctx
            .metadata_store
            .save_origin(&record)
            .await
            .map_err(SyncError::MetadataStore)?;

        let outcome = self.ctx.with_state(|s| {
            if !still_batch(s) {
                return None;
            }
            s.origins.insert(origin.clone(), record.clone());

            let delta = apply_entry_updates(&mut s.queue, updates);
            let other_incremental = s
                .origins
                .values()
                .any(|r| r.origin() != origin && r.state() == OriginSyncState::Incremental);
            Some((delta, other_incremental))
        });

        let Some((delta, other_incremental)) = outcome else {
            self.restore_persisted_origin(origin).await;
            return Err(SyncError::invalid_state(format!(
                "origin {origin} changed during batch sync"
            )));
        };

        if !other_incremental {
            let largest = self
                .ctx
                .metadata_store
                .largest_changestamp()
                .await
                .map_err(SyncError::MetadataStore)?;
            if ceiling > largest {
                self.ctx
                    .metadata_store
                    .set_largest_changestamp(ceiling)
                    .await
                    .map_err(SyncError::MetadataStore)?;
            }
        }

        info!(
            queued = delta.accepted,
            superseded = delta.superseded,
            listed = entries.len(),
            changestamp = %ceiling,
            "Batch sync complete, origin is incremental"
        );
        self.ctx.notify_queue_updated();
        Ok(delta.accepted)
    }

    /// Runs a batch sync for every origin still in Batch
    ///
    /// Every pending origin is attempted; the first failure is returned
    /// after all attempts.
    pub async fn run_pending_batch_syncs(&self) -> Result<usize> {
        if !self.ctx.is_sync_enabled() {
            return Ok(0);
        }

        let mut completed = 0;
        let mut first_error = None;
        for origin in self.origins_in_state(OriginSyncState::Batch) {
            match self.run_batch_sync(&origin).await {
                Ok(_) => completed += 1,
                Err(err) => {
                    warn!(origin = %origin, error = %err, "Batch sync failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(completed),
        }
    }

    // ========================================================================
    // Unregistration
    // ========================================================================

    /// Stops tracking `origin` and forgets its mapping
    ///
    /// Queued changes of the origin are dropped. Remote directory cleanup
    /// is best-effort: its failure does not fail the call.
    #[tracing::instrument(skip(self), fields(origin = %origin))]
    pub async fn unregister_origin(&self, origin: &Origin) -> Result<()> {
        let removal = self
            .ctx
            .with_state(|s| {
                if let Some(record) = s.origins.remove(origin) {
                    s.registering.remove(origin);
                    let dropped = s.queue.remove_changes_for_origin(origin);
                    Some(Removal::Removed { record, dropped })
                } else if s.registering.remove(origin) {
                    Some(Removal::CancelledRegistration)
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                SyncError::invalid_state(format!("origin {origin} is not registered"))
            })?;

        let (record, dropped) = match removal {
            Removal::CancelledRegistration => {
                info!("Pending registration cancelled");
                return Ok(());
            }
            Removal::Removed { record, dropped } => (record, dropped),
        };

        if dropped > 0 {
            self.ctx.notify_queue_updated();
        }

        self.ctx
            .metadata_store
            .remove_origin(origin)
            .await
            .map_err(SyncError::MetadataStore)?;

        if self.ctx.settings.cleanup_remote_on_unregister {
            let deleted = self
                .ctx
                .remote_api
                .delete_directory(record.directory())
                .await;
            if let Err(err) = self.ctx.track_remote(deleted) {
                warn!(
                    directory = %record.directory(),
                    error = %err,
                    "Remote directory cleanup failed"
                );
            }
        }

        info!(dropped, "Origin unregistered");
        Ok(())
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Reconciles registered origins against the extension-state feed
    ///
    /// - not installed → unregistered
    /// - installed but not enabled → Disabled, queued changes dropped
    /// - enabled again while Disabled → Batch (fresh listing on next batch sync)
    #[tracing::instrument(skip_all)]
    pub async fn update_registered_origins(
        &self,
        enabled: &HashSet<Origin>,
        installed: &HashSet<Origin>,
    ) -> Result<ReconcileReport> {
        let mut snapshot: Vec<(Origin, OriginSyncState)> = self.ctx.with_state(|s| {
            s.origins
                .values()
                .map(|r| (r.origin().clone(), r.state()))
                .collect()
        });
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = ReconcileReport::default();
        for (origin, state) in snapshot {
            if !installed.contains(&origin) {
                self.unregister_origin(&origin).await?;
                report.unregistered.push(origin);
            } else if !enabled.contains(&origin) {
                if state != OriginSyncState::Disabled && self.disable_origin(&origin).await? {
                    report.disabled.push(origin);
                }
            } else if state == OriginSyncState::Disabled && self.enable_origin(&origin).await? {
                report.enabled.push(origin);
            }
        }

        if !report.is_empty() {
            info!(
                disabled = report.disabled.len(),
                enabled = report.enabled.len(),
                unregistered = report.unregistered.len(),
                "Registered origins reconciled"
            );
        }
        Ok(report)
    }

    async fn disable_origin(&self, origin: &Origin) -> Result<bool> {
        let mut record = self.current_record(origin)?;
        if record.state() == OriginSyncState::Disabled {
            return Ok(false);
        }
        record.disable()?;
        self.commit_origin(record).await?;

        let dropped = self
            .ctx
            .with_state(|s| s.queue.remove_changes_for_origin(origin));
        if dropped > 0 {
            self.ctx.notify_queue_updated();
        }

        info!(origin = %origin, dropped, "Origin disabled");
        Ok(true)
    }

    async fn enable_origin(&self, origin: &Origin) -> Result<bool> {
        let mut record = self.current_record(origin)?;
        if record.state() != OriginSyncState::Disabled {
            return Ok(false);
        }
        record.enable()?;
        self.commit_origin(record).await?;

        info!(origin = %origin, "Origin re-enabled, awaiting batch sync");
        Ok(true)
    }

    fn current_record(&self, origin: &Origin) -> Result<OriginRecord> {
        self.ctx
            .with_state(|s| s.origins.get(origin).cloned())
            .ok_or_else(|| SyncError::invalid_state(format!("origin {origin} is not registered")))
    }

    /// Persists `record`, then publishes it in memory if the origin is
    /// still registered
    async fn commit_origin(&self, record: OriginRecord) -> Result<()> {
        self.ctx
            .metadata_store
            .save_origin(&record)
            .await
            .map_err(SyncError::MetadataStore)?;

        let origin = record.origin().clone();
        let committed = self.ctx.with_state(|s| match s.origins.get_mut(&origin) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => false,
        });

        if !committed {
            self.forget_persisted_origin(&origin).await;
            return Err(SyncError::invalid_state(format!(
                "origin {origin} was unregistered"
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Compensation
    // ========================================================================

    async fn forget_persisted_origin(&self, origin: &Origin) {
        if let Err(err) = self.ctx.metadata_store.remove_origin(origin).await {
            warn!(origin = %origin, error = %err, "Failed to remove stale origin mapping");
        }
    }

    /// Re-persists the in-memory record of `origin`, or removes the mapping
    /// if the origin is gone
    async fn restore_persisted_origin(&self, origin: &Origin) {
        let current = self.ctx.with_state(|s| s.origins.get(origin).cloned());
        let result = match current {
            Some(record) => self.ctx.metadata_store.save_origin(&record).await,
            None => self.ctx.metadata_store.remove_origin(origin).await,
        };
        if let Err(err) = result {
            warn!(origin = %origin, error = %err, "Failed to restore origin mapping");
        }
    }
}
