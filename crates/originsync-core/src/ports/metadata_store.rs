//! Metadata store port (driven/secondary port)
//!
//! This module defines the interface for persisting the sync core's
//! bookkeeping: the sync root id, origin → directory mappings with their
//! sync state, the largest processed changestamp, and per-file records of
//! what was last applied locally.
//!
//! ## Design Notes
//!
//! - Returns `anyhow::Result`; the sync core never branches on the kind
//!   of storage failure, it only reports it.
//! - Every method is transactional from the caller's point of view: a
//!   failed call leaves no partially-visible write.

use crate::domain::{
    newtypes::{Changestamp, Origin, ResourceId, SyncUrl},
    origin::{FileRecord, OriginRecord},
};

/// Port trait for persistent sync metadata
#[async_trait::async_trait]
pub trait IMetadataStore: Send + Sync {
    // --- Sync root ---

    /// Returns the cached sync root directory id, if any
    async fn sync_root(&self) -> anyhow::Result<Option<ResourceId>>;

    /// Caches the sync root directory id
    async fn set_sync_root(&self, resource_id: &ResourceId) -> anyhow::Result<()>;

    // --- Origins ---

    /// Retrieves the record of one origin
    async fn get_origin(&self, origin: &Origin) -> anyhow::Result<Option<OriginRecord>>;

    /// Retrieves all origin records, ordered by origin
    async fn list_origins(&self) -> anyhow::Result<Vec<OriginRecord>>;

    /// Saves an origin record (insert or update)
    async fn save_origin(&self, record: &OriginRecord) -> anyhow::Result<()>;

    /// Removes an origin mapping together with all of its file records
    ///
    /// Removing an unknown origin is not an error.
    async fn remove_origin(&self, origin: &Origin) -> anyhow::Result<()>;

    // --- Changestamp ---

    /// Largest remote changestamp already folded into the queue
    ///
    /// Returns [`Changestamp::ZERO`] when nothing has been recorded.
    async fn largest_changestamp(&self) -> anyhow::Result<Changestamp>;

    async fn set_largest_changestamp(&self, changestamp: Changestamp) -> anyhow::Result<()>;

    // --- File records ---

    /// Retrieves the record of the last applied remote state of a file
    async fn get_file(&self, url: &SyncUrl) -> anyhow::Result<Option<FileRecord>>;

    /// Looks up a file record by the remote resource id
    async fn find_file_by_resource_id(
        &self,
        resource_id: &ResourceId,
    ) -> anyhow::Result<Option<FileRecord>>;

    /// Saves a file record (insert or update)
    ///
    /// The record's origin must be registered.
    async fn save_file(&self, record: &FileRecord) -> anyhow::Result<()>;

    /// Removes a file record; removing an unknown file is not an error
    async fn remove_file(&self, url: &SyncUrl) -> anyhow::Result<()>;
}
