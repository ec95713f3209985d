//! Remote change processor port (driven/secondary port)
//!
//! This module defines the two-phase interface through which remote
//! changes reach the local sandboxed file store: `prepare` inspects the
//! local file and reports whether it can be touched, `apply` is the single
//! atomic local commit, and `clear_local_changes` discards local pending
//! mutations that a remote change shadows.
//!
//! ## Design Notes
//!
//! - Returns `anyhow::Result`; local failures surface as
//!   `SyncError::ChangeProcessor` unchanged.
//! - A busy local file is not an error: it is reported as
//!   [`PrepareStatus::FileBusy`].

use chrono::{DateTime, Utc};

use crate::domain::{newtypes::SyncUrl, pending_change::FileType};

/// Outcome of the prepare phase for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareStatus {
    /// Local metadata is available
    Available,
    /// The local file is mid-mutation and must not be touched now
    FileBusy,
    /// No local file exists at the url
    NotFound,
    /// A local file exists and has no pending local modification
    NotModified,
}

/// Local metadata of the target file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFileMetadata {
    pub file_type: FileType,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Result of [`IRemoteChangeProcessor::prepare_for_process_remote_change`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResult {
    pub status: PrepareStatus,
    pub metadata: LocalFileMetadata,
}

impl PrepareResult {
    /// Convenience constructor for a result without local metadata
    pub fn new(status: PrepareStatus) -> Self {
        Self {
            status,
            metadata: LocalFileMetadata::default(),
        }
    }

    /// Attaches local metadata
    pub fn with_metadata(mut self, metadata: LocalFileMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The local effect to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFileChange {
    /// Create or overwrite the file with the downloaded content
    AddOrUpdate {
        /// Downloaded file content
        content: Vec<u8>,
    },
    /// Delete the local file
    Delete,
}

impl RemoteFileChange {
    pub fn is_delete(&self) -> bool {
        matches!(self, RemoteFileChange::Delete)
    }
}

/// Port trait for applying remote changes to the local file store
#[async_trait::async_trait]
pub trait IRemoteChangeProcessor: Send + Sync {
    /// Inspects the local file at `url` before a remote change is applied
    async fn prepare_for_process_remote_change(&self, url: &SyncUrl)
        -> anyhow::Result<PrepareResult>;

    /// Atomically commits `change` at `url`
    async fn apply_remote_change(
        &self,
        change: RemoteFileChange,
        url: &SyncUrl,
    ) -> anyhow::Result<()>;

    /// Discards local pending mutations recorded for `url`
    async fn clear_local_changes(&self, url: &SyncUrl) -> anyhow::Result<()>;
}
