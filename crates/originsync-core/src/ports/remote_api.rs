//! Remote API port (driven/secondary port)
//!
//! This module defines the interface to the cloud-hosted file store. The
//! implementation owns transport, authentication, JSON parsing and every
//! retry/backoff/timeout policy; the core only sees the terminal outcome
//! of each call.
//!
//! ## Design Notes
//!
//! - Unlike the other ports, errors are typed ([`RemoteApiError`]) because
//!   the core translates them into a [`RemoteServiceState`].
//! - `RemoteEntry` and `RemoteChange` are port-level DTOs; the sync core
//!   maps them to domain `PendingChange`s.

use thiserror::Error;

use crate::domain::{
    newtypes::{Changestamp, ContentHash, ResourceId},
    pending_change::FileType,
    status::RemoteServiceState,
};

// ============================================================================
// RemoteApiError
// ============================================================================

/// Terminal failure reported by the remote API client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteApiError {
    /// Credentials missing, expired, or rejected (HTTP 401)
    #[error("Authentication required")]
    Unauthorized,

    /// The requested resource does not exist (HTTP 404)
    #[error("Remote resource not found: {0}")]
    NotFound(String),

    /// Connection-level failure (DNS, refused, reset, offline)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service is overloaded or in maintenance (HTTP 503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other HTTP failure
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Server-provided description
        message: String,
    },

    /// The request was cancelled before completion
    #[error("Request cancelled")]
    Cancelled,
}

impl RemoteApiError {
    /// Service state implied by this failure
    pub fn service_state(&self) -> RemoteServiceState {
        match self {
            RemoteApiError::Unauthorized => RemoteServiceState::AuthenticationRequired,
            RemoteApiError::Network(_) | RemoteApiError::ServiceUnavailable(_) => {
                RemoteServiceState::TemporarilyUnavailable
            }
            RemoteApiError::Http { status, .. } if *status >= 500 => {
                RemoteServiceState::TemporarilyUnavailable
            }
            _ => RemoteServiceState::Ok,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteApiError::NotFound(_))
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// A remote directory resolved by title under a parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDirectory {
    /// Resource id of the directory
    pub resource_id: ResourceId,
    /// Whether the directory had to be created
    pub created: bool,
}

/// A single file or folder entry as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Remote resource id of the entry
    pub resource_id: ResourceId,
    /// Entry title (the file name inside the origin directory)
    pub title: String,
    /// File or folder
    pub kind: FileType,
    /// Whether the entry has been deleted
    pub is_deleted: bool,
    /// Content checksum (None for folders and some deletions)
    pub content_hash: Option<ContentHash>,
    /// Parent directory ids (may be empty for deleted entries)
    pub parent_ids: Vec<ResourceId>,
}

/// A changelist entry: an entry together with the changestamp it was observed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChange {
    pub changestamp: Changestamp,
    pub entry: RemoteEntry,
}

/// Response of a changelist query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeList {
    /// Changes in ascending changestamp order
    pub changes: Vec<RemoteChange>,
    /// Largest changestamp of the account at the time of the query
    pub largest_changestamp: Changestamp,
}

/// Downloaded file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub content: Vec<u8>,
    pub content_hash: Option<ContentHash>,
}

// ============================================================================
// IRemoteApiClient trait
// ============================================================================

/// Port trait for the remote file store
///
/// Every method is a single asynchronous request; the returned future
/// resolves once the request reaches a terminal state.
#[async_trait::async_trait]
pub trait IRemoteApiClient: Send + Sync {
    /// Resolves the single sync root directory, creating it if absent
    ///
    /// # Arguments
    /// * `title` - Title of the sync root directory
    async fn get_or_create_sync_root(&self, title: &str) -> Result<ResourceId, RemoteApiError>;

    /// Searches `parent` for a directory titled `title`, creating it if absent
    async fn find_or_create_directory(
        &self,
        title: &str,
        parent: &ResourceId,
    ) -> Result<RemoteDirectory, RemoteApiError>;

    /// Returns the account's current largest changestamp
    async fn get_largest_changestamp(&self) -> Result<Changestamp, RemoteApiError>;

    /// Lists the current (non-deleted) contents of a directory
    async fn list_directory(
        &self,
        directory: &ResourceId,
    ) -> Result<Vec<RemoteEntry>, RemoteApiError>;

    /// Returns all changes with a changestamp of at least `start`
    async fn get_changes_since(&self, start: Changestamp) -> Result<ChangeList, RemoteApiError>;

    /// Downloads the content of a file
    async fn download_file(&self, resource_id: &ResourceId)
        -> Result<DownloadedFile, RemoteApiError>;

    /// Deletes a directory and everything below it
    async fn delete_directory(&self, resource_id: &ResourceId) -> Result<(), RemoteApiError>;
}
