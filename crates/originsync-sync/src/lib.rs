//! OriginSync Sync - Remote change tracking and application
//!
//! Provides:
//! - A per-path pending change queue with changestamp-ordered override rules
//! - Origin registration, batch listing and extension-state reconciliation
//! - The one-change-at-a-time remote change processing state machine
//! - Observer fan-out for queue, service-state and file-status events
//!
//! ## Modules
//!
//! - [`queue`] - [`RemoteChangeQueue`] and its accept/reject rules
//! - [`observers`] - [`ObserverRegistry`] and removal handles
//! - [`registration`] - [`OriginRegistrationCoordinator`]
//! - [`service`] - [`SyncService`], the public entry point

mod context;
pub mod observers;
pub mod queue;
pub mod registration;
pub mod service;

pub use observers::{ObserverHandle, ObserverRegistry};
pub use queue::{AppendDecision, RemoteChangeQueue};
pub use registration::{OriginRegistrationCoordinator, ReconcileReport};
pub use service::{ProcessOutcome, SyncService};

use originsync_core::domain::DomainError;
use originsync_core::ports::RemoteApiError;
use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote API reported a terminal failure
    #[error("Remote API error: {0}")]
    RemoteApi(#[from] RemoteApiError),

    /// The operation is not valid for the current origin state
    /// (unregistered origin, double registration, ...)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The metadata store failed
    #[error("Metadata store error: {0:#}")]
    MetadataStore(anyhow::Error),

    /// The local change processor failed
    #[error("Change processor error: {0:#}")]
    ChangeProcessor(anyhow::Error),

    /// A remote value could not be converted into a domain type
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        SyncError::InvalidState(msg.into())
    }

    /// Returns true for misuse errors such as operating on an unregistered origin
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, SyncError::InvalidState(_))
    }

    /// The remote failure behind this error, if any
    pub fn remote_api_error(&self) -> Option<&RemoteApiError> {
        match self {
            SyncError::RemoteApi(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
