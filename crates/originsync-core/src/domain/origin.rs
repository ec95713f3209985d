//! Origin registration records
//!
//! Every registered origin is backed by one remote directory under the
//! sync root and carries an [`OriginSyncState`]:
//!
//! ```text
//!            register
//!               │
//!               ▼
//!   ┌────────► Batch ──── listing done ────► Incremental
//!   │            │                               │
//!   │ re-enable  │ extension disabled            │ extension disabled
//!   │            ▼                               │
//!   └──────── Disabled ◄─────────────────────────┘
//! ```
//!
//! Disabled never returns to Incremental directly: changestamp continuity
//! is lost while tracking is paused, so a fresh listing is required.

use serde::{Deserialize, Serialize};

use super::{
    errors::DomainError,
    newtypes::{ContentHash, Origin, ResourceId, SyncUrl},
};

/// Tracking state of a registered origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginSyncState {
    /// Awaiting or undergoing the initial full listing
    #[default]
    Batch,
    /// Following remote changelist deltas
    Incremental,
    /// Tracking paused (owning extension disabled)
    Disabled,
}

impl OriginSyncState {
    /// Stable lowercase name, used for display and persistence
    pub fn name(&self) -> &'static str {
        match self {
            OriginSyncState::Batch => "batch",
            OriginSyncState::Incremental => "incremental",
            OriginSyncState::Disabled => "disabled",
        }
    }

    /// Returns true if remote changes for this origin should be tracked
    pub fn is_tracking(&self) -> bool {
        !matches!(self, OriginSyncState::Disabled)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: OriginSyncState) -> bool {
        use OriginSyncState::*;
        matches!(
            (self, next),
            (Batch, Incremental) | (Batch, Disabled) | (Incremental, Disabled) | (Disabled, Batch)
        )
    }
}

impl std::fmt::Display for OriginSyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for OriginSyncState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(OriginSyncState::Batch),
            "incremental" => Ok(OriginSyncState::Incremental),
            "disabled" => Ok(OriginSyncState::Disabled),
            other => Err(DomainError::UnknownState(other.to_string())),
        }
    }
}

/// Origin → remote directory mapping with the origin's tracking state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginRecord {
    origin: Origin,
    directory: ResourceId,
    state: OriginSyncState,
}

impl OriginRecord {
    /// Creates a freshly registered origin in [`OriginSyncState::Batch`]
    pub fn new(origin: Origin, directory: ResourceId) -> Self {
        Self {
            origin,
            directory,
            state: OriginSyncState::Batch,
        }
    }

    /// Rebuilds a record from persisted fields
    pub fn with_state(origin: Origin, directory: ResourceId, state: OriginSyncState) -> Self {
        Self {
            origin,
            directory,
            state,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Remote directory backing the origin
    pub fn directory(&self) -> &ResourceId {
        &self.directory
    }

    pub fn state(&self) -> OriginSyncState {
        self.state
    }

    /// Batch → Incremental, once the initial listing has been enqueued
    pub fn mark_incremental(&mut self) -> Result<(), DomainError> {
        self.transition(OriginSyncState::Incremental)
    }

    /// Batch/Incremental → Disabled
    pub fn disable(&mut self) -> Result<(), DomainError> {
        self.transition(OriginSyncState::Disabled)
    }

    /// Disabled → Batch
    pub fn enable(&mut self) -> Result<(), DomainError> {
        self.transition(OriginSyncState::Batch)
    }

    fn transition(&mut self, next: OriginSyncState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Remote state of a file as of its last successful local application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub url: SyncUrl,
    pub resource_id: ResourceId,
    pub content_hash: Option<ContentHash>,
}

impl FileRecord {
    pub fn new(url: SyncUrl, resource_id: ResourceId, content_hash: Option<ContentHash>) -> Self {
        Self {
            url,
            resource_id,
            content_hash,
        }
    }
}
