//! Status values reported by the sync core
//!
//! These are the non-error outcomes returned to callers and the values
//! carried by observer notifications.

use serde::{Deserialize, Serialize};

/// Terminal outcome of a sync operation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The operation completed
    Ok,
    /// The remote change queue was empty
    NoChangeToSync,
    /// The local side is mid-mutation; the caller may retry later
    FileBusy,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Ok => write!(f, "ok"),
            SyncStatus::NoChangeToSync => write!(f, "no_change_to_sync"),
            SyncStatus::FileBusy => write!(f, "file_busy"),
        }
    }
}

/// Overall connectivity / availability of the remote service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteServiceState {
    #[default]
    Ok,
    /// Transient failure (network, server unavailable); retry later
    TemporarilyUnavailable,
    /// Credentials are missing or expired
    AuthenticationRequired,
    /// Sync is turned off
    Disabled,
}

impl std::fmt::Display for RemoteServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemoteServiceState::Ok => "ok",
            RemoteServiceState::TemporarilyUnavailable => "temporarily_unavailable",
            RemoteServiceState::AuthenticationRequired => "authentication_required",
            RemoteServiceState::Disabled => "disabled",
        };
        write!(f, "{}", s)
    }
}

/// Sync status of a single file, as reported to file status observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFileStatus {
    Synced,
    HasPendingChanges,
    Conflicting,
}

/// Effect a sync had on a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Added,
    Updated,
    Deleted,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Added => write!(f, "added"),
            SyncAction::Updated => write!(f, "updated"),
            SyncAction::Deleted => write!(f, "deleted"),
        }
    }
}

/// Direction in which a change was propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    LocalToRemote,
    RemoteToLocal,
}
