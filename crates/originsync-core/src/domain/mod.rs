//! Domain entities and business logic
//!
//! This module contains the core domain types for OriginSync:
//! - Newtypes for type-safe identifiers (origins, resource ids, changestamps, hashes, urls)
//! - Pending remote changes awaiting local application
//! - Origin registration records and their sync-state machine
//! - Status enums reported to callers and observers
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod origin;
pub mod pending_change;
pub mod status;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use origin::{FileRecord, OriginRecord, OriginSyncState};
pub use pending_change::{FileType, PendingChange};
pub use status::{RemoteServiceState, SyncAction, SyncDirection, SyncFileStatus, SyncStatus};
