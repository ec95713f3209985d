//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid origin state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid origin identifier
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    /// Invalid remote resource id
    #[error("Invalid resource ID: {0}")]
    InvalidResourceId(String),

    /// Invalid origin-relative path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid content hash
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Unrecognized origin sync-state name
    #[error("Unknown origin sync state: {0}")]
    UnknownState(String),

    /// Invalid origin sync-state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },
}
