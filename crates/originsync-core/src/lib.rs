//! OriginSync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `Origin`, `SyncUrl`, `PendingChange`, `OriginRecord`, sync status enums
//! - **Port definitions** - Traits for adapters: `IRemoteApiClient`, `IMetadataStore`,
//!   `IRemoteChangeProcessor`, and the observer interfaces
//! - **Configuration** - YAML-backed settings shared by the adapters and the sync core
//!
//! # Architecture
//!
//! The domain module contains pure value types and state transitions with no I/O.
//! Ports define the trait interfaces that the sync core depends on and that
//! adapter crates (or test fakes) implement.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
