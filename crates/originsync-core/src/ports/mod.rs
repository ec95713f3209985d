//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteApiClient`] - Remote file store: directories, listings, changelists, downloads
//! - [`IMetadataStore`] - Persistent origin mappings, changestamps and file records
//! - [`IRemoteChangeProcessor`] - Two-phase application of remote changes to local files
//! - [`IRemoteServiceObserver`] / [`IFileStatusObserver`] - Notifications out of the core

pub mod change_processor;
pub mod metadata_store;
pub mod observer;
pub mod remote_api;

pub use change_processor::{
    IRemoteChangeProcessor, LocalFileMetadata, PrepareResult, PrepareStatus, RemoteFileChange,
};
pub use metadata_store::IMetadataStore;
pub use observer::{IFileStatusObserver, IRemoteServiceObserver};
pub use remote_api::{
    ChangeList, DownloadedFile, IRemoteApiClient, RemoteApiError, RemoteChange, RemoteDirectory,
    RemoteEntry,
};
