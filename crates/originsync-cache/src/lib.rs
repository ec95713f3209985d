//! OriginSync Cache - Local metadata persistence
//!
//! SQLite-based storage for:
//! - The remote sync root directory id
//! - Origin → remote directory mappings and their sync state
//! - The largest remote changestamp folded into the queue
//! - Per-file records of the last applied remote state
//!
//! ## Architecture
//!
//! [`SqliteMetadataStore`] is the SQLite adapter behind the `IMetadataStore`
//! port of `originsync-core`. Nothing else in the workspace touches sqlx.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use originsync_cache::{DatabasePool, SqliteMetadataStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/originsync/metadata.db")).await?;
//! let store = SqliteMetadataStore::new(pool.pool().clone());
//! // Use store as IMetadataStore...
//! # Ok(())
//! # }
//! ```

pub mod metadata_store;
pub mod pool;

pub use metadata_store::SqliteMetadataStore;
pub use pool::DatabasePool;

/// Metadata database failures
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("metadata database unavailable: {0}")]
    ConnectionFailed(String),

    #[error("metadata query failed: {0}")]
    QueryFailed(String),

    #[error("metadata schema could not be applied: {0}")]
    MigrationFailed(String),

    /// A stored value no longer parses into its domain type
    #[error("corrupt metadata row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
