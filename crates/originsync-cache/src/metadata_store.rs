//! SQLite implementation of IMetadataStore
//!
//! ## Type Mapping
//!
//! | Domain Type      | SQL Type | Strategy                                        |
//! |------------------|----------|-------------------------------------------------|
//! | Origin           | TEXT     | `as_str()` / `Origin::new()`                    |
//! | ResourceId       | TEXT     | `as_str()` / `ResourceId::new()`                |
//! | ContentHash      | TEXT     | `as_str()` / `ContentHash::new()`, NULL if none |
//! | OriginSyncState  | TEXT     | `name()` / `FromStr`                            |
//! | Changestamp      | TEXT     | decimal string in `store_state`                 |
//! | SyncUrl          | 2×TEXT   | `(origin, path)` composite key                  |

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use originsync_core::domain::{
    newtypes::{Changestamp, ContentHash, Origin, ResourceId, SyncUrl},
    origin::{FileRecord, OriginRecord, OriginSyncState},
};
use originsync_core::ports::IMetadataStore;

use crate::CacheError;

const KEY_SYNC_ROOT: &str = "sync_root";
const KEY_LARGEST_CHANGESTAMP: &str = "largest_changestamp";

/// SQLite-backed metadata store
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value FROM store_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO store_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn corrupt(what: &str, err: impl std::fmt::Display) -> CacheError {
    CacheError::CorruptRow(format!("{what}: {err}"))
}

fn origin_record_from_row(row: &SqliteRow) -> Result<OriginRecord, CacheError> {
    let origin_str: String = row.get("origin");
    let directory_str: String = row.get("directory_id");
    let state_str: String = row.get("sync_state");

    let origin = Origin::new(origin_str).map_err(|e| corrupt("origin", e))?;
    let directory = ResourceId::new(directory_str).map_err(|e| corrupt("directory_id", e))?;
    let state = OriginSyncState::from_str(&state_str).map_err(|e| corrupt("sync_state", e))?;

    Ok(OriginRecord::with_state(origin, directory, state))
}

fn file_record_from_row(row: &SqliteRow) -> Result<FileRecord, CacheError> {
    let origin_str: String = row.get("origin");
    let path: String = row.get("path");
    let resource_id_str: String = row.get("resource_id");
    let content_hash_str: Option<String> = row.get("content_hash");

    let origin = Origin::new(origin_str).map_err(|e| corrupt("origin", e))?;
    let url = SyncUrl::new(origin, path).map_err(|e| corrupt("path", e))?;
    let resource_id = ResourceId::new(resource_id_str).map_err(|e| corrupt("resource_id", e))?;
    let content_hash = content_hash_str
        .map(ContentHash::new)
        .transpose()
        .map_err(|e| corrupt("content_hash", e))?;

    Ok(FileRecord::new(url, resource_id, content_hash))
}

// ============================================================================
// IMetadataStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IMetadataStore for SqliteMetadataStore {
    async fn sync_root(&self) -> anyhow::Result<Option<ResourceId>> {
        let value = self.get_state(KEY_SYNC_ROOT).await?;
        Ok(value
            .map(ResourceId::new)
            .transpose()
            .map_err(|e| corrupt(KEY_SYNC_ROOT, e))?)
    }

    async fn set_sync_root(&self, resource_id: &ResourceId) -> anyhow::Result<()> {
        self.set_state(KEY_SYNC_ROOT, resource_id.as_str()).await?;
        tracing::debug!(sync_root = %resource_id, "Saved sync root");
        Ok(())
    }

    async fn get_origin(&self, origin: &Origin) -> anyhow::Result<Option<OriginRecord>> {
        let row = sqlx::query("SELECT * FROM origins WHERE origin = ?")
            .bind(origin.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(origin_record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_origins(&self) -> anyhow::Result<Vec<OriginRecord>> {
        let rows = sqlx::query("SELECT * FROM origins ORDER BY origin")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(origin_record_from_row(row)?);
        }
        Ok(records)
    }

    async fn save_origin(&self, record: &OriginRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO origins (origin, directory_id, sync_state) VALUES (?, ?, ?) \
             ON CONFLICT(origin) DO UPDATE SET \
             directory_id = excluded.directory_id, sync_state = excluded.sync_state",
        )
        .bind(record.origin().as_str())
        .bind(record.directory().as_str())
        .bind(record.state().name())
        .execute(&self.pool)
        .await?;

        tracing::trace!(origin = %record.origin(), state = %record.state(), "Saved origin");
        Ok(())
    }

    async fn remove_origin(&self, origin: &Origin) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let files = sqlx::query("DELETE FROM file_records WHERE origin = ?")
            .bind(origin.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM origins WHERE origin = ?")
            .bind(origin.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(origin = %origin, files, "Removed origin");
        Ok(())
    }

    async fn largest_changestamp(&self) -> anyhow::Result<Changestamp> {
        match self.get_state(KEY_LARGEST_CHANGESTAMP).await? {
            Some(value) => {
                let raw = value
                    .parse::<u64>()
                    .map_err(|e| corrupt(KEY_LARGEST_CHANGESTAMP, e))?;
                Ok(Changestamp::new(raw))
            }
            None => Ok(Changestamp::ZERO),
        }
    }

    async fn set_largest_changestamp(&self, changestamp: Changestamp) -> anyhow::Result<()> {
        self.set_state(KEY_LARGEST_CHANGESTAMP, &changestamp.value().to_string())
            .await?;
        tracing::trace!(changestamp = %changestamp, "Saved largest changestamp");
        Ok(())
    }

    async fn get_file(&self, url: &SyncUrl) -> anyhow::Result<Option<FileRecord>> {
        let row = sqlx::query("SELECT * FROM file_records WHERE origin = ? AND path = ?")
            .bind(url.origin().as_str())
            .bind(url.path())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(file_record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_file_by_resource_id(
        &self,
        resource_id: &ResourceId,
    ) -> anyhow::Result<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT * FROM file_records WHERE resource_id = ? ORDER BY origin, path LIMIT 1",
        )
        .bind(resource_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(file_record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_file(&self, record: &FileRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO file_records (origin, path, resource_id, content_hash) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(origin, path) DO UPDATE SET \
             resource_id = excluded.resource_id, content_hash = excluded.content_hash",
        )
        .bind(record.url.origin().as_str())
        .bind(record.url.path())
        .bind(record.resource_id.as_str())
        .bind(record.content_hash.as_ref().map(|h| h.as_str()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(url = %record.url, "Saved file record");
        Ok(())
    }

    async fn remove_file(&self, url: &SyncUrl) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM file_records WHERE origin = ? AND path = ?")
            .bind(url.origin().as_str())
            .bind(url.path())
            .execute(&self.pool)
            .await?;

        tracing::trace!(url = %url, "Removed file record");
        Ok(())
    }
}
