//! End-to-end flows against the SQLite metadata store

mod common;

use std::sync::Arc;

use originsync_cache::{DatabasePool, SqliteMetadataStore};
use originsync_core::config::SyncConfig;
use originsync_core::domain::{OriginSyncState, SyncAction, SyncStatus};
use originsync_core::ports::IMetadataStore;
use originsync_sync::SyncService;

use common::*;

struct SqliteHarness {
    remote: Arc<FakeRemoteApi>,
    store: Arc<SqliteMetadataStore>,
    processor: Arc<FakeChangeProcessor>,
    service: SyncService,
}

fn build(remote: Arc<FakeRemoteApi>, pool: &DatabasePool) -> SqliteHarness {
    let store = Arc::new(SqliteMetadataStore::new(pool.pool().clone()));
    let processor = FakeChangeProcessor::new();
    let service = SyncService::new(
        remote.clone(),
        store.clone(),
        processor.clone(),
        &SyncConfig::default(),
    );
    SqliteHarness {
        remote,
        store,
        processor,
        service,
    }
}

#[tokio::test]
async fn test_register_fetch_and_apply_with_sqlite() {
    let pool = DatabasePool::in_memory().await.unwrap();
    let h = build(FakeRemoteApi::new(), &pool);
    h.remote
        .add_listed_file("alpha", "a.txt", "file:a", "h1", b"first");
    let alpha = origin("alpha");

    h.service
        .register_origin_for_tracking_changes(&alpha)
        .await
        .unwrap();
    let outcome = h.service.process_remote_change().await.unwrap();
    assert_eq!(outcome.action, Some(SyncAction::Added));

    let stored = h.store.get_origin(&alpha).await.unwrap().unwrap();
    assert_eq!(stored.state(), OriginSyncState::Incremental);
    assert_eq!(stored.directory(), &dir_id("alpha"));
    let record = h
        .store
        .get_file(&url("alpha", "a.txt"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.content_hash, Some(hash("h1")));

    h.remote.set_content("file:a", b"second");
    h.remote
        .push_change(5, file_entry("a.txt", "file:a", "h2", &dir_id("alpha")));
    assert_eq!(h.service.fetch_remote_changes().await.unwrap(), 1);
    let outcome = h.service.process_remote_change().await.unwrap();

    assert_eq!(outcome.action, Some(SyncAction::Updated));
    assert_eq!(
        h.processor.local_file(&url("alpha", "a.txt")),
        Some(b"second".to_vec())
    );
    assert_eq!(h.store.largest_changestamp().await.unwrap(), cs(5));
}

#[tokio::test]
async fn test_unregister_clears_sqlite_rows() {
    let pool = DatabasePool::in_memory().await.unwrap();
    let h = build(FakeRemoteApi::new(), &pool);
    h.remote
        .add_listed_file("alpha", "a.txt", "file:a", "h1", b"a");
    let alpha = origin("alpha");
    h.service
        .register_origin_for_tracking_changes(&alpha)
        .await
        .unwrap();
    h.service.process_remote_change().await.unwrap();

    h.service
        .unregister_origin_for_tracking_changes(&alpha)
        .await
        .unwrap();

    assert!(h.store.get_origin(&alpha).await.unwrap().is_none());
    assert!(h
        .store
        .find_file_by_resource_id(&rid("file:a"))
        .await
        .unwrap()
        .is_none());
    assert!(!h.remote.has_directory("alpha"));
}

#[tokio::test]
async fn test_state_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("metadata.db");
    let remote = FakeRemoteApi::new();
    remote.add_listed_file("alpha", "a.txt", "file:a", "h1", b"a");
    remote.set_largest_changestamp(10);

    {
        let pool = DatabasePool::new(&db_path).await.unwrap();
        let h = build(remote.clone(), &pool);
        h.service
            .register_origin_for_tracking_changes(&origin("alpha"))
            .await
            .unwrap();
        assert_eq!(
            h.service.process_remote_change().await.unwrap().status,
            SyncStatus::Ok
        );
    }

    let pool = DatabasePool::new(&db_path).await.unwrap();
    let h = build(remote, &pool);
    assert_eq!(h.service.initialize().await.unwrap(), 1);

    assert_eq!(
        h.service.origin_state(&origin("alpha")),
        Some(OriginSyncState::Incremental)
    );
    assert_eq!(h.service.largest_changestamp().await.unwrap(), cs(10));

    // Changes at or below the stored changestamp are not fetched again
    h.service.fetch_remote_changes().await.unwrap();
    assert_eq!(h.remote.call_args("get_changes_since"), vec!["11"]);
    assert!(!h.service.has_changes());
}
