//! Hand-written fakes of every port used by the sync core
//!
//! Each fake records its calls behind a `std::sync::Mutex` and can be
//! scripted to fail, so tests assert on call counts and arguments
//! directly.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Notify};

use originsync_core::config::SyncConfig;
use originsync_core::domain::{
    Changestamp, ContentHash, FileRecord, FileType, Origin, OriginRecord, RemoteServiceState,
    ResourceId, SyncAction, SyncDirection, SyncFileStatus, SyncUrl,
};
use originsync_core::ports::{
    ChangeList, DownloadedFile, IFileStatusObserver, IMetadataStore, IRemoteApiClient,
    IRemoteChangeProcessor, IRemoteServiceObserver, PrepareResult, PrepareStatus,
    RemoteApiError, RemoteChange, RemoteDirectory, RemoteEntry, RemoteFileChange,
};
use originsync_sync::SyncService;

// ============================================================================
// Value helpers
// ============================================================================

pub fn origin(host: &str) -> Origin {
    Origin::new(format!("ext://{host}")).unwrap()
}

pub fn url(host: &str, path: &str) -> SyncUrl {
    SyncUrl::new(origin(host), path).unwrap()
}

pub fn rid(id: &str) -> ResourceId {
    ResourceId::new(id.to_string()).unwrap()
}

pub fn hash(h: &str) -> ContentHash {
    ContentHash::new(h.to_string()).unwrap()
}

pub fn cs(value: u64) -> Changestamp {
    Changestamp::new(value)
}

/// Remote directory id the fake assigns to an origin's directory
pub fn dir_id(host: &str) -> ResourceId {
    rid(&format!("folder:{host}"))
}

pub fn file_entry(title: &str, id: &str, h: &str, parent: &ResourceId) -> RemoteEntry {
    RemoteEntry {
        resource_id: rid(id),
        title: title.to_string(),
        kind: FileType::File,
        is_deleted: false,
        content_hash: Some(hash(h)),
        parent_ids: vec![parent.clone()],
    }
}

pub fn folder_entry(title: &str, id: &str, parent: &ResourceId) -> RemoteEntry {
    RemoteEntry {
        resource_id: rid(id),
        title: title.to_string(),
        kind: FileType::Folder,
        is_deleted: false,
        content_hash: None,
        parent_ids: vec![parent.clone()],
    }
}

pub fn deleted_entry(title: &str, id: &str, parents: Vec<ResourceId>) -> RemoteEntry {
    RemoteEntry {
        resource_id: rid(id),
        title: title.to_string(),
        kind: FileType::File,
        is_deleted: true,
        content_hash: None,
        parent_ids: parents,
    }
}

pub fn set(origins: &[&Origin]) -> HashSet<Origin> {
    origins.iter().map(|o| (*o).clone()).collect()
}

// ============================================================================
// FakeRemoteApi
// ============================================================================

pub const SYNC_ROOT_ID: &str = "folder:sync-root";

#[derive(Default)]
struct RemoteState {
    sync_root: Option<ResourceId>,
    directories: HashSet<ResourceId>,
    listings: HashMap<ResourceId, Vec<RemoteEntry>>,
    changes: Vec<RemoteChange>,
    largest_changestamp: Changestamp,
    contents: HashMap<ResourceId, Vec<u8>>,
    failures: HashMap<&'static str, RemoteApiError>,
    calls: Vec<(&'static str, String)>,
}

/// Holds one remote call open until the test releases it
#[derive(Default)]
pub struct Gate {
    held: Mutex<Option<oneshot::Receiver<()>>>,
    /// Signalled when a held call starts waiting
    pub started: Notify,
}

impl Gate {
    /// Blocks the next call through this gate until the returned sender fires
    pub fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held.lock().unwrap() = Some(rx);
        tx
    }

    async fn pass(&self) {
        let held = self.held.lock().unwrap().take();
        if let Some(release) = held {
            self.started.notify_one();
            let _ = release.await;
        }
    }
}

/// In-memory remote store with one-shot scripted failures
#[derive(Default)]
pub struct FakeRemoteApi {
    state: Mutex<RemoteState>,
    /// Gates `find_or_create_directory`
    pub directory_lookup: Gate,
    /// Gates `list_directory`
    pub listing: Gate,
    /// Gates `download_file`
    pub download: Gate,
}

impl FakeRemoteApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, method: &'static str, arg: impl ToString) -> Option<RemoteApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((method, arg.to_string()));
        state.failures.remove(method)
    }

    /// Makes the next call of `method` fail with `err`
    pub fn fail_next(&self, method: &'static str, err: RemoteApiError) {
        self.state.lock().unwrap().failures.insert(method, err);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| *m == method)
            .count()
    }

    pub fn call_args(&self, method: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, a)| a.clone())
            .collect()
    }

    /// Puts a file into an origin's remote directory listing
    pub fn add_listed_file(&self, host: &str, title: &str, id: &str, h: &str, content: &[u8]) {
        let dir = dir_id(host);
        let mut state = self.state.lock().unwrap();
        state
            .listings
            .entry(dir.clone())
            .or_default()
            .push(file_entry(title, id, h, &dir));
        state.contents.insert(rid(id), content.to_vec());
    }

    pub fn add_listed_entry(&self, host: &str, entry: RemoteEntry) {
        self.state
            .lock()
            .unwrap()
            .listings
            .entry(dir_id(host))
            .or_default()
            .push(entry);
    }

    pub fn set_content(&self, id: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .contents
            .insert(rid(id), content.to_vec());
    }

    /// Appends a changelist entry and raises the account's largest changestamp
    pub fn push_change(&self, changestamp: u64, entry: RemoteEntry) {
        let mut state = self.state.lock().unwrap();
        state.largest_changestamp = state.largest_changestamp.max(cs(changestamp));
        state.changes.push(RemoteChange {
            changestamp: cs(changestamp),
            entry,
        });
    }

    pub fn set_largest_changestamp(&self, value: u64) {
        self.state.lock().unwrap().largest_changestamp = cs(value);
    }

    pub fn has_directory(&self, host: &str) -> bool {
        self.state.lock().unwrap().directories.contains(&dir_id(host))
    }
}

#[async_trait::async_trait]
impl IRemoteApiClient for FakeRemoteApi {
    async fn get_or_create_sync_root(&self, title: &str) -> Result<ResourceId, RemoteApiError> {
        if let Some(err) = self.record("get_or_create_sync_root", title) {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        let root = state
            .sync_root
            .get_or_insert_with(|| rid(SYNC_ROOT_ID))
            .clone();
        Ok(root)
    }

    async fn find_or_create_directory(
        &self,
        title: &str,
        parent: &ResourceId,
    ) -> Result<RemoteDirectory, RemoteApiError> {
        let failure = self.record("find_or_create_directory", format!("{parent}/{title}"));
        self.directory_lookup.pass().await;
        if let Some(err) = failure {
            return Err(err);
        }

        let mut state = self.state.lock().unwrap();
        if state.sync_root.as_ref() != Some(parent) {
            return Err(RemoteApiError::NotFound(parent.to_string()));
        }
        let dir = dir_id(title);
        let created = state.directories.insert(dir.clone());
        Ok(RemoteDirectory {
            resource_id: dir,
            created,
        })
    }

    async fn get_largest_changestamp(&self) -> Result<Changestamp, RemoteApiError> {
        if let Some(err) = self.record("get_largest_changestamp", "") {
            return Err(err);
        }
        Ok(self.state.lock().unwrap().largest_changestamp)
    }

    async fn list_directory(
        &self,
        directory: &ResourceId,
    ) -> Result<Vec<RemoteEntry>, RemoteApiError> {
        let failure = self.record("list_directory", directory);
        self.listing.pass().await;
        if let Some(err) = failure {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        Ok(state.listings.get(directory).cloned().unwrap_or_default())
    }

    async fn get_changes_since(&self, start: Changestamp) -> Result<ChangeList, RemoteApiError> {
        if let Some(err) = self.record("get_changes_since", start) {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        Ok(ChangeList {
            changes: state
                .changes
                .iter()
                .filter(|c| c.changestamp >= start)
                .cloned()
                .collect(),
            largest_changestamp: state.largest_changestamp,
        })
    }

    async fn download_file(
        &self,
        resource_id: &ResourceId,
    ) -> Result<DownloadedFile, RemoteApiError> {
        let failure = self.record("download_file", resource_id);
        self.download.pass().await;
        if let Some(err) = failure {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        let content = state
            .contents
            .get(resource_id)
            .cloned()
            .ok_or_else(|| RemoteApiError::NotFound(resource_id.to_string()))?;
        Ok(DownloadedFile {
            content,
            content_hash: None,
        })
    }

    async fn delete_directory(&self, resource_id: &ResourceId) -> Result<(), RemoteApiError> {
        if let Some(err) = self.record("delete_directory", resource_id) {
            return Err(err);
        }
        self.state.lock().unwrap().directories.remove(resource_id);
        Ok(())
    }
}

// ============================================================================
// InMemoryMetadataStore
// ============================================================================

#[derive(Default)]
struct StoreState {
    sync_root: Option<ResourceId>,
    origins: BTreeMap<Origin, OriginRecord>,
    largest_changestamp: Changestamp,
    files: BTreeMap<SyncUrl, FileRecord>,
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<StoreState>,
    fail_origin_saves: Mutex<bool>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn origin(&self, origin: &Origin) -> Option<OriginRecord> {
        self.state.lock().unwrap().origins.get(origin).cloned()
    }

    pub fn origin_count(&self) -> usize {
        self.state.lock().unwrap().origins.len()
    }

    pub fn file(&self, url: &SyncUrl) -> Option<FileRecord> {
        self.state.lock().unwrap().files.get(url).cloned()
    }

    pub fn stored_sync_root(&self) -> Option<ResourceId> {
        self.state.lock().unwrap().sync_root.clone()
    }

    pub fn stored_largest_changestamp(&self) -> Changestamp {
        self.state.lock().unwrap().largest_changestamp
    }

    pub fn seed_sync_root(&self, id: &str) {
        self.state.lock().unwrap().sync_root = Some(rid(id));
    }

    pub fn seed_origin(&self, record: OriginRecord) {
        self.state
            .lock()
            .unwrap()
            .origins
            .insert(record.origin().clone(), record);
    }

    pub fn seed_file(&self, record: FileRecord) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(record.url.clone(), record);
    }

    pub fn fail_origin_saves(&self, fail: bool) {
        *self.fail_origin_saves.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl IMetadataStore for InMemoryMetadataStore {
    async fn sync_root(&self) -> anyhow::Result<Option<ResourceId>> {
        Ok(self.state.lock().unwrap().sync_root.clone())
    }

    async fn set_sync_root(&self, resource_id: &ResourceId) -> anyhow::Result<()> {
        self.state.lock().unwrap().sync_root = Some(resource_id.clone());
        Ok(())
    }

    async fn get_origin(&self, origin: &Origin) -> anyhow::Result<Option<OriginRecord>> {
        Ok(self.origin(origin))
    }

    async fn list_origins(&self) -> anyhow::Result<Vec<OriginRecord>> {
        Ok(self.state.lock().unwrap().origins.values().cloned().collect())
    }

    async fn save_origin(&self, record: &OriginRecord) -> anyhow::Result<()> {
        if *self.fail_origin_saves.lock().unwrap() {
            anyhow::bail!("disk full");
        }
        self.seed_origin(record.clone());
        Ok(())
    }

    async fn remove_origin(&self, origin: &Origin) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.origins.remove(origin);
        state.files.retain(|url, _| url.origin() != origin);
        Ok(())
    }

    async fn largest_changestamp(&self) -> anyhow::Result<Changestamp> {
        Ok(self.state.lock().unwrap().largest_changestamp)
    }

    async fn set_largest_changestamp(&self, changestamp: Changestamp) -> anyhow::Result<()> {
        self.state.lock().unwrap().largest_changestamp = changestamp;
        Ok(())
    }

    async fn get_file(&self, url: &SyncUrl) -> anyhow::Result<Option<FileRecord>> {
        Ok(self.file(url))
    }

    async fn find_file_by_resource_id(
        &self,
        resource_id: &ResourceId,
    ) -> anyhow::Result<Option<FileRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .values()
            .find(|r| &r.resource_id == resource_id)
            .cloned())
    }

    async fn save_file(&self, record: &FileRecord) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.origins.contains_key(record.url.origin()) {
            anyhow::bail!("origin {} is not registered", record.url.origin());
        }
        state.files.insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn remove_file(&self, url: &SyncUrl) -> anyhow::Result<()> {
        self.state.lock().unwrap().files.remove(url);
        Ok(())
    }
}

// ============================================================================
// FakeChangeProcessor
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorCall {
    Prepare(SyncUrl),
    ClearLocalChanges(SyncUrl),
    Apply { url: SyncUrl, delete: bool },
}

/// Local file store kept in a map; busy urls report `FileBusy`
#[derive(Default)]
pub struct FakeChangeProcessor {
    files: Mutex<HashMap<SyncUrl, Vec<u8>>>,
    busy: Mutex<HashSet<SyncUrl>>,
    calls: Mutex<Vec<ProcessorCall>>,
    fail_apply: Mutex<bool>,
}

impl FakeChangeProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_local_file(&self, url: &SyncUrl, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(url.clone(), content.to_vec());
    }

    pub fn local_file(&self, url: &SyncUrl) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(url).cloned()
    }

    pub fn set_busy(&self, url: &SyncUrl) {
        self.busy.lock().unwrap().insert(url.clone());
    }

    pub fn fail_apply(&self, fail: bool) {
        *self.fail_apply.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_count(&self, url: &SyncUrl) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProcessorCall::ClearLocalChanges(u) if u == url))
            .count()
    }

    pub fn apply_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProcessorCall::Apply { .. }))
            .count()
    }
}

#[async_trait::async_trait]
impl IRemoteChangeProcessor for FakeChangeProcessor {
    async fn prepare_for_process_remote_change(
        &self,
        url: &SyncUrl,
    ) -> anyhow::Result<PrepareResult> {
        self.calls
            .lock()
            .unwrap()
            .push(ProcessorCall::Prepare(url.clone()));

        let status = if self.busy.lock().unwrap().contains(url) {
            PrepareStatus::FileBusy
        } else if self.files.lock().unwrap().contains_key(url) {
            PrepareStatus::NotModified
        } else {
            PrepareStatus::NotFound
        };
        Ok(PrepareResult::new(status))
    }

    async fn apply_remote_change(
        &self,
        change: RemoteFileChange,
        url: &SyncUrl,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(ProcessorCall::Apply {
            url: url.clone(),
            delete: change.is_delete(),
        });
        if *self.fail_apply.lock().unwrap() {
            anyhow::bail!("local store is read-only");
        }

        let mut files = self.files.lock().unwrap();
        match change {
            RemoteFileChange::AddOrUpdate { content } => {
                files.insert(url.clone(), content);
            }
            RemoteFileChange::Delete => {
                files.remove(url);
            }
        }
        Ok(())
    }

    async fn clear_local_changes(&self, url: &SyncUrl) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ProcessorCall::ClearLocalChanges(url.clone()));
        Ok(())
    }
}

// ============================================================================
// RecordingObserver
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatusEvent {
    pub url: SyncUrl,
    pub status: SyncFileStatus,
    pub action: SyncAction,
    pub direction: SyncDirection,
}

#[derive(Default)]
pub struct RecordingObserver {
    pub queue_sizes: Mutex<Vec<usize>>,
    pub states: Mutex<Vec<RemoteServiceState>>,
    pub file_events: Mutex<Vec<FileStatusEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_queue_size(&self) -> Option<usize> {
        self.queue_sizes.lock().unwrap().last().copied()
    }

    pub fn states(&self) -> Vec<RemoteServiceState> {
        self.states.lock().unwrap().clone()
    }

    pub fn file_events(&self) -> Vec<FileStatusEvent> {
        self.file_events.lock().unwrap().clone()
    }
}

impl IRemoteServiceObserver for RecordingObserver {
    fn on_remote_change_queue_updated(&self, pending_changes: usize) {
        self.queue_sizes.lock().unwrap().push(pending_changes);
    }

    fn on_remote_service_state_updated(&self, state: RemoteServiceState, _description: &str) {
        self.states.lock().unwrap().push(state);
    }
}

impl IFileStatusObserver for RecordingObserver {
    fn on_file_status_changed(
        &self,
        url: &SyncUrl,
        sync_status: SyncFileStatus,
        action: SyncAction,
        direction: SyncDirection,
    ) {
        self.file_events.lock().unwrap().push(FileStatusEvent {
            url: url.clone(),
            status: sync_status,
            action,
            direction,
        });
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub remote: Arc<FakeRemoteApi>,
    pub store: Arc<InMemoryMetadataStore>,
    pub processor: Arc<FakeChangeProcessor>,
    pub observer: Arc<RecordingObserver>,
    pub service: Arc<SyncService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_sync_disabled() -> Self {
        Self::with_config(SyncConfig {
            enabled: false,
            ..SyncConfig::default()
        })
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let remote = FakeRemoteApi::new();
        let store = InMemoryMetadataStore::new();
        Self::with_parts(remote, store, config)
    }

    /// Builds a service over existing fakes (e.g. to simulate a restart)
    pub fn with_parts(
        remote: Arc<FakeRemoteApi>,
        store: Arc<InMemoryMetadataStore>,
        config: SyncConfig,
    ) -> Self {
        let processor = FakeChangeProcessor::new();
        let observer = RecordingObserver::new();
        let service = Arc::new(SyncService::new(
            remote.clone(),
            store.clone(),
            processor.clone(),
            &config,
        ));
        service.add_service_observer(observer.clone());
        service.add_file_status_observer(observer.clone());
        Self {
            remote,
            store,
            processor,
            observer,
            service,
        }
    }

    /// Registers `host` and asserts success
    pub async fn register(&self, host: &str) {
        self.service
            .register_origin_for_tracking_changes(&origin(host))
            .await
            .expect("registration succeeds");
    }
}
