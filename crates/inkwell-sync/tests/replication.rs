//! Multi-device replication tests over a shared directory

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::sync::Notify;

use inkwell_core::{DiaryId, EntryFields, ManualClock};
use inkwell_sync::{
    DirectoryObjectStore, Journal, JournalConfig, ObjectStore, RemoteObject, SyncError, SyncLock,
    SyncResult, stream_file_name,
};

struct Device {
    journal: Journal,
    clock: Arc<ManualClock>,
    _dir: TempDir,
}

impl Device {
    fn open(object_store: Arc<dyn ObjectStore>, start_millis: i64) -> Self {
        inkwell_logging::init_testing();
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start_millis));
        let journal = Journal::open_with(
            JournalConfig::with_data_dir(dir.path()),
            object_store,
            clock.clone(),
            Arc::new(SyncLock::new()),
        )
        .unwrap();
        Self {
            journal,
            clock,
            _dir: dir,
        }
    }

    /// Save, seal and commit an entry
    fn write(&self, diary_id: Option<DiaryId>, content: &str) -> DiaryId {
        let saved = self
            .journal
            .save_draft(diary_id, fields(content))
            .unwrap()
            .saved()
            .unwrap();
        self.journal.seal_draft(&saved.diary_id).unwrap().unwrap();
        assert!(self.journal.commit_sealed_draft(&saved.diary_id).unwrap());
        saved.diary_id
    }

    fn content(&self, diary_id: &DiaryId) -> Option<String> {
        self.journal
            .get_diary(diary_id)
            .unwrap()
            .map(|version| version.fields.content)
    }
}

fn fields(content: &str) -> EntryFields {
    EntryFields::new(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()).with_content(content)
}

async fn shared_folder() -> (Arc<DirectoryObjectStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = DirectoryObjectStore::new(dir.path()).await.unwrap();
    (Arc::new(store), dir)
}

/// Object store that can be told to fail
struct FlakyStore {
    inner: DirectoryObjectStore,
    fail_list: AtomicBool,
    fail_upload: AtomicBool,
    fail_downloads: Mutex<HashSet<String>>,
}

impl FlakyStore {
    fn new(inner: DirectoryObjectStore) -> Self {
        Self {
            inner,
            fail_list: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            fail_downloads: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn list(&self) -> SyncResult<Vec<RemoteObject>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(SyncError::ObjectStore("listing timed out".to_string()));
        }
        self.inner.list().await
    }

    async fn upload(&self, local_path: &Path, name: &str) -> SyncResult<String> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(SyncError::ObjectStore("quota exceeded".to_string()));
        }
        self.inner.upload(local_path, name).await
    }

    async fn download(&self, id: &str, dest_path: &Path) -> SyncResult<()> {
        if self.fail_downloads.lock().unwrap().contains(id) {
            return Err(SyncError::ObjectStore(format!("{} unreachable", id)));
        }
        self.inner.download(id, dest_path).await
    }
}

/// Object store whose uploads wait for a signal
struct GatedStore {
    inner: DirectoryObjectStore,
    gate: Notify,
}

#[async_trait]
impl ObjectStore for GatedStore {
    async fn list(&self) -> SyncResult<Vec<RemoteObject>> {
        self.inner.list().await
    }

    async fn upload(&self, local_path: &Path, name: &str) -> SyncResult<String> {
        self.gate.notified().await;
        self.inner.upload(local_path, name).await
    }

    async fn download(&self, id: &str, dest_path: &Path) -> SyncResult<()> {
        self.inner.download(id, dest_path).await
    }
}

#[tokio::test]
async fn entry_committed_on_one_device_appears_on_another() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 2_000);

    let diary = a.write(None, "written on A");
    let report_a = a.journal.sync_with_cloud().await.unwrap().unwrap();
    assert!(report_a.uploaded);
    assert_eq!(report_a.versions_uploaded, 1);
    assert_eq!(report_a.peers_seen, 0);

    let report_b = b.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report_b.peers_seen, 1);
    assert_eq!(report_b.peers_imported, 1);
    assert_eq!(report_b.versions_imported, 1);
    assert_eq!(report_b.heads_changed, 1);
    assert_eq!(b.content(&diary).as_deref(), Some("written on A"));

    // Imported versions stay out of B's own stream
    assert_eq!(b.journal.store().stream_version_count(&diary).unwrap(), 0);
}

#[tokio::test]
async fn importing_the_same_stream_twice_adds_nothing() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 1_000);

    let diary = a.write(None, "once");
    a.journal.sync_with_cloud().await.unwrap();

    b.journal.sync_with_cloud().await.unwrap();
    let again = b.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(again.peers_imported, 1);
    assert_eq!(again.versions_imported, 0);
    assert_eq!(again.heads_changed, 0);
    assert_eq!(b.journal.history(&diary).unwrap().len(), 1);
}

#[tokio::test]
async fn sync_commits_sealed_drafts_first() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 1_000);

    let saved = a.journal.save_draft(None, fields("sealed only")).unwrap().saved().unwrap();
    a.journal.seal_draft(&saved.diary_id).unwrap();

    let report = a.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report.drafts_committed, 1);
    assert!(a.journal.get_draft(&saved.diary_id).unwrap().is_none());

    // A second commit of the same draft has nothing to do
    assert!(!a.journal.commit_sealed_draft(&saved.diary_id).unwrap());

    b.journal.sync_with_cloud().await.unwrap();
    assert_eq!(b.content(&saved.diary_id).as_deref(), Some("sealed only"));
}

#[tokio::test]
async fn latest_edit_wins_across_devices() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 1_000);

    let diary = a.write(None, "draft one");
    a.journal.sync_with_cloud().await.unwrap();
    b.journal.sync_with_cloud().await.unwrap();

    // Concurrent edits; B's seal is later
    a.clock.set(5_000);
    b.clock.set(6_000);
    a.write(Some(diary), "A's edit");
    b.write(Some(diary), "B's edit");

    a.journal.sync_with_cloud().await.unwrap();
    b.journal.sync_with_cloud().await.unwrap();
    a.journal.sync_with_cloud().await.unwrap();

    assert_eq!(a.content(&diary).as_deref(), Some("B's edit"));
    assert_eq!(b.content(&diary).as_deref(), Some("B's edit"));
    assert_eq!(a.journal.history(&diary).unwrap().len(), 3);
    assert_eq!(b.journal.history(&diary).unwrap().len(), 3);
}

#[tokio::test]
async fn deletion_propagates_and_is_not_undone_by_stale_edits() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 1_000);

    let diary = a.write(None, "short lived");
    a.journal.sync_with_cloud().await.unwrap();
    b.journal.sync_with_cloud().await.unwrap();

    // B edits while offline, A deletes later
    b.clock.set(2_000);
    b.write(Some(diary), "offline edit");
    a.clock.set(3_000);
    assert!(a.journal.delete_diary(&diary).unwrap());

    a.journal.sync_with_cloud().await.unwrap();
    b.journal.sync_with_cloud().await.unwrap();
    a.journal.sync_with_cloud().await.unwrap();

    assert!(a.content(&diary).is_none());
    assert!(b.content(&diary).is_none());
    assert!(b.journal.get_diaries().unwrap().is_empty());
    assert!(a.journal.history(&diary).unwrap().iter().any(|v| v.is_archived()));
}

#[tokio::test]
async fn corrupt_peer_stream_is_skipped() {
    let (shared, shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 1_000);

    let diary = a.write(None, "good data");
    a.journal.sync_with_cloud().await.unwrap();

    let bogus = stream_file_name(&inkwell_core::StreamId::generate());
    std::fs::write(shared_dir.path().join(&bogus), b"not a database").unwrap();
    std::fs::write(shared_dir.path().join("notes.txt"), b"ignored").unwrap();

    let report = b.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report.peers_seen, 2);
    assert_eq!(report.peers_imported, 1);
    assert_eq!(report.peers_failed, 1);
    assert_eq!(b.content(&diary).as_deref(), Some("good data"));

    // Nothing left behind in the import area
    let leftovers = std::fs::read_dir(b.journal.config().imports_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn unreachable_peer_does_not_block_others() {
    let (inner_dir, _shared_dir) = {
        let dir = TempDir::new().unwrap();
        (DirectoryObjectStore::new(dir.path()).await.unwrap(), dir)
    };
    let flaky = Arc::new(FlakyStore::new(inner_dir));
    let a = Device::open(flaky.clone(), 1_000);
    let b = Device::open(flaky.clone(), 1_000);
    let c = Device::open(flaky.clone(), 1_000);

    let from_a = a.write(None, "from A");
    let from_b = b.write(None, "from B");
    a.journal.sync_with_cloud().await.unwrap();
    b.journal.sync_with_cloud().await.unwrap();

    flaky
        .fail_downloads
        .lock()
        .unwrap()
        .insert(stream_file_name(&a.journal.stream_id()));

    let report = c.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report.peers_seen, 2);
    assert_eq!(report.peers_failed, 1);
    assert!(c.content(&from_a).is_none());
    assert_eq!(c.content(&from_b).as_deref(), Some("from B"));
}

#[tokio::test]
async fn listing_failure_means_no_peers() {
    let dir = TempDir::new().unwrap();
    let flaky = Arc::new(FlakyStore::new(
        DirectoryObjectStore::new(dir.path()).await.unwrap(),
    ));
    let a = Device::open(flaky.clone(), 1_000);
    a.write(None, "local");

    flaky.fail_list.store(true, Ordering::SeqCst);
    let report = a.journal.sync_with_cloud().await.unwrap().unwrap();
    assert!(report.uploaded);
    assert_eq!(report.peers_seen, 0);
}

#[tokio::test]
async fn upload_failure_is_fatal_and_keeps_local_data() {
    let dir = TempDir::new().unwrap();
    let flaky = Arc::new(FlakyStore::new(
        DirectoryObjectStore::new(dir.path()).await.unwrap(),
    ));
    let a = Device::open(flaky.clone(), 1_000);

    let saved = a.journal.save_draft(None, fields("pending")).unwrap().saved().unwrap();
    a.journal.seal_draft(&saved.diary_id).unwrap();
    flaky.fail_upload.store(true, Ordering::SeqCst);

    let err = a.journal.sync_with_cloud().await.unwrap_err();
    assert!(matches!(err, SyncError::UploadFailed { .. }));
    assert!(!a.journal.sync_lock().is_held());

    // The draft was committed before the upload was attempted
    assert_eq!(a.content(&saved.diary_id).as_deref(), Some("pending"));

    flaky.fail_upload.store(false, Ordering::SeqCst);
    assert!(a.journal.sync_with_cloud().await.unwrap().is_some());
}

#[tokio::test]
async fn concurrent_syncs_run_once() {
    let dir = TempDir::new().unwrap();
    let gated = Arc::new(GatedStore {
        inner: DirectoryObjectStore::new(dir.path()).await.unwrap(),
        gate: Notify::new(),
    });
    let a = Device::open(gated.clone(), 1_000);
    a.write(None, "entry");

    let first = a.journal.sync_with_cloud();
    let second = async {
        tokio::task::yield_now().await;
        let skipped = a.journal.sync_with_cloud().await;
        gated.gate.notify_one();
        skipped
    };

    let (first, second) = tokio::join!(first, second);
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_none());
    assert!(!a.journal.sync_lock().is_held());
}

#[tokio::test]
async fn reset_stream_id_reimports_old_stream_as_peer() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);

    let diary = a.write(None, "before reset");
    a.journal.sync_with_cloud().await.unwrap();
    let old = a.journal.stream_id();

    let new = a.journal.reset_stream_id().unwrap();
    assert_ne!(old, new);

    let report = a.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report.peers_seen, 1);
    assert_eq!(report.versions_imported, 0);
    assert_eq!(report.versions_uploaded, 1);
    assert_eq!(a.content(&diary).as_deref(), Some("before reset"));
}

#[tokio::test]
async fn reset_before_first_sync_still_publishes_versions() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 5_000);

    let diary = a.write(None, "never uploaded");
    let old = a.journal.stream_id();
    let new = a.journal.reset_stream_id().unwrap();

    let report_a = a.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report_a.versions_uploaded, 1);

    let names: Vec<String> = shared.list().await.unwrap().into_iter().map(|o| o.name).collect();
    assert_eq!(names, vec![stream_file_name(&new)]);
    assert!(!names.contains(&stream_file_name(&old)));

    let report_b = b.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report_b.versions_imported, 1);
    assert_eq!(b.content(&diary).as_deref(), Some("never uploaded"));
}

#[tokio::test]
async fn peer_stream_with_other_extension_is_imported() {
    let (shared, shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 5_000);

    let diary = a.write(None, "renamed upload");
    a.journal.sync_with_cloud().await.unwrap();

    let name = stream_file_name(&a.journal.stream_id());
    let renamed = name.replace(".sqlite3", ".redb");
    std::fs::rename(shared_dir.path().join(&name), shared_dir.path().join(&renamed)).unwrap();

    let report = b.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report.peers_seen, 1);
    assert_eq!(report.peers_imported, 1);
    assert_eq!(b.content(&diary).as_deref(), Some("renamed upload"));
}

#[tokio::test]
async fn missing_imports_dir_is_recreated() {
    let (shared, _shared_dir) = shared_folder().await;
    let a = Device::open(shared.clone(), 1_000);
    let b = Device::open(shared.clone(), 5_000);

    a.write(None, "first");
    b.journal.sync_with_cloud().await.unwrap();
    let imports = b._dir.path().join("imports");
    if imports.exists() {
        std::fs::remove_dir_all(&imports).unwrap();
    }

    a.clock.advance(100);
    let diary = a.write(None, "second");
    a.journal.sync_with_cloud().await.unwrap();

    let report = b.journal.sync_with_cloud().await.unwrap().unwrap();
    assert_eq!(report.peers_imported, 1);
    assert!(imports.is_dir());
    assert_eq!(b.content(&diary).as_deref(), Some("second"));
}
