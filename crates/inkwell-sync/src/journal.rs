//! Journal facade
//!
//! The single entry point a front end talks to: drafts, the commit
//! protocol, queries, deletion and sync, over one device's store.

use std::sync::Arc;

use tracing::info;

use inkwell_core::{
    Clock, DiaryId, Draft, EntryFields, SaveOutcome, SealInfo, StreamId, SystemClock, Version,
    VersionId,
};
use inkwell_storage::{CommitSummary, EntryStore};

use crate::config::JournalConfig;
use crate::error::SyncResult;
use crate::lock::SyncLock;
use crate::object_store::ObjectStore;
use crate::replicator::{StreamReplicator, SyncReport};

/// A diary journal on one device
pub struct Journal {
    store: Arc<EntryStore>,
    replicator: StreamReplicator,
    config: JournalConfig,
}

impl Journal {
    /// Open the journal using the system clock and a fresh sync lock
    pub fn open(config: JournalConfig, object_store: Arc<dyn ObjectStore>) -> SyncResult<Self> {
        Self::open_with(config, object_store, Arc::new(SystemClock), Arc::new(SyncLock::new()))
    }

    /// Open the journal with an explicit clock and sync lock
    pub fn open_with(
        config: JournalConfig,
        object_store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        lock: Arc<SyncLock>,
    ) -> SyncResult<Self> {
        let store = Arc::new(EntryStore::open_with_clock(config.store_config(), clock)?);
        let replicator = StreamReplicator::new(
            store.clone(),
            object_store,
            lock,
            config.replicator_config(),
        );

        info!(
            data_dir = %config.data_dir.display(),
            stream = %store.stream_id(),
            "Journal opened"
        );
        Ok(Self {
            store,
            replicator,
            config,
        })
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// The underlying entry store
    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }

    pub fn replicator(&self) -> &StreamReplicator {
        &self.replicator
    }

    pub fn sync_lock(&self) -> &Arc<SyncLock> {
        self.replicator.lock()
    }

    /// Save the working copy of an entry; `None` starts a new entry
    pub fn save_draft(
        &self,
        diary_id: Option<DiaryId>,
        fields: EntryFields,
    ) -> SyncResult<SaveOutcome> {
        Ok(self.store.save_draft(diary_id, fields)?)
    }

    pub fn get_draft(&self, diary_id: &DiaryId) -> SyncResult<Option<Draft>> {
        Ok(self.store.get_draft(diary_id)?)
    }

    pub fn list_drafts(&self) -> SyncResult<Vec<Draft>> {
        Ok(self.store.list_drafts()?)
    }

    /// Freeze a draft ahead of commit
    pub fn seal_draft(&self, diary_id: &DiaryId) -> SyncResult<Option<SealInfo>> {
        Ok(self.store.seal_draft(diary_id)?)
    }

    /// Commit a sealed draft; false if there was nothing sealed to commit
    pub fn commit_sealed_draft(&self, diary_id: &DiaryId) -> SyncResult<bool> {
        Ok(self.store.commit(diary_id)?.is_committed())
    }

    pub fn get_sealed_drafts(&self) -> SyncResult<Vec<Draft>> {
        Ok(self.store.sealed_drafts()?)
    }

    pub fn commit_all_sealed_drafts(&self) -> SyncResult<CommitSummary> {
        Ok(self.store.commit_all_sealed()?)
    }

    /// Current version of a live entry
    pub fn get_diary(&self, diary_id: &DiaryId) -> SyncResult<Option<Version>> {
        Ok(self.store.query().get_diary(diary_id)?)
    }

    /// Every live entry, newest date first
    pub fn get_diaries(&self) -> SyncResult<Vec<Version>> {
        Ok(self.store.query().get_diaries()?)
    }

    /// Archive an entry, committing a sealed draft first
    pub fn delete_diary(&self, diary_id: &DiaryId) -> SyncResult<bool> {
        Ok(self.store.delete(diary_id)?)
    }

    /// Every version of an entry, oldest first
    pub fn history(&self, diary_id: &DiaryId) -> SyncResult<Vec<Version>> {
        Ok(self.store.query().history(diary_id)?)
    }

    pub fn get_version(&self, version_id: &VersionId) -> SyncResult<Option<Version>> {
        Ok(self.store.query().get_version(version_id)?)
    }

    /// Commit, upload, and merge peer streams
    ///
    /// `Ok(None)` means another sync was already running.
    pub async fn sync_with_cloud(&self) -> SyncResult<Option<SyncReport>> {
        self.replicator.sync_with_cloud().await
    }

    pub fn stream_id(&self) -> StreamId {
        self.store.stream_id()
    }

    /// Become a new device identity, carrying the current stream's versions
    pub fn reset_stream_id(&self) -> SyncResult<StreamId> {
        Ok(self.store.reset_stream_id()?)
    }

    /// Rebuild every head from the merged log
    pub fn recompute_all_heads(&self) -> SyncResult<usize> {
        Ok(self.store.recompute_all_heads()?)
    }
}
