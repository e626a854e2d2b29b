//! Entry store combining drafts, both version logs and the head index
//!
//! ## Storage Flow
//!
//! ```text
//! save_draft()   → drafts table (local.redb)
//! seal_draft()   → drafts table, pending version id assigned
//! commit()
//!   ├─ 1. append version to the stream log (streams/<id>.redb)
//!   └─ 2-4. one local transaction:
//!          insert-or-ignore version, advance head, remove draft
//! delete()       → tombstone through the same path as commit
//! merge_versions()
//!   └─ one local transaction: insert-or-ignore every version,
//!      recompute heads of every touched entry
//! ```
//!
//! A crash between step 1 and step 2 leaves the draft sealed; the next commit
//! attempt re-appends the same version id, which both logs ignore.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use inkwell_core::{
    Clock, CommitOutcome, DiaryId, Draft, EntryFields, Head, Rejection, SaveOutcome, SealInfo,
    StreamId, SystemClock, Version, VersionId,
};

use crate::drafts::DraftStore;
use crate::error::StorageError;
use crate::heads::HeadIndex;
use crate::identity;
use crate::query::EntryQuery;
use crate::tables::{RedbStorage, RedbStorageConfig, STREAM_ID_KEY};
use crate::versions::{StreamSnapshot, VersionLog};

/// Configuration for the entry store
#[derive(Debug, Clone)]
pub struct EntryStoreConfig {
    /// Directory holding every database file
    pub data_dir: PathBuf,
    /// redb cache size in bytes, per database
    pub cache_size: usize,
}

impl Default for EntryStoreConfig {
    fn default() -> Self {
        Self::with_data_dir("./data")
    }
}

impl EntryStoreConfig {
    /// Create a configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_size: RedbStorageConfig::default().cache_size,
        }
    }

    /// Path of the local merged database
    pub fn local_db_path(&self) -> PathBuf {
        self.data_dir.join("local.redb")
    }

    /// Directory holding stream logs, one file per stream id ever used
    pub fn streams_dir(&self) -> PathBuf {
        self.data_dir.join("streams")
    }

    /// Path of the stream log for `stream_id`
    pub fn stream_db_path(&self, stream_id: &StreamId) -> PathBuf {
        self.streams_dir().join(format!("{}.redb", stream_id))
    }

    fn redb(&self, db_path: PathBuf) -> RedbStorageConfig {
        RedbStorageConfig {
            db_path,
            cache_size: self.cache_size,
        }
    }
}

/// Result of committing every sealed draft
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub committed: usize,
    pub failed: usize,
}

/// Result of merging versions into the local store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Versions that were not already present
    pub imported: usize,
    /// Heads that moved as a result
    pub heads_changed: usize,
    /// Entries that received at least one new version
    pub affected: BTreeSet<DiaryId>,
}

impl MergeReport {
    /// Fold another report into this one
    pub fn absorb(&mut self, other: MergeReport) {
        self.imported += other.imported;
        self.heads_changed += other.heads_changed;
        self.affected.extend(other.affected);
    }
}

/// A peer snapshot that was merged
#[derive(Debug, Clone)]
pub struct ImportedSnapshot {
    /// Stream id recorded in the snapshot, if any
    pub stream_id: Option<StreamId>,
    /// Versions contained in the snapshot
    pub total: usize,
    pub merge: MergeReport,
}

/// The device's own stream log
struct StreamLog {
    id: StreamId,
    log: VersionLog,
}

/// Versioned entry store for one device
pub struct EntryStore {
    local: Arc<RedbStorage>,
    drafts: DraftStore,
    versions: VersionLog,
    heads: HeadIndex,
    query: EntryQuery,
    stream: RwLock<StreamLog>,
    clock: Arc<dyn Clock>,
    config: EntryStoreConfig,
}

impl EntryStore {
    /// Open the store using the system clock
    pub fn open(config: EntryStoreConfig) -> Result<Self, StorageError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open the store with an explicit clock
    #[instrument(skip(config, clock), fields(data_dir = %config.data_dir.display()))]
    pub fn open_with_clock(
        config: EntryStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let local = Arc::new(RedbStorage::open(config.redb(config.local_db_path()))?);
        let stream_id = identity::load_or_create_stream_id(&local)?;
        let stream = Self::open_stream_log(&config, stream_id)?;

        info!(stream = %stream_id, "Entry store opened");

        Ok(Self {
            drafts: DraftStore::new(local.clone(), clock.clone()),
            versions: VersionLog::new(local.clone()),
            heads: HeadIndex::new(local.clone()),
            query: EntryQuery::new(local.clone()),
            local,
            stream: RwLock::new(stream),
            clock,
            config,
        })
    }

    fn open_stream_log(
        config: &EntryStoreConfig,
        stream_id: StreamId,
    ) -> Result<StreamLog, StorageError> {
        let storage = RedbStorage::open(config.redb(config.stream_db_path(&stream_id)))?;
        match identity::load_stream_id(&storage)? {
            Some(recorded) if recorded != stream_id => {
                return Err(StorageError::corrupt(format!(
                    "stream log for {} is recorded as {}",
                    stream_id, recorded
                )));
            }
            Some(_) => {}
            None => storage.put_meta(STREAM_ID_KEY, stream_id.as_bytes())?,
        }

        Ok(StreamLog {
            id: stream_id,
            log: VersionLog::new(Arc::new(storage)),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &EntryStoreConfig {
        &self.config
    }

    /// Read-side queries
    pub fn query(&self) -> &EntryQuery {
        &self.query
    }

    /// Local merged version log
    pub fn local_log(&self) -> &VersionLog {
        &self.versions
    }

    /// This device's stream id
    pub fn stream_id(&self) -> StreamId {
        self.stream.read().id
    }

    // Drafts

    pub fn save_draft(
        &self,
        diary_id: Option<DiaryId>,
        fields: EntryFields,
    ) -> Result<SaveOutcome, StorageError> {
        self.drafts.save(diary_id, fields)
    }

    pub fn get_draft(&self, diary_id: &DiaryId) -> Result<Option<Draft>, StorageError> {
        self.drafts.get(diary_id)
    }

    pub fn seal_draft(&self, diary_id: &DiaryId) -> Result<Option<SealInfo>, StorageError> {
        self.drafts.seal(diary_id)
    }

    pub fn list_drafts(&self) -> Result<Vec<Draft>, StorageError> {
        self.drafts.list()
    }

    /// Sealed drafts, oldest seal first
    pub fn sealed_drafts(&self) -> Result<Vec<Draft>, StorageError> {
        self.drafts.sealed()
    }

    // Commit protocol

    /// Commit a sealed draft as a new version
    ///
    /// Rejected without side effects if there is no draft or it is unsealed.
    #[instrument(skip(self), fields(diary = %diary_id.short()))]
    pub fn commit(&self, diary_id: &DiaryId) -> Result<CommitOutcome, StorageError> {
        let draft = match self.drafts.get(diary_id)? {
            Some(draft) => draft,
            None => return Ok(CommitOutcome::Rejected(Rejection::NotFound)),
        };
        let version = match draft.to_version() {
            Some(version) => version,
            None => return Ok(CommitOutcome::Rejected(Rejection::NotSealed)),
        };

        self.append_authored(&version)?;
        info!(version = %version.id.short(), "Committed draft");
        Ok(CommitOutcome::Committed(version.id))
    }

    /// Commit every sealed draft, counting failures instead of stopping
    #[instrument(skip(self))]
    pub fn commit_all_sealed(&self) -> Result<CommitSummary, StorageError> {
        let mut summary = CommitSummary::default();

        for draft in self.drafts.sealed()? {
            match self.commit(&draft.diary_id) {
                Ok(CommitOutcome::Committed(_)) => summary.committed += 1,
                // Committed or deleted by someone else in the meantime
                Ok(CommitOutcome::Rejected(reason)) => {
                    debug!(diary = %draft.diary_id.short(), ?reason, "Skipped sealed draft");
                }
                Err(e) => {
                    warn!(diary = %draft.diary_id.short(), error = %e, "Failed to commit sealed draft");
                    summary.failed += 1;
                }
            }
        }

        if summary.committed > 0 || summary.failed > 0 {
            info!(
                committed = summary.committed,
                failed = summary.failed,
                "Committed sealed drafts"
            );
        }
        Ok(summary)
    }

    /// Delete an entry by appending a tombstone
    ///
    /// A sealed draft is committed first so its version, which may already
    /// sit in the stream log, also reaches the local log. An unsealed draft
    /// is discarded. Returns false if there was neither a live entry nor a
    /// draft.
    #[instrument(skip(self), fields(diary = %diary_id.short()))]
    pub fn delete(&self, diary_id: &DiaryId) -> Result<bool, StorageError> {
        if let Some(draft) = self.drafts.get(diary_id)?
            && draft.is_sealed()
        {
            self.commit(diary_id)?;
        }

        if let Some(current) = self.query.get_diary(diary_id)? {
            let now = self.clock.now_millis();
            let tombstone = Version::tombstone(VersionId::generate(), &current, now);
            self.append_authored(&tombstone)?;
            info!(version = %tombstone.id.short(), "Archived entry");
            return Ok(true);
        }

        let removed = self
            .local
            .write(|txn| DraftStore::remove_in(txn, diary_id))?;
        if removed {
            debug!("Discarded draft of archived or unknown entry");
        }
        Ok(removed)
    }

    /// Write a version authored on this device to both logs
    ///
    /// The stream log goes first; the local transaction then inserts the
    /// version, advances the head and drops the entry's draft together.
    fn append_authored(&self, version: &Version) -> Result<(), StorageError> {
        {
            let stream = self.stream.read();
            stream.log.append(version)?;
        }

        self.local.write(|txn| {
            VersionLog::insert_in(txn, version)?;
            HeadIndex::advance_in(txn, version)?;
            DraftStore::remove_in(txn, &version.diary_id)?;
            Ok(())
        })
    }

    // Merge

    /// Insert-or-ignore versions from elsewhere and recompute affected heads
    ///
    /// Runs in a single local transaction. Versions already present are left
    /// as they are, so merging the same set twice changes nothing.
    #[instrument(skip(self, versions))]
    pub fn merge_versions(&self, versions: &[Version]) -> Result<MergeReport, StorageError> {
        let report = self.local.write(|txn| {
            let mut report = MergeReport::default();
            for version in versions {
                if VersionLog::insert_in(txn, version)? {
                    report.imported += 1;
                    report.affected.insert(version.diary_id);
                }
            }
            for diary_id in &report.affected {
                if HeadIndex::recompute_in(txn, diary_id)? {
                    report.heads_changed += 1;
                }
            }
            Ok(report)
        })?;

        debug!(
            offered = versions.len(),
            imported = report.imported,
            heads_changed = report.heads_changed,
            "Merged versions"
        );
        Ok(report)
    }

    /// Merge a stream snapshot file
    ///
    /// The file must be an Inkwell database with a compatible schema. A
    /// snapshot recorded under this device's own stream id is still merged,
    /// since its versions are already present and the merge is a no-op.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn import_snapshot(&self, path: &Path) -> Result<ImportedSnapshot, StorageError> {
        let StreamSnapshot {
            stream_id,
            versions,
        } = VersionLog::read_snapshot(path)?;

        if stream_id == Some(self.stream_id()) {
            warn!("Importing a snapshot of this device's own stream");
        }

        let merge = self.merge_versions(&versions)?;
        info!(
            stream = ?stream_id,
            total = versions.len(),
            imported = merge.imported,
            "Imported stream snapshot"
        );
        Ok(ImportedSnapshot {
            stream_id,
            total: versions.len(),
            merge,
        })
    }

    /// Export this device's stream log to `dest`
    pub fn export_stream(&self, dest: &Path) -> Result<usize, StorageError> {
        let stream = self.stream.read();
        stream.log.export_snapshot(dest, &stream.id)
    }

    // Identity and maintenance

    /// Start a fresh stream under a new id
    ///
    /// The new stream starts with every version of the old one, so versions
    /// committed since the last upload are published under the new id. The
    /// old stream file stays on disk.
    #[instrument(skip(self))]
    pub fn reset_stream_id(&self) -> Result<StreamId, StorageError> {
        let mut stream = self.stream.write();
        let previous = stream.id;
        let carried = stream.log.all()?;

        let new_id = StreamId::generate();
        let fresh = Self::open_stream_log(&self.config, new_id)?;
        fresh.log.storage().write(|txn| {
            for version in &carried {
                VersionLog::insert_in(txn, version)?;
            }
            Ok(())
        })?;
        identity::store_stream_id(&self.local, &new_id)?;
        *stream = fresh;

        info!(
            previous = %previous,
            stream = %new_id,
            carried = carried.len(),
            "Reset device stream id"
        );
        Ok(new_id)
    }

    /// Rebuild every head from the local version log
    pub fn recompute_all_heads(&self) -> Result<usize, StorageError> {
        self.heads.recompute_all()
    }

    /// Current head of an entry
    pub fn head(&self, diary_id: &DiaryId) -> Result<Option<Head>, StorageError> {
        self.heads.get(diary_id)
    }

    /// Number of versions of an entry in the local merged log
    pub fn local_version_count(&self, diary_id: &DiaryId) -> Result<usize, StorageError> {
        self.versions.count_for(diary_id)
    }

    /// Number of versions of an entry in this device's stream log
    pub fn stream_version_count(&self, diary_id: &DiaryId) -> Result<usize, StorageError> {
        self.stream.read().log.count_for(diary_id)
    }
}
