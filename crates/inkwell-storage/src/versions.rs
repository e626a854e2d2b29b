//! Append-only version log
//!
//! Versions are keyed by their id and written at most once: inserting an id
//! that is already present leaves the stored row untouched. That makes every
//! write path (commit retries, repeated imports of the same peer stream)
//! idempotent, and it makes merging two logs a plain set union.
//!
//! The same log type backs the local merged store, the device's own stream
//! log, and stream snapshots exchanged with peers.

use std::path::Path;
use std::sync::Arc;

use redb::{ReadableTable, WriteTransaction};
use tracing::{debug, info, instrument};

use inkwell_core::{DiaryId, StreamId, Version, VersionId};

use super::tables::{
    DIARY_VERSIONS, RedbStorage, RedbStorageConfig, STREAM_ID_KEY, VERSIONS, decode,
    diary_version_key, encode, scan_prefix_in,
};
use crate::error::StorageError;

/// Contents of a stream snapshot file
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    /// Stream that exported the file, if it recorded one
    pub stream_id: Option<StreamId>,
    /// Every version in the file
    pub versions: Vec<Version>,
}

/// Append-only log of versions
pub struct VersionLog {
    storage: Arc<RedbStorage>,
}

impl VersionLog {
    /// Create a log over an open database
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Get the underlying storage
    pub fn storage(&self) -> &Arc<RedbStorage> {
        &self.storage
    }

    /// Append a version; returns false if the id was already present
    pub fn append(&self, version: &Version) -> Result<bool, StorageError> {
        self.storage.write(|txn| Self::insert_in(txn, version))
    }

    /// Insert-or-ignore a version inside an open transaction
    pub(crate) fn insert_in(txn: &WriteTransaction, version: &Version) -> Result<bool, StorageError> {
        let mut versions = txn.open_table(VERSIONS)?;
        let key = version.id.as_bytes().as_slice();

        if versions.get(key)?.is_some() {
            debug!(version = %version.id.short(), "Version already present");
            return Ok(false);
        }

        versions.insert(key, encode(version)?.as_slice())?;

        let mut index = txn.open_table(DIARY_VERSIONS)?;
        let index_key = diary_version_key(&version.diary_id, &version.id);
        index.insert(index_key.as_slice(), b"".as_slice())?;

        debug!(
            version = %version.id.short(),
            diary = %version.diary_id.short(),
            archived = version.is_archived(),
            "Appended version"
        );
        Ok(true)
    }

    /// Load a version inside an open write transaction
    pub(crate) fn get_in(
        txn: &WriteTransaction,
        version_id: &VersionId,
    ) -> Result<Option<Version>, StorageError> {
        let versions = txn.open_table(VERSIONS)?;
        let version = match versions.get(version_id.as_bytes().as_slice())? {
            Some(value) => Some(decode(value.value())?),
            None => None,
        };
        Ok(version)
    }

    /// Every version of one entry inside an open write transaction
    pub(crate) fn history_in(
        txn: &WriteTransaction,
        diary_id: &DiaryId,
    ) -> Result<Vec<Version>, StorageError> {
        let ids = {
            let index = txn.open_table(DIARY_VERSIONS)?;
            index_ids(scan_prefix_in(&index, diary_id.as_bytes())?)?
        };

        let versions = txn.open_table(VERSIONS)?;
        let mut history = Vec::with_capacity(ids.len());
        for id in ids {
            match versions.get(id.as_bytes().as_slice())? {
                Some(value) => history.push(decode(value.value())?),
                None => {
                    return Err(StorageError::corrupt(format!(
                        "index references missing version {}",
                        id
                    )));
                }
            }
        }
        history.sort_by(Version::cmp_recency);
        Ok(history)
    }

    /// Load a version by id
    pub fn get(&self, version_id: &VersionId) -> Result<Option<Version>, StorageError> {
        self.storage.read(|txn| {
            let versions = txn.open_table(VERSIONS)?;
            let version = match versions.get(version_id.as_bytes().as_slice())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            Ok(version)
        })
    }

    /// Every version of one entry, oldest first
    pub fn history(&self, diary_id: &DiaryId) -> Result<Vec<Version>, StorageError> {
        self.storage.read(|txn| {
            let index = txn.open_table(DIARY_VERSIONS)?;
            let ids = index_ids(scan_prefix_in(&index, diary_id.as_bytes())?)?;

            let versions = txn.open_table(VERSIONS)?;
            let mut history = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(value) = versions.get(id.as_bytes().as_slice())? {
                    history.push(decode(value.value())?);
                }
            }
            history.sort_by(Version::cmp_recency);
            Ok(history)
        })
    }

    /// Number of versions stored for one entry
    pub fn count_for(&self, diary_id: &DiaryId) -> Result<usize, StorageError> {
        self.storage.count_prefix(DIARY_VERSIONS, diary_id.as_bytes())
    }

    /// Total number of versions
    pub fn len(&self) -> Result<usize, StorageError> {
        self.storage.count_prefix(VERSIONS, &[])
    }

    /// Whether the log holds no versions
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|n| n == 0)
    }

    /// Every version in the log, in key order
    pub fn all(&self) -> Result<Vec<Version>, StorageError> {
        self.storage.read(|txn| {
            let versions = txn.open_table(VERSIONS)?;
            let mut all = Vec::new();
            for entry in versions.iter()? {
                let (_key, value) = entry?;
                all.push(decode(value.value())?);
            }
            Ok(all)
        })
    }

    /// Write every version into a fresh database file at `dest`
    ///
    /// The file carries the same schema as any other Inkwell database plus
    /// the owning stream id, and is what gets uploaded for peers. Any file
    /// already at `dest` is replaced.
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub fn export_snapshot(&self, dest: &Path, stream_id: &StreamId) -> Result<usize, StorageError> {
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }

        let versions = self.all()?;
        let snapshot = RedbStorage::open(RedbStorageConfig::at(dest))?;
        snapshot.put_meta(STREAM_ID_KEY, stream_id.as_bytes())?;
        snapshot.write(|txn| {
            for version in &versions {
                Self::insert_in(txn, version)?;
            }
            Ok(())
        })?;

        info!(versions = versions.len(), "Exported stream snapshot");
        Ok(versions.len())
    }

    /// Read a stream snapshot file written by [`Self::export_snapshot`]
    #[instrument(fields(path = %path.display()))]
    pub fn read_snapshot(path: &Path) -> Result<StreamSnapshot, StorageError> {
        let storage = Arc::new(RedbStorage::open_existing(RedbStorageConfig::at(path))?);

        let stream_id = storage
            .get_meta(STREAM_ID_KEY)?
            .and_then(|bytes| StreamId::from_slice(&bytes));
        let versions = VersionLog::new(storage).all()?;

        debug!(versions = versions.len(), "Read stream snapshot");
        Ok(StreamSnapshot {
            stream_id,
            versions,
        })
    }
}

/// Extract version ids from per-diary index keys
fn index_ids(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Vec<VersionId>, StorageError> {
    entries
        .into_iter()
        .map(|(key, _)| {
            key.get(16..)
                .and_then(VersionId::from_slice)
                .ok_or_else(|| StorageError::corrupt("malformed diary index key"))
        })
        .collect()
}
