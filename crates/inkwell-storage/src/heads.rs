//! Head index
//!
//! Maps each entry to its current version: the one with the greatest
//! `(created_at, version id)`. Tombstones are ordinary candidates, so a
//! deleted entry's head points at its tombstone and an older live version
//! arriving later from a peer cannot bring the entry back.

use std::collections::BTreeSet;
use std::sync::Arc;

use redb::{ReadableTable, WriteTransaction};
use tracing::{debug, info, instrument};

use inkwell_core::{DiaryId, Head, Version};

use super::tables::{DIARY_VERSIONS, HEADS, RedbStorage, decode, encode};
use super::versions::VersionLog;
use crate::error::StorageError;

/// Head index over the local database
pub struct HeadIndex {
    storage: Arc<RedbStorage>,
}

impl HeadIndex {
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Current head of an entry
    pub fn get(&self, diary_id: &DiaryId) -> Result<Option<Head>, StorageError> {
        self.storage.read(|txn| {
            let table = txn.open_table(HEADS)?;
            let head = match table.get(diary_id.as_bytes().as_slice())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            Ok(head)
        })
    }

    /// Every head
    pub fn all(&self) -> Result<Vec<Head>, StorageError> {
        self.storage.read(|txn| {
            let table = txn.open_table(HEADS)?;
            let mut heads = Vec::new();
            for entry in table.iter()? {
                let (_key, value) = entry?;
                heads.push(decode(value.value())?);
            }
            Ok(heads)
        })
    }

    pub(crate) fn get_in(
        txn: &WriteTransaction,
        diary_id: &DiaryId,
    ) -> Result<Option<Head>, StorageError> {
        let table = txn.open_table(HEADS)?;
        let head = match table.get(diary_id.as_bytes().as_slice())? {
            Some(value) => Some(decode(value.value())?),
            None => None,
        };
        Ok(head)
    }

    /// Point the head at `version` if it is newer than the current head
    ///
    /// Returns true if the head moved.
    pub(crate) fn advance_in(txn: &WriteTransaction, version: &Version) -> Result<bool, StorageError> {
        let mut table = txn.open_table(HEADS)?;
        let key = version.diary_id.as_bytes().as_slice();

        let current: Option<Head> = match table.get(key)? {
            Some(value) => Some(decode(value.value())?),
            None => None,
        };

        if current.is_some_and(|head| !head.is_superseded_by(version)) {
            return Ok(false);
        }

        table.insert(key, encode(&Head::for_version(version))?.as_slice())?;
        debug!(
            diary = %version.diary_id.short(),
            version = %version.id.short(),
            "Advanced head"
        );
        Ok(true)
    }

    /// Recompute the head of one entry from its full history
    ///
    /// Returns true if the stored head changed.
    pub(crate) fn recompute_in(
        txn: &WriteTransaction,
        diary_id: &DiaryId,
    ) -> Result<bool, StorageError> {
        let latest = VersionLog::history_in(txn, diary_id)?.into_iter().last();
        let previous = Self::get_in(txn, diary_id)?;

        let mut table = txn.open_table(HEADS)?;
        let key = diary_id.as_bytes().as_slice();

        match latest {
            Some(version) => {
                let head = Head::for_version(&version);
                if previous == Some(head) {
                    return Ok(false);
                }
                table.insert(key, encode(&head)?.as_slice())?;
                debug!(
                    diary = %diary_id.short(),
                    version = %version.id.short(),
                    "Recomputed head"
                );
                Ok(true)
            }
            None => Ok(table.remove(key)?.is_some()),
        }
    }

    /// Recompute the heads of the given entries in one transaction
    pub fn recompute(&self, diary_ids: &BTreeSet<DiaryId>) -> Result<usize, StorageError> {
        self.storage.write(|txn| {
            let mut changed = 0;
            for diary_id in diary_ids {
                if Self::recompute_in(txn, diary_id)? {
                    changed += 1;
                }
            }
            Ok(changed)
        })
    }

    /// Rebuild every head from the version log
    #[instrument(skip(self))]
    pub fn recompute_all(&self) -> Result<usize, StorageError> {
        let diary_ids = self.storage.read(|txn| {
            let index = txn.open_table(DIARY_VERSIONS)?;
            let mut ids = BTreeSet::new();
            for entry in index.iter()? {
                let (key, _) = entry?;
                let id = key
                    .value()
                    .get(..16)
                    .and_then(DiaryId::from_slice)
                    .ok_or_else(|| StorageError::corrupt("malformed diary index key"))?;
                ids.insert(id);
            }
            Ok(ids)
        })?;

        let changed = self.recompute(&diary_ids)?;
        info!(diaries = diary_ids.len(), changed, "Recomputed all heads");
        Ok(changed)
    }
}
