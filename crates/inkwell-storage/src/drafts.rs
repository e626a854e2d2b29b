//! Draft storage
//!
//! One mutable working copy per entry, with the seal step that freezes it
//! ahead of a commit.

use std::sync::Arc;

use redb::{ReadableTable, WriteTransaction};
use tracing::{debug, instrument};

use inkwell_core::{
    Clock, DiaryId, Draft, EntryFields, Rejection, SaveOutcome, SavedDraft, SealInfo, SealState,
    VersionId,
};

use super::tables::{DRAFTS, RedbStorage, decode, encode};
use crate::error::StorageError;

/// Draft store over the local database
pub struct DraftStore {
    storage: Arc<RedbStorage>,
    clock: Arc<dyn Clock>,
}

impl DraftStore {
    /// Create a new draft store
    pub fn new(storage: Arc<RedbStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Save the working copy of an entry
    ///
    /// With no id a new entry is started. Saving over a sealed draft is
    /// rejected without touching storage: the sealed copy is about to become
    /// a version and must not change underneath the commit.
    #[instrument(skip(self, fields))]
    pub fn save(
        &self,
        diary_id: Option<DiaryId>,
        fields: EntryFields,
    ) -> Result<SaveOutcome, StorageError> {
        let now = self.clock.now_millis();
        let diary_id = diary_id.unwrap_or_else(DiaryId::generate);

        self.storage.write(|txn| {
            let mut table = txn.open_table(DRAFTS)?;
            let key = diary_id.as_bytes().as_slice();

            let existing: Option<Draft> = match table.get(key)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            let draft = match existing {
                Some(draft) if draft.is_sealed() => {
                    debug!(diary = %diary_id.short(), "Ignoring save to sealed draft");
                    return Ok(SaveOutcome::Rejected(Rejection::AlreadySealed));
                }
                Some(mut draft) => {
                    draft.fields = fields;
                    draft.updated_at_millis = now;
                    draft
                }
                None => Draft::new(diary_id, fields, now),
            };

            table.insert(key, encode(&draft)?.as_slice())?;
            debug!(diary = %diary_id.short(), "Saved draft");

            Ok(SaveOutcome::Saved(SavedDraft {
                diary_id,
                created_at_millis: draft.created_at_millis,
                updated_at_millis: draft.updated_at_millis,
            }))
        })
    }

    /// Get the draft for an entry
    pub fn get(&self, diary_id: &DiaryId) -> Result<Option<Draft>, StorageError> {
        self.storage.read(|txn| {
            let table = txn.open_table(DRAFTS)?;
            let draft = match table.get(diary_id.as_bytes().as_slice())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            Ok(draft)
        })
    }

    /// Freeze a draft and assign the id of the version it will become
    ///
    /// Sealing an already sealed draft returns its existing seal, so a retried
    /// sync never mints a second version id for the same edit.
    #[instrument(skip(self), fields(diary = %diary_id.short()))]
    pub fn seal(&self, diary_id: &DiaryId) -> Result<Option<SealInfo>, StorageError> {
        let now = self.clock.now_millis();

        self.storage.write(|txn| {
            let mut table = txn.open_table(DRAFTS)?;
            let key = diary_id.as_bytes().as_slice();

            let mut draft: Draft = match table.get(key)? {
                Some(value) => decode(value.value())?,
                None => return Ok(None),
            };

            if let SealState::Sealed(info) = draft.seal {
                return Ok(Some(info));
            }

            let info = SealInfo {
                sealed_at_millis: now,
                pending_version_id: VersionId::generate(),
            };
            draft.seal = SealState::Sealed(info);
            table.insert(key, encode(&draft)?.as_slice())?;

            debug!(version = %info.pending_version_id.short(), "Sealed draft");
            Ok(Some(info))
        })
    }

    /// All drafts, sealed or not
    pub fn list(&self) -> Result<Vec<Draft>, StorageError> {
        self.storage.read(|txn| {
            let table = txn.open_table(DRAFTS)?;
            let mut drafts = Vec::new();
            for entry in table.iter()? {
                let (_key, value) = entry?;
                drafts.push(decode(value.value())?);
            }
            Ok(drafts)
        })
    }

    /// Drafts waiting to be committed
    pub fn sealed(&self) -> Result<Vec<Draft>, StorageError> {
        let mut sealed: Vec<Draft> = self.list()?.into_iter().filter(Draft::is_sealed).collect();
        sealed.sort_by_key(|d| d.seal_info().map(|info| info.sealed_at_millis));
        Ok(sealed)
    }

    /// Remove a draft inside an open transaction
    pub(crate) fn remove_in(txn: &WriteTransaction, diary_id: &DiaryId) -> Result<bool, StorageError> {
        let mut table = txn.open_table(DRAFTS)?;
        let removed = table.remove(diary_id.as_bytes().as_slice())?.is_some();
        Ok(removed)
    }
}
