//! Draft model and seal lifecycle
//!
//! A draft is the mutable working copy of an entry. It moves through
//! `Unsealed -> Sealed -> Committed`, where the committed state is the
//! absence of the draft. Sealing assigns the id of the version the draft
//! will become, so a retried commit always writes the same version.

use serde::{Deserialize, Serialize};

use crate::entry::EntryFields;
use crate::ids::{DiaryId, VersionId};
use crate::version::Version;

/// Seal data attached to a sealed draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealInfo {
    /// When the draft was sealed (Unix millis)
    pub sealed_at_millis: i64,
    /// Id the committed version will carry
    pub pending_version_id: VersionId,
}

/// Seal state of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SealState {
    /// Editable
    Unsealed,
    /// Frozen and waiting to be committed
    Sealed(SealInfo),
}

/// Mutable working copy of a diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Entry this draft belongs to
    pub diary_id: DiaryId,
    /// Current field values
    pub fields: EntryFields,
    /// When the draft was first saved (Unix millis)
    pub created_at_millis: i64,
    /// When the draft was last saved (Unix millis)
    pub updated_at_millis: i64,
    /// Seal state
    pub seal: SealState,
}

impl Draft {
    /// Create a new unsealed draft
    pub fn new(diary_id: DiaryId, fields: EntryFields, now_millis: i64) -> Self {
        Self {
            diary_id,
            fields,
            created_at_millis: now_millis,
            updated_at_millis: now_millis,
            seal: SealState::Unsealed,
        }
    }

    /// Whether the draft is sealed (read-only)
    pub fn is_sealed(&self) -> bool {
        matches!(self.seal, SealState::Sealed(_))
    }

    /// Seal data, if sealed
    pub fn seal_info(&self) -> Option<SealInfo> {
        match self.seal {
            SealState::Sealed(info) => Some(info),
            SealState::Unsealed => None,
        }
    }

    /// The version a sealed draft commits as
    ///
    /// The version's creation time is the seal time, so every commit attempt
    /// for this draft produces an identical row.
    pub fn to_version(&self) -> Option<Version> {
        self.seal_info().map(|info| Version {
            id: info.pending_version_id,
            diary_id: self.diary_id,
            fields: self.fields.clone(),
            archived_at_millis: None,
            created_at_millis: info.sealed_at_millis,
        })
    }
}

/// Successful save result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedDraft {
    pub diary_id: DiaryId,
    pub created_at_millis: i64,
    pub updated_at_millis: i64,
}

/// Why a request left storage untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The draft is sealed and read-only
    AlreadySealed,
    /// There is no draft for the entry
    NotFound,
    /// The draft exists but was never sealed
    NotSealed,
}

/// Outcome of saving a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SavedDraft),
    Rejected(Rejection),
}

impl SaveOutcome {
    /// The saved draft, if the save went through
    pub fn saved(&self) -> Option<SavedDraft> {
        match self {
            SaveOutcome::Saved(saved) => Some(*saved),
            SaveOutcome::Rejected(_) => None,
        }
    }
}

/// Outcome of committing a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The draft was written as this version and removed
    Committed(VersionId),
    Rejected(Rejection),
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}
