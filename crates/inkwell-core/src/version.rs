//! Versions and heads
//!
//! Versions are immutable snapshots. Deleting an entry appends an archived
//! version (a tombstone); nothing is ever removed from history.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entry::EntryFields;
use crate::ids::{DiaryId, VersionId};

/// Immutable snapshot of a diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Globally unique version id
    pub id: VersionId,
    /// Entry this version belongs to
    pub diary_id: DiaryId,
    /// Field values at the time of the snapshot
    pub fields: EntryFields,
    /// Set when this version marks the entry as deleted (Unix millis)
    pub archived_at_millis: Option<i64>,
    /// When the version was created (Unix millis)
    pub created_at_millis: i64,
}

impl Version {
    /// Build a tombstone that supersedes `current`
    ///
    /// The last known fields are carried forward so history stays readable.
    /// The tombstone is stamped at least one millisecond after `current`, so a
    /// device clock running behind still produces a version that wins.
    pub fn tombstone(id: VersionId, current: &Version, now_millis: i64) -> Self {
        Self {
            id,
            diary_id: current.diary_id,
            fields: current.fields.clone(),
            archived_at_millis: Some(now_millis),
            created_at_millis: now_millis.max(current.created_at_millis.saturating_add(1)),
        }
    }

    /// Whether this version marks the entry as deleted
    pub fn is_archived(&self) -> bool {
        self.archived_at_millis.is_some()
    }

    /// Ordering key: creation time, then version id
    pub fn recency(&self) -> (i64, VersionId) {
        (self.created_at_millis, self.id)
    }

    /// Compare recency with another version
    pub fn cmp_recency(&self, other: &Version) -> Ordering {
        self.recency().cmp(&other.recency())
    }
}

/// Pointer from an entry to its current version
///
/// The creation time of the target is kept alongside the id so a newer
/// candidate can be compared without loading the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub diary_id: DiaryId,
    pub version_id: VersionId,
    pub created_at_millis: i64,
}

impl Head {
    /// Head pointing at the given version
    pub fn for_version(version: &Version) -> Self {
        Self {
            diary_id: version.diary_id,
            version_id: version.id,
            created_at_millis: version.created_at_millis,
        }
    }

    /// Ordering key, matching [`Version::recency`]
    pub fn recency(&self) -> (i64, VersionId) {
        (self.created_at_millis, self.version_id)
    }

    /// Whether `version` should replace this head
    pub fn is_superseded_by(&self, version: &Version) -> bool {
        version.recency() > self.recency()
    }
}
