//! Read side: resolve entries through the head index

use std::cmp::Ordering;
use std::sync::Arc;

use redb::{ReadTransaction, ReadableTable};

use inkwell_core::{DiaryId, Head, Version, VersionId};

use super::tables::{HEADS, RedbStorage, VERSIONS, decode};
use super::versions::VersionLog;
use crate::error::StorageError;

/// Read-only queries over the local merged store
#[derive(Clone)]
pub struct EntryQuery {
    storage: Arc<RedbStorage>,
}

impl EntryQuery {
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// The version the head points at, archived or not
    pub fn current_version(&self, diary_id: &DiaryId) -> Result<Option<Version>, StorageError> {
        self.storage.read(|txn| {
            let heads = txn.open_table(HEADS)?;
            let head: Option<Head> = match heads.get(diary_id.as_bytes().as_slice())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            match head {
                Some(head) => resolve(txn, &head).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Current version of a live entry
    ///
    /// Returns `None` when the entry is unknown or its head is a tombstone.
    pub fn get_diary(&self, diary_id: &DiaryId) -> Result<Option<Version>, StorageError> {
        Ok(self
            .current_version(diary_id)?
            .filter(|version| !version.is_archived()))
    }

    /// Current versions of every live entry, newest date first
    pub fn get_diaries(&self) -> Result<Vec<Version>, StorageError> {
        let mut diaries = self.storage.read(|txn| {
            let heads = txn.open_table(HEADS)?;
            let mut diaries = Vec::new();
            for entry in heads.iter()? {
                let (_key, value) = entry?;
                let head: Head = decode(value.value())?;
                let version = resolve(txn, &head)?;
                if !version.is_archived() {
                    diaries.push(version);
                }
            }
            Ok(diaries)
        })?;

        diaries.sort_by(listing_order);
        Ok(diaries)
    }

    /// A single version by id
    pub fn get_version(&self, version_id: &VersionId) -> Result<Option<Version>, StorageError> {
        VersionLog::new(self.storage.clone()).get(version_id)
    }

    /// Every version of an entry, oldest first, tombstones included
    pub fn history(&self, diary_id: &DiaryId) -> Result<Vec<Version>, StorageError> {
        VersionLog::new(self.storage.clone()).history(diary_id)
    }
}

/// Load the version a head points at
fn resolve(txn: &ReadTransaction, head: &Head) -> Result<Version, StorageError> {
    let versions = txn.open_table(VERSIONS)?;
    let version = match versions.get(head.version_id.as_bytes().as_slice())? {
        Some(value) => decode(value.value())?,
        None => {
            return Err(StorageError::corrupt(format!(
                "head of {} points at missing version {}",
                head.diary_id, head.version_id
            )));
        }
    };
    Ok(version)
}

/// Date descending, then newest version first
fn listing_order(a: &Version, b: &Version) -> Ordering {
    b.fields
        .date
        .cmp(&a.fields.date)
        .then_with(|| b.cmp_recency(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use inkwell_core::EntryFields;
    use tempfile::TempDir;

    use crate::heads::HeadIndex;
    use crate::tables::RedbStorageConfig;

    struct Fixture {
        storage: Arc<RedbStorage>,
        query: EntryQuery,
        _temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let storage = Arc::new(
                RedbStorage::open(RedbStorageConfig::at(temp.path().join("q.redb"))).unwrap(),
            );
            Self {
                query: EntryQuery::new(storage.clone()),
                storage,
                _temp: temp,
            }
        }

        fn add(&self, version: &Version) {
            self.storage
                .write(|txn| {
                    VersionLog::insert_in(txn, version)?;
                    HeadIndex::advance_in(txn, version)
                })
                .unwrap();
        }
    }

    fn version(diary_id: DiaryId, date: (i32, u32, u32), created_at: i64) -> Version {
        Version {
            id: VersionId::generate(),
            diary_id,
            fields: EntryFields::new(NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap()),
            archived_at_millis: None,
            created_at_millis: created_at,
        }
    }

    #[test]
    fn test_get_diary_follows_head() {
        let fx = Fixture::new();
        let diary = DiaryId::generate();
        let v1 = version(diary, (2024, 1, 1), 100);
        let v2 = version(diary, (2024, 1, 1), 200);
        fx.add(&v1);
        fx.add(&v2);

        assert_eq!(fx.query.get_diary(&diary).unwrap().unwrap().id, v2.id);
        assert!(fx.query.get_diary(&DiaryId::generate()).unwrap().is_none());
    }

    #[test]
    fn test_archived_head_hides_entry() {
        let fx = Fixture::new();
        let diary = DiaryId::generate();
        let live = version(diary, (2024, 1, 1), 100);
        fx.add(&live);
        let tomb = Version::tombstone(VersionId::generate(), &live, 200);
        fx.add(&tomb);

        assert!(fx.query.get_diary(&diary).unwrap().is_none());
        assert!(fx.query.get_diaries().unwrap().is_empty());
        assert!(fx.query.current_version(&diary).unwrap().unwrap().is_archived());
        assert_eq!(fx.query.history(&diary).unwrap().len(), 2);
    }

    #[test]
    fn test_get_diaries_ordering() {
        let fx = Fixture::new();
        let march = version(DiaryId::generate(), (2024, 3, 1), 100);
        let may_old = version(DiaryId::generate(), (2024, 5, 1), 100);
        let may_new = version(DiaryId::generate(), (2024, 5, 1), 900);
        for v in [&march, &may_old, &may_new] {
            fx.add(v);
        }

        let ids: Vec<_> = fx.query.get_diaries().unwrap().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![may_new.id, may_old.id, march.id]);
    }

    #[test]
    fn test_dangling_head_is_corruption() {
        let fx = Fixture::new();
        let diary = DiaryId::generate();
        let ghost = version(diary, (2024, 1, 1), 1);
        // Head written without its version
        fx.storage
            .write(|txn| HeadIndex::advance_in(txn, &ghost))
            .unwrap();

        let err = fx.query.get_diary(&diary).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
