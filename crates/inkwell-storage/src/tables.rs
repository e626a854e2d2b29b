//! redb table definitions and storage manager
//!
//! Every Inkwell database (the local merged store, the device's stream log,
//! and exported stream snapshots) shares this schema, so versions read from
//! one can be written to another without conversion.

use std::path::PathBuf;

use redb::{Builder, Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use inkwell_core::{DiaryId, VersionId};

use crate::error::StorageError;

/// Type alias for scan results to simplify complex type
pub type ScanResults = Vec<(Vec<u8>, Vec<u8>)>;

// Key: diary_id bytes, Value: serialized Draft
pub const DRAFTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("drafts");

// Key: version_id bytes, Value: serialized Version
pub const VERSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("versions");

// Key: (diary_id, version_id) concatenated, Value: empty
pub const DIARY_VERSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("diary_versions");

// Key: diary_id bytes, Value: serialized Head
pub const HEADS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("heads");

// Key: metadata name, Value: raw bytes
pub const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Metadata key holding the schema version (u32, big endian)
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Metadata key holding the owning stream id
pub const STREAM_ID_KEY: &str = "stream_id";

/// Schema version written by this build
///
/// 1: drafts, versions, heads
/// 2: adds the per-diary version index
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/inkwell.redb"),
            cache_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl RedbStorageConfig {
    /// Config for a database at `db_path` with the default cache size
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Database,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Builder::new()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)?;

        info!("Opened redb database");
        Self::initialize(db, config)
    }

    /// Open a database file that must already exist
    ///
    /// Used for files received from elsewhere, where a missing file is an
    /// error rather than a reason to start empty.
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open_existing(config: RedbStorageConfig) -> Result<Self, StorageError> {
        if !config.db_path.exists() {
            return Err(StorageError::MissingDatabase(config.db_path.clone()));
        }

        let db = Builder::new()
            .set_cache_size(config.cache_size)
            .open(&config.db_path)?;

        debug!("Opened existing redb database");
        Self::initialize(db, config)
    }

    fn initialize(db: Database, config: RedbStorageConfig) -> Result<Self, StorageError> {
        let storage = Self { db, config };
        storage.init_tables()?;
        storage.migrate()?;
        Ok(storage)
    }

    /// Initialize all tables
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write()?;

        // Create tables if they don't exist
        write_txn.open_table(DRAFTS)?;
        write_txn.open_table(VERSIONS)?;
        write_txn.open_table(DIARY_VERSIONS)?;
        write_txn.open_table(HEADS)?;
        write_txn.open_table(META)?;

        write_txn.commit()?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Bring the schema up to [`CURRENT_SCHEMA_VERSION`]
    ///
    /// Migrations only ever move forward. A fresh database is stamped with the
    /// current version directly; a database from a newer build is refused.
    fn migrate(&self) -> Result<(), StorageError> {
        let found = self.schema_version()?;

        match found {
            None => {
                self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
                return Ok(());
            }
            Some(v) if v == CURRENT_SCHEMA_VERSION => return Ok(()),
            Some(v) if v > CURRENT_SCHEMA_VERSION => {
                return Err(StorageError::SchemaMismatch {
                    found: v,
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
            Some(_) => {}
        }

        let mut version = found.unwrap_or(CURRENT_SCHEMA_VERSION);
        while version < CURRENT_SCHEMA_VERSION {
            match version {
                1 => self.migrate_v1_to_v2()?,
                other => {
                    return Err(StorageError::corrupt(format!(
                        "no migration path from schema version {}",
                        other
                    )));
                }
            }
            version += 1;
            self.set_schema_version(version)?;
            info!(schema_version = version, "Migrated database schema");
        }

        Ok(())
    }

    /// v2 indexes versions by diary; backfill the index from existing rows
    fn migrate_v1_to_v2(&self) -> Result<(), StorageError> {
        self.write(|txn| {
            let versions: Vec<inkwell_core::Version> = {
                let table = txn.open_table(VERSIONS)?;
                let mut rows = Vec::new();
                for entry in table.iter()? {
                    let (_key, value) = entry?;
                    rows.push(decode(value.value())?);
                }
                rows
            };

            let mut index = txn.open_table(DIARY_VERSIONS)?;
            for version in &versions {
                let key = diary_version_key(&version.diary_id, &version.id);
                index.insert(key.as_slice(), b"".as_slice())?;
            }

            debug!(backfilled = versions.len(), "Rebuilt per-diary version index");
            Ok(())
        })
    }

    /// Read the stored schema version, if any
    pub fn schema_version(&self) -> Result<Option<u32>, StorageError> {
        match self.get_meta(SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::corrupt(format!("schema version has {} bytes", bytes.len()))
                })?;
                Ok(Some(u32::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the stored schema version
    pub fn set_schema_version(&self, version: u32) -> Result<(), StorageError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_be_bytes())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Run `f` inside a write transaction and commit it
    ///
    /// If `f` fails the transaction is dropped, which aborts it.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let write_txn = self.db.begin_write()?;
        let value = f(&write_txn)?;
        write_txn.commit()?;
        Ok(value)
    }

    /// Run `f` inside a read transaction
    pub fn read<T>(
        &self,
        f: impl FnOnce(&ReadTransaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let read_txn = self.db.begin_read()?;
        f(&read_txn)
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.read(|txn| {
            let table = txn.open_table(META)?;
            let value = table.get(key)?.map(|v| v.value().to_vec());
            Ok(value)
        })
    }

    /// Set a metadata value
    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.write(|txn| {
            let mut table = txn.open_table(META)?;
            table.insert(key, value)?;
            Ok(())
        })
    }

    /// Iterate over all entries in a table with a prefix
    pub fn scan_prefix(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<ScanResults, StorageError> {
        self.read(|txn| {
            let table = txn.open_table(table)?;
            scan_prefix_in(&table, prefix)
        })
    }

    /// Count entries with a prefix
    pub fn count_prefix(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<usize, StorageError> {
        self.scan_prefix(table, prefix).map(|v| v.len())
    }
}

/// Collect all entries of `table` whose key starts with `prefix`
pub(crate) fn scan_prefix_in<T>(table: &T, prefix: &[u8]) -> Result<ScanResults, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut results = Vec::new();

    // Use range to get all keys >= prefix
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        let key_bytes = key.value();

        // Stop when we're past the prefix
        if !key_bytes.starts_with(prefix) {
            break;
        }

        results.push((key_bytes.to_vec(), value.value().to_vec()));
    }

    Ok(results)
}

/// Key of the per-diary version index
pub(crate) fn diary_version_key(diary_id: &DiaryId, version_id: &VersionId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(diary_id.as_bytes());
    key[16..].copy_from_slice(version_id.as_bytes());
    key
}

/// Serialize a record for storage
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(value).map_err(StorageError::Encode)
}

/// Deserialize a stored record
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    postcard::from_bytes(bytes).map_err(StorageError::Decode)
}
