//! Storage errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the draft store, version logs and head index
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    /// A database that must already exist (a downloaded snapshot) is absent
    #[error("Database file not found: {}", .0.display())]
    MissingDatabase(PathBuf),

    #[error("Failed to encode row: {0}")]
    Encode(#[source] postcard::Error),

    #[error("Failed to decode row: {0}")]
    Decode(#[source] postcard::Error),

    /// Any redb failure: open, transaction, table, commit
    #[error("Database error: {0}")]
    Database(String),

    /// The database was written by a newer schema than this build understands
    #[error("Unsupported schema version {found} (this build supports up to {supported})")]
    SchemaMismatch { found: u32, supported: u32 },

    /// Stored rows contradict each other
    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

// redb reports each stage with its own type
macro_rules! redb_errors {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    StorageError::Database(err.to_string())
                }
            }
        )+
    };
}

redb_errors!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
