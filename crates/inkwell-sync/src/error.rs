//! Error types for inkwell-sync

use thiserror::Error;

use inkwell_storage::StorageError;

/// Errors that can occur while syncing or driving the journal
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The shared object store failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// This device's stream could not be published
    #[error("Failed to upload stream {name}: {reason}")]
    UploadFailed { name: String, reason: String },

    /// A peer stream could not be merged
    #[error("Failed to import stream {name}: {reason}")]
    ImportFailed { name: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
