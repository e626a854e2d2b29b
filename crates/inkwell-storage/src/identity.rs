//! Device stream identity
//!
//! The stream id lives in the local database's metadata so it survives
//! restarts. Each stream log file also records the id it belongs to, which
//! is carried into exported snapshots.

use tracing::info;

use inkwell_core::StreamId;

use super::tables::{RedbStorage, STREAM_ID_KEY};
use crate::error::StorageError;

/// Read the persisted stream id
pub fn load_stream_id(storage: &RedbStorage) -> Result<Option<StreamId>, StorageError> {
    match storage.get_meta(STREAM_ID_KEY)? {
        Some(bytes) => StreamId::from_slice(&bytes)
            .map(Some)
            .ok_or_else(|| StorageError::corrupt("stored stream id is not 16 bytes")),
        None => Ok(None),
    }
}

/// Persist a stream id
pub fn store_stream_id(storage: &RedbStorage, stream_id: &StreamId) -> Result<(), StorageError> {
    storage.put_meta(STREAM_ID_KEY, stream_id.as_bytes())
}

/// Read the stream id, minting and persisting one on first use
pub fn load_or_create_stream_id(storage: &RedbStorage) -> Result<StreamId, StorageError> {
    if let Some(id) = load_stream_id(storage)? {
        return Ok(id);
    }

    let id = StreamId::generate();
    store_stream_id(storage, &id)?;
    info!(stream = %id, "Minted device stream id");
    Ok(id)
}
