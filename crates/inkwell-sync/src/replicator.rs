//! Stream replication through the shared object store
//!
//! ## Sync Flow
//!
//! ```text
//! sync_with_cloud()  (skipped if a run is already in progress)
//!   ├─ commit every sealed draft
//!   ├─ export this device's stream, upload as stream_<id>.sqlite3 (fatal)
//!   ├─ list the shared store, keep stream files                  (errors → no peers)
//!   └─ for each peer stream:
//!        download to a temp dir, merge its versions, recompute heads
//!                                                               (errors → logged, skipped)
//! ```
//!
//! Merging is an insert-or-ignore union keyed by version id, so importing the
//! same stream any number of times, in any order, converges on the same state.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use inkwell_core::StreamId;
use inkwell_storage::{EntryStore, ImportedSnapshot};

use crate::error::{SyncError, SyncResult};
use crate::lock::SyncLock;
use crate::object_store::{ObjectStore, RemoteObject};

/// File name prefix of exported streams
pub const STREAM_FILE_PREFIX: &str = "stream_";

/// File extension of exported streams; the contents are a redb snapshot
pub const STREAM_FILE_EXTENSION: &str = ".sqlite3";

/// Name a stream is uploaded under
pub fn stream_file_name(stream_id: &StreamId) -> String {
    format!("{}{}{}", STREAM_FILE_PREFIX, stream_id, STREAM_FILE_EXTENSION)
}

/// Whether `name` is a stream file
///
/// The `stream_` prefix alone decides; the extension is not checked.
pub fn is_stream_file(name: &str) -> bool {
    name.strip_prefix(STREAM_FILE_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

/// Stream id embedded in a stream file name, if it parses
///
/// The id runs from the prefix to the first `.`.
pub fn stream_id_from_name(name: &str) -> Option<StreamId> {
    let rest = name.strip_prefix(STREAM_FILE_PREFIX)?;
    let id = rest.split_once('.').map_or(rest, |(id, _)| id);
    id.parse().ok()
}

/// A stream file found in the shared store
#[derive(Debug, Clone)]
pub struct RemoteStream {
    pub object: RemoteObject,
    /// Id parsed from the file name
    pub stream_id: Option<StreamId>,
}

/// Outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub drafts_committed: usize,
    pub drafts_failed: usize,
    /// Whether this device's stream was uploaded
    pub uploaded: bool,
    /// Versions in the uploaded stream
    pub versions_uploaded: usize,
    /// Peer streams found in the shared store
    pub peers_seen: usize,
    pub peers_imported: usize,
    pub peers_failed: usize,
    /// New versions merged from peers
    pub versions_imported: usize,
    pub heads_changed: usize,
}

/// Directories the replicator works in
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Where the stream export is written before upload
    pub exports_dir: PathBuf,
    /// Parent of the temp directories peer streams are downloaded into
    pub imports_dir: PathBuf,
}

/// Replicates the device stream through an [`ObjectStore`]
pub struct StreamReplicator {
    store: Arc<EntryStore>,
    object_store: Arc<dyn ObjectStore>,
    lock: Arc<SyncLock>,
    config: ReplicatorConfig,
}

impl StreamReplicator {
    pub fn new(
        store: Arc<EntryStore>,
        object_store: Arc<dyn ObjectStore>,
        lock: Arc<SyncLock>,
        config: ReplicatorConfig,
    ) -> Self {
        Self {
            store,
            object_store,
            lock,
            config,
        }
    }

    /// The lock serializing sync runs
    pub fn lock(&self) -> &Arc<SyncLock> {
        &self.lock
    }

    /// Run a full sync
    ///
    /// Returns `Ok(None)` if another sync holds the lock. Only local storage
    /// failures and a failed upload abort the run; peer problems are counted
    /// in the report.
    #[instrument(skip(self), fields(stream = %self.store.stream_id().short()))]
    pub async fn sync_with_cloud(&self) -> SyncResult<Option<SyncReport>> {
        let result = self.lock.with_lock(self.run()).await.transpose();
        if let Ok(None) = result {
            info!("Sync already in progress, skipping");
        }
        result
    }

    async fn run(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();

        let summary = self.store.commit_all_sealed()?;
        report.drafts_committed = summary.committed;
        report.drafts_failed = summary.failed;

        report.versions_uploaded = self.upload_my_stream().await?;
        report.uploaded = true;

        let my_stream = self.store.stream_id();
        for stream in self.list_cloud_streams().await {
            if stream.stream_id == Some(my_stream) {
                continue;
            }
            report.peers_seen += 1;

            match self.download_and_import_stream(&stream).await {
                Ok(imported) => {
                    report.peers_imported += 1;
                    report.versions_imported += imported.merge.imported;
                    report.heads_changed += imported.merge.heads_changed;
                }
                Err(e) => {
                    warn!(stream = %stream.object.name, error = %e, "Skipping peer stream");
                    report.peers_failed += 1;
                }
            }
        }

        info!(
            committed = report.drafts_committed,
            uploaded = report.versions_uploaded,
            peers = report.peers_seen,
            imported = report.versions_imported,
            failed = report.peers_failed,
            heads_changed = report.heads_changed,
            "Sync complete"
        );
        Ok(report)
    }

    /// Export this device's stream and upload it
    ///
    /// Returns the number of versions uploaded.
    #[instrument(skip(self))]
    pub async fn upload_my_stream(&self) -> SyncResult<usize> {
        let name = stream_file_name(&self.store.stream_id());
        let export_path = self.config.exports_dir.join(&name);

        let count = self
            .store
            .export_stream(&export_path)
            .map_err(|e| SyncError::UploadFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        self.object_store
            .upload(&export_path, &name)
            .await
            .map_err(|e| SyncError::UploadFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        debug!(name = %name, versions = count, "Uploaded stream");
        Ok(count)
    }

    /// Stream files in the shared store
    ///
    /// A listing failure is logged and treated as an empty store.
    pub async fn list_cloud_streams(&self) -> Vec<RemoteStream> {
        let objects = match self.object_store.list().await {
            Ok(objects) => objects,
            Err(e) => {
                warn!(error = %e, "Failed to list shared streams");
                return Vec::new();
            }
        };

        objects
            .into_iter()
            .filter(|object| is_stream_file(&object.name))
            .map(|object| RemoteStream {
                stream_id: stream_id_from_name(&object.name),
                object,
            })
            .collect()
    }

    /// Download one peer stream into a temp dir and merge it
    #[instrument(skip(self, stream), fields(name = %stream.object.name))]
    pub async fn download_and_import_stream(
        &self,
        stream: &RemoteStream,
    ) -> SyncResult<ImportedSnapshot> {
        let import_failed = |reason: String| SyncError::ImportFailed {
            name: stream.object.name.clone(),
            reason,
        };

        tokio::fs::create_dir_all(&self.config.imports_dir).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix("import-")
            .tempdir_in(&self.config.imports_dir)?;
        let download_path = temp_dir.path().join(&stream.object.name);

        self.object_store
            .download(&stream.object.id, &download_path)
            .await
            .map_err(|e| import_failed(e.to_string()))?;

        let imported = self
            .store
            .import_snapshot(&download_path)
            .map_err(|e| import_failed(e.to_string()))?;

        if let (Some(named), Some(recorded)) = (stream.stream_id, imported.stream_id)
            && named != recorded
        {
            warn!(named = %named, recorded = %recorded, "Stream file name and contents disagree");
        }

        debug!(
            total = imported.total,
            imported = imported.merge.imported,
            "Imported peer stream"
        );
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_file_naming() {
        let id = StreamId::generate();
        let name = stream_file_name(&id);

        assert!(name.starts_with("stream_"));
        assert_eq!(name, format!("stream_{}.sqlite3", id));
        assert!(is_stream_file(&name));
        assert_eq!(stream_id_from_name(&name), Some(id));
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        assert!(!is_stream_file("notes.txt"));
        assert!(!is_stream_file("stream_"));
        assert!(!is_stream_file("backup_stream_x.sqlite3"));
        assert!(!is_stream_file("Stream_x.sqlite3"));
    }

    #[test]
    fn test_stream_files_are_recognized_by_prefix() {
        let id = StreamId::generate();

        assert!(is_stream_file("stream_x.sqlite3"));
        assert!(is_stream_file(&format!("stream_{}.redb", id)));
        assert!(is_stream_file(&format!("stream_{}", id)));
        assert_eq!(stream_id_from_name(&format!("stream_{}.redb", id)), Some(id));
        assert_eq!(stream_id_from_name(&format!("stream_{}", id)), Some(id));

        // Recognized by name, even if the id does not parse
        assert!(is_stream_file("stream_legacy.sqlite3"));
        assert_eq!(stream_id_from_name("stream_legacy.sqlite3"), None);
    }
}
