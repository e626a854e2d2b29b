//! Shared object store used to exchange stream files
//!
//! The replicator only needs three operations: list what is there, upload a
//! file under a name, and download an object by id. Delivery is
//! at-least-once and any call may fail or be slow.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::error::{SyncError, SyncResult};

/// An object listed in the shared store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Store-specific handle used to download the object
    pub id: String,
    /// File name the object was uploaded under
    pub name: String,
    /// Last modification time, if the store reports one
    pub modified_at: Option<DateTime<Utc>>,
}

/// External file store shared by every device of a journal
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in the store
    async fn list(&self) -> SyncResult<Vec<RemoteObject>>;

    /// Upload a local file under `name`, replacing any object of that name
    ///
    /// Returns the id of the stored object.
    async fn upload(&self, local_path: &Path, name: &str) -> SyncResult<String>;

    /// Download an object to `dest_path`
    async fn download(&self, id: &str, dest_path: &Path) -> SyncResult<()>;
}

/// Object store over a shared directory
///
/// Any folder every device can reach works: a network share, or a folder
/// kept in step by a file sync client. Object ids are file names.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> SyncResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        info!(path = %root.display(), "Directory object store initialized");
        Ok(Self { root })
    }

    /// Directory backing the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> SyncResult<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(SyncError::ObjectStore(format!("invalid object name: {:?}", name)));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn list(&self) -> SyncResult<Vec<RemoteObject>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| SyncError::ObjectStore(e.to_string()))?;

        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::ObjectStore(e.to_string()))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            // In-flight uploads
            if name.starts_with('.') {
                continue;
            }

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| SyncError::ObjectStore(e.to_string()))?;
            if !metadata.is_file() {
                continue;
            }

            objects.push(RemoteObject {
                id: name.clone(),
                name,
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    #[instrument(skip(self), fields(local = %local_path.display()))]
    async fn upload(&self, local_path: &Path, name: &str) -> SyncResult<String> {
        let dest = self.object_path(name)?;

        // Write atomically (copy to a hidden temp name, then rename)
        let temp_path = self.root.join(format!(".{}.tmp", name));
        fs::copy(local_path, &temp_path)
            .await
            .map_err(|e| SyncError::ObjectStore(e.to_string()))?;
        fs::rename(&temp_path, &dest)
            .await
            .map_err(|e| SyncError::ObjectStore(e.to_string()))?;

        debug!("Uploaded object");
        Ok(name.to_string())
    }

    #[instrument(skip(self), fields(dest = %dest_path.display()))]
    async fn download(&self, id: &str, dest_path: &Path) -> SyncResult<()> {
        let source = self.object_path(id)?;
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(&source, dest_path)
            .await
            .map_err(|e| SyncError::ObjectStore(format!("{}: {}", id, e)))?;

        debug!("Downloaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (DirectoryObjectStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryObjectStore::new(temp_dir.path().join("shared"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_upload_list_download() {
        let (store, temp) = create_test_store().await;
        let local = temp.path().join("local.bin");
        fs::write(&local, b"stream bytes").await.unwrap();

        let id = store.upload(&local, "stream_a.redb").await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].name, "stream_a.redb");
        assert!(listed[0].modified_at.is_some());

        let dest = temp.path().join("downloads").join("copy.bin");
        store.download(&id, &dest).await.unwrap();
        assert_eq!(fs::read(&dest).await.unwrap(), b"stream bytes");
    }

    #[tokio::test]
    async fn test_upload_same_name_replaces() {
        let (store, temp) = create_test_store().await;
        let local = temp.path().join("local.bin");

        fs::write(&local, b"v1").await.unwrap();
        store.upload(&local, "stream_a.redb").await.unwrap();
        fs::write(&local, b"v2").await.unwrap();
        let id = store.upload(&local, "stream_a.redb").await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        let dest = temp.path().join("out.bin");
        store.download(&id, &dest).await.unwrap();
        assert_eq!(fs::read(&dest).await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_list_skips_hidden_and_directories() {
        let (store, _temp) = create_test_store().await;
        fs::write(store.root().join(".partial.tmp"), b"x").await.unwrap();
        fs::create_dir(store.root().join("nested")).await.unwrap();
        fs::write(store.root().join("visible.txt"), b"x").await.unwrap();

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["visible.txt"]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let (store, temp) = create_test_store().await;
        let local = temp.path().join("local.bin");
        fs::write(&local, b"x").await.unwrap();

        assert!(store.upload(&local, "../escape").await.is_err());
        assert!(store.download("", &temp.path().join("o")).await.is_err());
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let (store, temp) = create_test_store().await;
        let err = store
            .download("stream_gone.redb", &temp.path().join("o"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ObjectStore(_)));
    }
}
