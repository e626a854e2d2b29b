//! Object store selection for the CLI

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use inkwell_sync::{DirectoryObjectStore, JournalConfig, ObjectStore, RemoteObject, SyncError, SyncResult};

/// Stand-in used when no shared folder is configured
///
/// Local commands never touch the object store, so the journal opens
/// normally and only `sync` reports the missing configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredStore;

fn unconfigured() -> SyncError {
    SyncError::Config(
        "no shared folder configured, pass --shared-dir or set shared_dir in inkwell.toml"
            .to_string(),
    )
}

#[async_trait]
impl ObjectStore for UnconfiguredStore {
    async fn list(&self) -> SyncResult<Vec<RemoteObject>> {
        Err(unconfigured())
    }

    async fn upload(&self, _local_path: &Path, _name: &str) -> SyncResult<String> {
        Err(unconfigured())
    }

    async fn download(&self, _id: &str, _dest_path: &Path) -> SyncResult<()> {
        Err(unconfigured())
    }
}

/// The object store a journal with `config` syncs through
pub async fn object_store_for(config: &JournalConfig) -> SyncResult<Arc<dyn ObjectStore>> {
    match &config.shared_dir {
        Some(dir) => Ok(Arc::new(DirectoryObjectStore::new(dir).await?)),
        None => Ok(Arc::new(UnconfiguredStore)),
    }
}
