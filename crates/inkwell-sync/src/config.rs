//! Configuration for a journal

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use inkwell_storage::EntryStoreConfig;

use crate::error::{SyncError, SyncResult};
use crate::replicator::ReplicatorConfig;

/// Name of the optional config file inside the data directory
pub const CONFIG_FILE_NAME: &str = "inkwell.toml";

/// Configuration for a [`Journal`](crate::Journal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Directory holding every database and working file
    pub data_dir: PathBuf,
    /// Shared folder used as the object store, if syncing through one
    pub shared_dir: Option<PathBuf>,
    /// redb cache size per database, in bytes
    pub cache_size: usize,
    /// Default tracing filter for front ends
    pub log_filter: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self::with_data_dir(Self::default_data_dir())
    }
}

impl JournalConfig {
    /// Create a configuration with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            shared_dir: None,
            cache_size: EntryStoreConfig::default().cache_size,
            log_filter: "warn".to_string(),
        }
    }

    /// Platform data directory, falling back to the working directory
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|dir| dir.join("inkwell"))
            .unwrap_or_else(|| PathBuf::from("./inkwell-data"))
    }

    /// Set the shared folder
    pub fn with_shared_dir(mut self, shared_dir: impl Into<PathBuf>) -> Self {
        self.shared_dir = Some(shared_dir.into());
        self
    }

    /// Set the redb cache size
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Set the default log filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Where stream exports are written before upload
    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    /// Where peer streams are downloaded for import
    pub fn imports_dir(&self) -> PathBuf {
        self.data_dir.join("imports")
    }

    /// Storage configuration derived from this one
    pub fn store_config(&self) -> EntryStoreConfig {
        EntryStoreConfig {
            data_dir: self.data_dir.clone(),
            cache_size: self.cache_size,
        }
    }

    /// Replicator configuration derived from this one
    pub fn replicator_config(&self) -> ReplicatorConfig {
        ReplicatorConfig {
            exports_dir: self.exports_dir(),
            imports_dir: self.imports_dir(),
        }
    }

    /// Parse a TOML config file
    pub fn load(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text).map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `inkwell.toml` from `data_dir` if present, else use defaults there
    pub fn load_or_default(data_dir: impl Into<PathBuf>) -> SyncResult<Self> {
        let data_dir = data_dir.into();
        let path = data_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            let mut config = Self::load(&path)?;
            config.data_dir = data_dir;
            Ok(config)
        } else {
            Ok(Self::with_data_dir(data_dir))
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> SyncResult<String> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }
}
