//! # Inkwell Sync
//!
//! Multi-device replication for the Inkwell journal, and the [`Journal`]
//! facade front ends use.
//!
//! Every device appends the versions it authors to its own stream. A sync
//! run uploads that stream to a shared [`ObjectStore`] and merges every other
//! device's stream into the local store. Because versions are immutable and
//! merged by id, there is nothing to reconcile: the union is the same no
//! matter how often or in what order streams arrive.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use inkwell_core::EntryFields;
//! use inkwell_sync::{DirectoryObjectStore, Journal, JournalConfig};
//!
//! let shared = Arc::new(DirectoryObjectStore::new("/mnt/shared/inkwell").await?);
//! let journal = Journal::open(JournalConfig::default(), shared)?;
//!
//! let id = journal.save_draft(None, EntryFields::today().with_content("Hi"))?
//!     .saved()
//!     .unwrap()
//!     .diary_id;
//! journal.seal_draft(&id)?;
//!
//! // Commits the sealed draft, uploads, and merges peers
//! if let Some(report) = journal.sync_with_cloud().await? {
//!     println!("imported {} versions", report.versions_imported);
//! }
//! ```

pub mod config;
pub mod error;
pub mod journal;
pub mod lock;
pub mod object_store;
pub mod replicator;

pub use config::{CONFIG_FILE_NAME, JournalConfig};
pub use error::{SyncError, SyncResult};
pub use journal::Journal;
pub use lock::{SyncLock, SyncLockGuard};
pub use object_store::{DirectoryObjectStore, ObjectStore, RemoteObject};
pub use replicator::{
    RemoteStream, ReplicatorConfig, StreamReplicator, SyncReport, is_stream_file,
    stream_file_name, stream_id_from_name,
};
