//! # Inkwell Storage
//!
//! Durable state for the Inkwell journal, backed by redb.
//!
//! ## Layers
//!
//! - [`DraftStore`]: one mutable working copy per entry, with seal
//! - [`VersionLog`]: append-only, insert-or-ignore history of versions
//! - [`HeadIndex`]: current version of each entry
//! - [`EntryQuery`]: read APIs resolving entries through their heads
//! - [`EntryStore`]: ties the layers together and runs the commit protocol
//!
//! Each device keeps two logs: the local merged log (`local.redb`, which also
//! holds drafts and heads) and its own stream log (`streams/<id>.redb`) with
//! only the versions it authored. Stream logs are exported as snapshot files
//! and merged by other devices.
//!
//! ## Example
//!
//! ```rust,ignore
//! use inkwell_core::EntryFields;
//! use inkwell_storage::{EntryStore, EntryStoreConfig};
//!
//! let store = EntryStore::open(EntryStoreConfig::with_data_dir("./journal"))?;
//! let saved = store.save_draft(None, EntryFields::today().with_content("Hi"))?;
//! let diary_id = saved.saved().unwrap().diary_id;
//!
//! store.seal_draft(&diary_id)?;
//! store.commit(&diary_id)?;
//! assert!(store.query().get_diary(&diary_id)?.is_some());
//! ```

pub mod drafts;
pub mod error;
pub mod heads;
pub mod identity;
pub mod query;
pub mod store;
pub mod tables;
pub mod versions;

pub use drafts::DraftStore;
pub use error::StorageError;
pub use heads::HeadIndex;
pub use query::EntryQuery;
pub use store::{CommitSummary, EntryStore, EntryStoreConfig, ImportedSnapshot, MergeReport};
pub use tables::{CURRENT_SCHEMA_VERSION, RedbStorage, RedbStorageConfig};
pub use versions::{StreamSnapshot, VersionLog};
