//! # Inkwell Core
//!
//! Core types shared by every Inkwell crate.
//!
//! The journal keeps each diary entry as a mutable [`Draft`] until it is
//! sealed and committed, after which it lives on as an immutable [`Version`].
//! A [`Head`] points every entry at its current version, and each device
//! exports the versions it authored as a stream identified by a [`StreamId`].
//!
//! ## Key Types
//!
//! - [`DiaryId`], [`VersionId`], [`StreamId`]: time-ordered UUIDv7 identifiers
//! - [`EntryFields`]: the editable content of an entry
//! - [`Draft`] and [`SealState`]: the working copy and its seal lifecycle
//! - [`Version`] and [`Head`]: immutable history and the current pointer
//! - [`Clock`]: time abstraction for testability

pub mod clock;
pub mod draft;
pub mod entry;
pub mod error;
pub mod ids;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use draft::{CommitOutcome, Draft, Rejection, SaveOutcome, SavedDraft, SealInfo, SealState};
pub use entry::{EntryFields, Location, Weather};
pub use error::CoreError;
pub use ids::{DiaryId, StreamId, VersionId};
pub use version::{Head, Version};
