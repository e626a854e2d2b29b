//! Identifier types
//!
//! Every identifier in the journal is a UUIDv7: globally unique, generated on
//! the client, and ordered by creation time. Byte-wise ordering of two ids
//! therefore follows the order in which they were minted, which is what the
//! head tie-break relies on.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh, time-ordered identifier
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Get the raw 16 bytes, used as the storage key
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Create from a slice (must be 16 bytes)
            pub fn from_slice(slice: &[u8]) -> Option<Self> {
                Uuid::from_slice(slice).ok().map(Self)
            }

            /// Short display form (last 8 hex chars; the leading ones are a timestamp)
            pub fn short(&self) -> String {
                let simple = self.0.simple().to_string();
                simple[simple.len() - 8..].to_string()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| CoreError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a diary entry, shared by its draft, versions and head
    DiaryId,
    "diary"
);

uuid_id!(
    /// Identifier of one immutable version; never reused
    VersionId,
    "version"
);

uuid_id!(
    /// Identity of this installation's replication stream
    StreamId,
    "stream"
);
