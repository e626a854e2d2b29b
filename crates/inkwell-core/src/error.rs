//! Error types for inkwell-core

use thiserror::Error;

/// Errors raised while handling core types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },
}
