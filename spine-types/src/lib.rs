//! Core type definitions for spine.
//!
//! This crate defines the small, dependency-light types every other spine
//! crate builds on:
//! - Client and listener identifiers (UUID v7)
//! - The attribute map a record holds, and JSON value helpers that give
//!   attribute comparison, ordering and identity-key semantics
//!
//! Nothing here knows about events, records or transports.

mod ids;
mod value;

pub use ids::{ClientId, ListenId};
pub use value::{Attributes, IdKey, compare_values, into_attributes, values_equal};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("attributes must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
