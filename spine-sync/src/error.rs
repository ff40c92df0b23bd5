//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Transport failures reach records through their `"error"` event rather
/// than as return values, so this type is also what error listeners see.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// The request was abandoned before it completed.
    #[error("request aborted")]
    Aborted,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML.
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SyncError {
    /// The HTTP status, when the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
