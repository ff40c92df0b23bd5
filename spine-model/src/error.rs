use serde::{Deserialize, Serialize};
use serde_json::Value;
use spine_events::EventsError;
use spine_sync::SyncError;
use thiserror::Error;

/// Result type for record and set operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Misuse of the record/set API.
///
/// Data problems never show up here: failed validation is reported through
/// `"invalid"` events and transport failures through `"error"` events.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot sort a set without a comparator")]
    MissingComparator,

    #[error("a url or url_root must be specified")]
    MissingUrl,

    #[error("no transport configured")]
    MissingTransport,

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Subscribe(#[from] EventsError),
}

/// A rejection returned by a record's validation hook.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attribute: None,
            details: None,
        }
    }

    /// A rejection blamed on one attribute.
    pub fn for_attribute(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
