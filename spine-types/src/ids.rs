//! Identifier types used throughout spine.
//!
//! Uses UUID v7 so identifiers are unique within (and across) processes and
//! sort by creation time.

use std::fmt;
use uuid::Uuid;

/// Process-local identity of a record.
///
/// Generated once at construction and stable for the record's lifetime.
/// Distinct from the server-assigned identity attribute, which may be absent
/// (a new record) or change after the record joins a set, so a set always
/// indexes its members by client id as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c-{}", self.0)
    }
}

/// Identity of an event hub when it takes part in a listening edge.
///
/// Also used as the opaque "context" token of a binding, which is what
/// `off` filters on when a caller wants to remove everything it bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenId(Uuid);

impl ListenId {
    /// Creates a new listener ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ListenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l-{}", self.0)
    }
}
