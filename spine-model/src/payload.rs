//! Event payloads.
//!
//! Every record and set hub carries [`Payload`]. The variant is fixed by the
//! event name:
//!
//! | event                 | variant             |
//! |-----------------------|---------------------|
//! | `change:<attr>`       | `AttributeChanged`  |
//! | `change`              | `Changed`           |
//! | `invalid`             | `Invalid`           |
//! | `add`                 | `Added`             |
//! | `remove`              | `Removed`           |
//! | `update`              | `Updated`           |
//! | `sort`                | `Sorted`            |
//! | `reset`               | `Reset`             |
//! | `destroy`             | `Destroyed`         |
//! | `request`             | `Request`           |
//! | `sync`                | `Synced`            |
//! | `error`               | `Failed`            |
//!
//! A set re-emits its members' payloads unchanged.

use crate::collection::RecordSet;
use crate::error::ValidationError;
use crate::options::Options;
use crate::record::Record;
use serde_json::Value;
use spine_events::{Emits, Events};
use spine_sync::{Request, SyncError};
use std::rc::Rc;

/// The entity an event is about when it may be either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Record(Record),
    Set(RecordSet),
}

impl Target {
    pub fn events(&self) -> &Events<Payload> {
        match self {
            Self::Record(record) => record.events(),
            Self::Set(set) => set.events(),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Set(_) => None,
        }
    }

    pub fn as_set(&self) -> Option<&RecordSet> {
        match self {
            Self::Set(set) => Some(set),
            Self::Record(_) => None,
        }
    }
}

/// Membership changes made by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub added: Vec<Record>,
    pub removed: Vec<Record>,
    pub merged: Vec<Record>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.merged.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    AttributeChanged {
        record: Record,
        /// `None` when the attribute was unset.
        value: Option<Value>,
        options: Options,
    },
    Changed {
        record: Record,
        options: Options,
    },
    Invalid {
        target: Target,
        error: ValidationError,
        options: Options,
    },
    Added {
        record: Record,
        collection: RecordSet,
        options: Options,
    },
    Removed {
        record: Record,
        collection: RecordSet,
        index: usize,
        options: Options,
    },
    Updated {
        collection: RecordSet,
        changes: Changes,
        options: Options,
    },
    Sorted {
        collection: RecordSet,
        options: Options,
    },
    Reset {
        collection: RecordSet,
        previous: Vec<Record>,
        options: Options,
    },
    Destroyed {
        record: Record,
        collection: Option<RecordSet>,
        options: Options,
    },
    Request {
        target: Target,
        request: Request,
        options: Options,
    },
    Synced {
        target: Target,
        response: Value,
        options: Options,
    },
    Failed {
        target: Target,
        error: Rc<SyncError>,
        options: Options,
    },
}

impl Payload {
    /// The record the event is about, if it is about one.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::AttributeChanged { record, .. }
            | Self::Changed { record, .. }
            | Self::Added { record, .. }
            | Self::Removed { record, .. }
            | Self::Destroyed { record, .. } => Some(record),
            Self::Invalid { target, .. }
            | Self::Request { target, .. }
            | Self::Synced { target, .. }
            | Self::Failed { target, .. } => target.as_record(),
            Self::Updated { .. } | Self::Sorted { .. } | Self::Reset { .. } => None,
        }
    }

    /// The set the event is about, if any.
    pub fn collection(&self) -> Option<&RecordSet> {
        match self {
            Self::Added { collection, .. }
            | Self::Removed { collection, .. }
            | Self::Updated { collection, .. }
            | Self::Sorted { collection, .. }
            | Self::Reset { collection, .. } => Some(collection),
            Self::Destroyed { collection, .. } => collection.as_ref(),
            Self::Invalid { target, .. }
            | Self::Request { target, .. }
            | Self::Synced { target, .. }
            | Self::Failed { target, .. } => target.as_set(),
            Self::AttributeChanged { .. } | Self::Changed { .. } => None,
        }
    }

    pub fn options(&self) -> &Options {
        match self {
            Self::AttributeChanged { options, .. }
            | Self::Changed { options, .. }
            | Self::Invalid { options, .. }
            | Self::Added { options, .. }
            | Self::Removed { options, .. }
            | Self::Updated { options, .. }
            | Self::Sorted { options, .. }
            | Self::Reset { options, .. }
            | Self::Destroyed { options, .. }
            | Self::Request { options, .. }
            | Self::Synced { options, .. }
            | Self::Failed { options, .. } => options,
        }
    }
}
