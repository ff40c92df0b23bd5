//! Observable records and record sets for spine.
//!
//! - [`Record`]: an attribute map that announces every change, tracks what
//!   changed in the last transaction and persists itself through a transport
//! - [`RecordSet`]: an ordered, indexed set of records that re-emits member
//!   events and reconciles itself against server data
//! - [`RecordSchema`]: what records of one kind share: identity attribute,
//!   defaults, hooks, url root and transport
//! - [`Payload`]: the argument every model event carries
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use spine_model::{Callback, Emits, Options, Payload, Record, RecordSchema};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let record = Record::new(&RecordSchema::new(), Default::default());
//! let changes = Rc::new(Cell::new(0));
//! let seen = Rc::clone(&changes);
//! record.on("change:title", &Callback::new(move |_: &str, _: &Payload| {
//!     seen.set(seen.get() + 1);
//! }));
//!
//! record.set_attr("title", json!("draft"), &Options::new());
//! assert_eq!(changes.get(), 1);
//! assert_eq!(record.get("title"), Some(json!("draft")));
//! ```

mod collection;
mod comparator;
mod error;
mod hooks;
mod options;
mod payload;
mod persist;
mod record;
mod schema;

pub use collection::{Entry, Lookup, RecordSet, RecordSetBuilder};
pub use comparator::Comparator;
pub use error::{ModelError, ModelResult, ValidationError};
pub use hooks::{NoHooks, RecordHooks, Validator};
pub use options::Options;
pub use payload::{Changes, Payload, Target};
pub use record::Record;
pub use schema::RecordSchema;

pub use spine_events::{ALL, Callback, Emits};
pub use spine_types::Attributes;
