//! Observable records.
//!
//! A [`Record`] holds an attribute map and announces every change to it.
//! Mutation goes through [`Record::set`], which runs as a transaction:
//!
//! - the outermost `set` snapshots the attributes; `previous_attributes` and
//!   `changed` are relative to that snapshot until the outermost call returns
//! - `set` calls made from inside `"change"` listeners join the open
//!   transaction instead of starting their own
//! - the outermost call emits `"change"` in a loop until no listener has
//!   made a further change, so chains of reactions settle without recursion

use crate::collection::{RecordSet, SetInner};
use crate::error::ValidationError;
use crate::options::Options;
use crate::payload::{Payload, Target};
use crate::schema::RecordSchema;
use serde_json::Value;
use spine_events::{Emits, Events};
use spine_types::{Attributes, ClientId, IdKey, into_attributes, values_equal};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

pub(crate) struct RecordInner {
    cid: ClientId,
    events: Events<Payload>,
    schema: RecordSchema,
    attributes: RefCell<Attributes>,
    previous: RefCell<Attributes>,
    changed: RefCell<Attributes>,
    changing: Cell<bool>,
    pending: RefCell<Option<Options>>,
    id: RefCell<Option<Value>>,
    validation_error: RefCell<Option<ValidationError>>,
    collection: RefCell<Weak<SetInner>>,
}

/// A shared handle to an observable record.
///
/// Clones refer to the same record; equality is identity.
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

impl Record {
    /// Creates a record from `attrs` laid over the schema's defaults.
    pub fn new(schema: &RecordSchema, attrs: Attributes) -> Self {
        Self::build(schema, attrs, &Options::default(), None)
    }

    /// Like [`new`](Self::new), honoring `parse` and `validate`.
    ///
    /// A record that fails validation is still created; its
    /// [`validation_error`](Self::validation_error) says why.
    pub fn with_options(schema: &RecordSchema, attrs: Attributes, options: &Options) -> Self {
        Self::build(schema, attrs, options, None)
    }

    pub(crate) fn build(
        schema: &RecordSchema,
        attrs: Attributes,
        options: &Options,
        collection: Option<&RecordSet>,
    ) -> Self {
        let record = Self {
            inner: Rc::new(RecordInner {
                cid: ClientId::new(),
                events: Events::new(),
                schema: schema.clone(),
                attributes: RefCell::new(Attributes::new()),
                previous: RefCell::new(Attributes::new()),
                changed: RefCell::new(Attributes::new()),
                changing: Cell::new(false),
                pending: RefCell::new(None),
                id: RefCell::new(None),
                validation_error: RefCell::new(None),
                collection: RefCell::new(Weak::new()),
            }),
        };
        if let Some(set) = collection {
            record.set_collection(set);
        }

        let attrs = if options.parses() {
            record.parse(Value::Object(attrs), options)
        } else {
            attrs
        };
        let mut initial = schema.defaults().clone();
        initial.extend(attrs);
        record.set(initial, options);
        record.inner.changed.borrow_mut().clear();
        record
    }

    // ── Identity ─────────────────────────────────────────────────

    /// Process-local identity, stable for the record's lifetime.
    pub fn cid(&self) -> ClientId {
        self.inner.cid
    }

    /// The server-assigned identity, if the identity attribute is set.
    pub fn id(&self) -> Option<Value> {
        self.inner.id.borrow().clone()
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.inner.schema
    }

    /// Whether the record has never been saved (no identity attribute).
    pub fn is_new(&self) -> bool {
        !self.has(self.inner.schema.id_attribute())
    }

    /// The set this record belongs to, if it is still alive.
    pub fn collection(&self) -> Option<RecordSet> {
        self.inner
            .collection
            .borrow()
            .upgrade()
            .map(RecordSet::from_inner)
    }

    pub(crate) fn set_collection(&self, set: &RecordSet) {
        *self.inner.collection.borrow_mut() = set.downgrade();
    }

    pub(crate) fn release_collection(&self, set: &RecordSet) {
        if self.collection().as_ref() == Some(set) {
            *self.inner.collection.borrow_mut() = Weak::new();
        }
    }

    // ── Reading ──────────────────────────────────────────────────

    pub fn get(&self, attr: &str) -> Option<Value> {
        self.inner.attributes.borrow().get(attr).cloned()
    }

    /// Whether `attr` is present and not null.
    pub fn has(&self, attr: &str) -> bool {
        self.inner
            .attributes
            .borrow()
            .get(attr)
            .is_some_and(|v| !v.is_null())
    }

    /// A copy of the current attributes.
    pub fn attributes(&self) -> Attributes {
        self.inner.attributes.borrow().clone()
    }

    /// Whether every attribute in `attrs` equals the record's.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        let current = self.inner.attributes.borrow();
        attrs
            .iter()
            .all(|(k, v)| values_equal(current.get(k), Some(v)))
    }

    /// The attributes as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// A new record of the same schema holding a copy of the attributes.
    ///
    /// The copy has its own client id, no listeners and no set.
    pub fn clone_record(&self) -> Self {
        Self::new(&self.inner.schema, self.attributes())
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Applies `attrs` and announces the changes.
    ///
    /// Returns `false`, leaving the record untouched, when `options`
    /// requests validation and the hook rejects the result.
    pub fn set(&self, attrs: Attributes, options: &Options) -> bool {
        if !self.validate_with(&attrs, options) {
            return false;
        }

        let inner = &self.inner;
        let id_attribute = inner.schema.id_attribute();
        let touches_id = attrs.contains_key(id_attribute);
        let changing = inner.changing.replace(true);
        if !changing {
            trace!(cid = %inner.cid, "transaction opened");
            *inner.previous.borrow_mut() = inner.attributes.borrow().clone();
            inner.changed.borrow_mut().clear();
        }

        let mut changes = Vec::new();
        {
            let mut current = inner.attributes.borrow_mut();
            let mut changed = inner.changed.borrow_mut();
            let previous = inner.previous.borrow();
            for (key, value) in attrs {
                let incoming = (!options.unset).then_some(&value);
                if !values_equal(current.get(&key), incoming) {
                    changes.push(key.clone());
                }
                if values_equal(previous.get(&key), incoming) {
                    changed.shift_remove(&key);
                } else {
                    changed.insert(key.clone(), incoming.cloned().unwrap_or(Value::Null));
                }
                if options.unset {
                    current.shift_remove(&key);
                } else {
                    current.insert(key, value);
                }
            }
            if touches_id {
                *inner.id.borrow_mut() = current.get(id_attribute).cloned();
            }
        }

        if !options.silent {
            if !changes.is_empty() {
                *inner.pending.borrow_mut() = Some(options.clone());
            }
            for key in changes {
                let value = self.get(&key);
                inner.events.trigger(
                    &format!("change:{key}"),
                    &Payload::AttributeChanged {
                        record: self.clone(),
                        value,
                        options: options.clone(),
                    },
                );
            }
        }

        if changing {
            return true;
        }

        if !options.silent {
            while let Some(pending) = inner.pending.take() {
                trace!(cid = %inner.cid, "change settled");
                inner.events.trigger(
                    "change",
                    &Payload::Changed {
                        record: self.clone(),
                        options: pending,
                    },
                );
            }
        }
        inner.pending.replace(None);
        inner.changing.set(false);
        true
    }

    /// Sets a single attribute.
    pub fn set_attr(&self, attr: &str, value: Value, options: &Options) -> bool {
        let mut attrs = Attributes::new();
        attrs.insert(attr.to_owned(), value);
        self.set(attrs, options)
    }

    /// Removes one attribute.
    pub fn unset(&self, attr: &str, options: &Options) -> bool {
        self.set_attr(attr, Value::Null, &options.clone().unset())
    }

    /// Removes every attribute.
    pub fn clear(&self, options: &Options) -> bool {
        let attrs = self
            .inner
            .attributes
            .borrow()
            .keys()
            .map(|k| (k.clone(), Value::Null))
            .collect();
        self.set(attrs, &options.clone().unset())
    }

    // ── Change tracking ──────────────────────────────────────────

    /// Whether `attr` (or, with `None`, anything) changed in the last
    /// transaction.
    pub fn has_changed(&self, attr: Option<&str>) -> bool {
        let changed = self.inner.changed.borrow();
        match attr {
            Some(attr) => changed.contains_key(attr),
            None => !changed.is_empty(),
        }
    }

    /// The attributes changed in the last transaction. Unset attributes
    /// appear as `null`.
    pub fn changed(&self) -> Attributes {
        self.inner.changed.borrow().clone()
    }

    /// Without `diff`, the changed attributes or `None` if nothing changed.
    ///
    /// With `diff`, the subset of it that differs from the record (from the
    /// transaction snapshot while one is open), or `None` if none does.
    pub fn changed_attributes(&self, diff: Option<&Attributes>) -> Option<Attributes> {
        let Some(diff) = diff else {
            let changed = self.changed();
            return (!changed.is_empty()).then_some(changed);
        };
        let old = if self.inner.changing.get() {
            self.inner.previous.borrow()
        } else {
            self.inner.attributes.borrow()
        };
        let delta: Attributes = diff
            .iter()
            .filter(|(k, v)| !values_equal(old.get(k.as_str()), Some(*v)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        (!delta.is_empty()).then_some(delta)
    }

    /// The value of `attr` before the last transaction.
    pub fn previous(&self, attr: &str) -> Option<Value> {
        self.inner.previous.borrow().get(attr).cloned()
    }

    /// A copy of the attributes before the last transaction.
    pub fn previous_attributes(&self) -> Attributes {
        self.inner.previous.borrow().clone()
    }

    // ── Validation ───────────────────────────────────────────────

    /// Runs validation against the current attributes.
    pub fn is_valid(&self, options: &Options) -> bool {
        self.validate_with(&Attributes::new(), &options.clone().validate(true))
    }

    /// The error from the most recent failed validation, cleared by the next
    /// successful one.
    pub fn validation_error(&self) -> Option<ValidationError> {
        self.inner.validation_error.borrow().clone()
    }

    pub(crate) fn validate_with(&self, attrs: &Attributes, options: &Options) -> bool {
        if !options.validates() {
            return true;
        }
        let mut candidate = self.attributes();
        for (key, value) in attrs {
            if options.unset {
                candidate.shift_remove(key);
            } else {
                candidate.insert(key.clone(), value.clone());
            }
        }

        match self.inner.schema.hooks().validate(&candidate, options) {
            Ok(()) => {
                self.inner.validation_error.replace(None);
                true
            }
            Err(error) => {
                debug!(cid = %self.inner.cid, error = %error, "validation failed");
                self.inner.validation_error.replace(Some(error.clone()));
                if !options.silent {
                    let mut options = options.clone();
                    options.validation_error = Some(error.clone());
                    self.inner.events.trigger(
                        "invalid",
                        &Payload::Invalid {
                            target: Target::Record(self.clone()),
                            error,
                            options,
                        },
                    );
                }
                false
            }
        }
    }

    // ── Server data ──────────────────────────────────────────────

    /// Runs the schema's parse hook over server data.
    ///
    /// `null` yields no attributes; any other non-object is dropped with a
    /// warning.
    pub fn parse(&self, response: Value, options: &Options) -> Attributes {
        let parsed = self.inner.schema.hooks().parse(response, options);
        into_attributes(parsed).unwrap_or_else(|e| {
            warn!(cid = %self.inner.cid, error = %e, "ignoring server data");
            Attributes::new()
        })
    }

    /// Where this record lives on the server: the schema's `url_root` (or
    /// else its set's url), plus the escaped identity unless the record is
    /// new.
    pub fn url(&self) -> crate::ModelResult<String> {
        self.url_for(&self.inner.attributes.borrow())
    }

    pub(crate) fn url_for(&self, attrs: &Attributes) -> crate::ModelResult<String> {
        let base = match self.inner.schema.url_root() {
            Some(root) => root.to_owned(),
            None => self
                .collection()
                .and_then(|set| set.url().map(str::to_owned))
                .ok_or(crate::ModelError::MissingUrl)?,
        };
        let id = attrs
            .get(self.inner.schema.id_attribute())
            .and_then(IdKey::from_value);
        let Some(id) = id else {
            return Ok(base);
        };
        let separator = if base.ends_with('/') { "" } else { "/" };
        Ok(format!("{base}{separator}{}", urlencoding::encode(id.as_str())))
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Emits<Payload> for Record {
    fn events(&self) -> &Events<Payload> {
        &self.inner.events
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Record");
        s.field("cid", &self.inner.cid);
        match self.inner.attributes.try_borrow() {
            Ok(attrs) => s.field("attributes", &*attrs),
            Err(_) => s.field("attributes", &"<borrowed>"),
        };
        s.finish()
    }
}
