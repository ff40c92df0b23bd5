//! Ordered record sets.
//!
//! A [`RecordSet`] keeps an ordered, duplicate-free list of records, an
//! index from client id and server identity to member, and an optional
//! [`Comparator`]. It listens to every member's `"all"` event and re-emits
//! member events as its own, keeping the index current when a member's
//! identity changes and dropping members that are destroyed.

use crate::comparator::Comparator;
use crate::error::{ModelError, ModelResult};
use crate::options::Options;
use crate::payload::{Changes, Payload, Target};
use crate::record::Record;
use crate::schema::RecordSchema;
use serde_json::Value;
use spine_events::{ALL, Callback, Emits, Events};
use spine_sync::Transport;
use spine_types::{Attributes, ClientId, IdKey};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

type ModelIdFn = Rc<dyn Fn(&Attributes) -> Option<Value>>;
type ParseFn = Rc<dyn Fn(Value) -> Value>;

/// Something to put into a set: an existing record, or attributes to build
/// one from.
#[derive(Debug, Clone)]
pub enum Entry {
    Record(Record),
    Attrs(Attributes),
}

impl Entry {
    fn lookup(&self) -> Lookup {
        match self {
            Self::Record(record) => Lookup::Record(record.clone()),
            Self::Attrs(attrs) => Lookup::Attrs(attrs.clone()),
        }
    }

    fn is(&self, record: &Record) -> bool {
        matches!(self, Self::Record(r) if r == record)
    }
}

impl From<Record> for Entry {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<&Record> for Entry {
    fn from(record: &Record) -> Self {
        Self::Record(record.clone())
    }
}

impl From<Attributes> for Entry {
    fn from(attrs: Attributes) -> Self {
        Self::Attrs(attrs)
    }
}

/// A way to find a member.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// A server identity value.
    Id(Value),
    Client(ClientId),
    /// A record, found by identity or else by client id.
    Record(Record),
    /// Attributes, found by the identity they carry.
    Attrs(Attributes),
}

impl From<&Record> for Lookup {
    fn from(record: &Record) -> Self {
        Self::Record(record.clone())
    }
}

impl From<Record> for Lookup {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<ClientId> for Lookup {
    fn from(cid: ClientId) -> Self {
        Self::Client(cid)
    }
}

impl From<Attributes> for Lookup {
    fn from(attrs: Attributes) -> Self {
        Self::Attrs(attrs)
    }
}

impl From<Value> for Lookup {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(attrs) => Self::Attrs(attrs),
            other => Self::Id(other),
        }
    }
}

impl From<&str> for Lookup {
    fn from(id: &str) -> Self {
        Self::Id(Value::String(id.to_owned()))
    }
}

impl From<i32> for Lookup {
    fn from(id: i32) -> Self {
        Self::Id(Value::from(id))
    }
}

impl From<i64> for Lookup {
    fn from(id: i64) -> Self {
        Self::Id(Value::from(id))
    }
}

impl From<u64> for Lookup {
    fn from(id: u64) -> Self {
        Self::Id(Value::from(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Client(ClientId),
    Id(IdKey),
}

#[derive(Clone)]
struct SetConfig {
    schema: RecordSchema,
    url: Option<String>,
    model_id: Option<ModelIdFn>,
    parse: Option<ParseFn>,
    transport: Option<Rc<dyn Transport>>,
}

pub(crate) struct SetInner {
    events: Events<Payload>,
    config: SetConfig,
    comparator: RefCell<Option<Comparator>>,
    models: RefCell<Vec<Record>>,
    by_id: RefCell<HashMap<IndexKey, Record>>,
    on_member: Callback<Payload>,
}

/// Builds a [`RecordSet`].
pub struct RecordSetBuilder {
    config: SetConfig,
    comparator: Option<Comparator>,
    models: Vec<Entry>,
}

impl RecordSetBuilder {
    #[must_use]
    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Overrides how a member's identity is read from its attributes.
    #[must_use]
    pub fn model_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&Attributes) -> Option<Value> + 'static,
    {
        self.config.model_id = Some(Rc::new(f));
        self
    }

    /// Reshapes fetched responses before they become entries.
    ///
    /// Only [`RecordSet::fetch`] and [`RecordSet::parse`] run it. `set` takes
    /// entries that are already split out, and `Options::parse` there runs
    /// each member's schema hook instead.
    #[must_use]
    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.config.parse = Some(Rc::new(f));
        self
    }

    /// Transport for the set's own requests, and for members whose schema
    /// has none.
    #[must_use]
    pub fn transport(mut self, transport: Rc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    /// Initial members, added without events.
    #[must_use]
    pub fn models<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Entry>,
    {
        self.models.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> RecordSet {
        let inner = Rc::new_cyclic(|weak: &Weak<SetInner>| {
            let weak = weak.clone();
            SetInner {
                events: Events::new(),
                config: self.config,
                comparator: RefCell::new(self.comparator),
                models: RefCell::new(Vec::new()),
                by_id: RefCell::new(HashMap::new()),
                on_member: Callback::new(move |name: &str, payload: &Payload| {
                    if let Some(inner) = weak.upgrade() {
                        RecordSet { inner }.on_member_event(name, payload);
                    }
                }),
            }
        });
        let set = RecordSet { inner };
        if !self.models.is_empty() {
            set.reset(self.models, &Options::new().silent());
        }
        set
    }
}

/// A shared handle to an ordered record set.
#[derive(Clone)]
pub struct RecordSet {
    inner: Rc<SetInner>,
}

impl RecordSet {
    pub fn new(schema: RecordSchema) -> Self {
        Self::builder(schema).build()
    }

    pub fn builder(schema: RecordSchema) -> RecordSetBuilder {
        RecordSetBuilder {
            config: SetConfig {
                schema,
                url: None,
                model_id: None,
                parse: None,
                transport: None,
            },
            comparator: None,
            models: Vec::new(),
        }
    }

    pub(crate) fn from_inner(inner: Rc<SetInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<SetInner> {
        Rc::downgrade(&self.inner)
    }

    // ── Configuration ────────────────────────────────────────────

    /// The schema new members are built with.
    pub fn schema(&self) -> &RecordSchema {
        &self.inner.config.schema
    }

    pub fn url(&self) -> Option<&str> {
        self.inner.config.url.as_deref()
    }

    pub fn comparator(&self) -> Option<Comparator> {
        self.inner.comparator.borrow().clone()
    }

    /// Replaces the comparator. Members are not reordered until the next
    /// `sort` or insertion.
    pub fn set_comparator(&self, comparator: Option<Comparator>) {
        self.inner.comparator.replace(comparator);
    }

    pub(crate) fn transport(&self) -> Option<Rc<dyn Transport>> {
        self.inner
            .config
            .transport
            .clone()
            .or_else(|| self.inner.config.schema.transport().cloned())
    }

    /// The identity a member with `attrs` is indexed under.
    pub fn model_id(&self, attrs: &Attributes) -> Option<Value> {
        match &self.inner.config.model_id {
            Some(f) => f(attrs),
            None => attrs
                .get(self.inner.config.schema.id_attribute())
                .cloned(),
        }
    }

    // ── Access ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.inner.models.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.models.borrow().is_empty()
    }

    /// A snapshot of the members in order.
    pub fn models(&self) -> Vec<Record> {
        self.inner.models.borrow().clone()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Record> {
        self.models().into_iter()
    }

    /// The member at `index`; negative indices count from the end.
    pub fn at(&self, index: isize) -> Option<Record> {
        let models = self.inner.models.borrow();
        let index = if index < 0 {
            index + models.len() as isize
        } else {
            index
        };
        usize::try_from(index)
            .ok()
            .and_then(|i| models.get(i).cloned())
    }

    /// Members from `start` up to (excluding) `end`, clamped to the set.
    pub fn slice(&self, start: usize, end: Option<usize>) -> Vec<Record> {
        let models = self.inner.models.borrow();
        let end = end.unwrap_or(models.len()).min(models.len());
        let start = start.min(end);
        models[start..end].to_vec()
    }

    pub fn index_of(&self, record: &Record) -> Option<usize> {
        self.inner.models.borrow().iter().position(|m| m == record)
    }

    /// Finds a member by identity value, client id, record or attributes.
    pub fn get(&self, lookup: impl Into<Lookup>) -> Option<Record> {
        let find = |key: &IndexKey| self.inner.by_id.borrow().get(key).cloned();
        match lookup.into() {
            Lookup::Id(value) => IdKey::from_value(&value).and_then(|k| find(&IndexKey::Id(k))),
            Lookup::Client(cid) => find(&IndexKey::Client(cid)),
            Lookup::Record(record) => self
                .id_key(&record.attributes())
                .and_then(|k| find(&k))
                .or_else(|| find(&IndexKey::Client(record.cid()))),
            Lookup::Attrs(attrs) => self.id_key(&attrs).and_then(|k| find(&k)),
        }
    }

    pub fn contains(&self, lookup: impl Into<Lookup>) -> bool {
        self.get(lookup).is_some()
    }

    /// Members whose attributes include every pair in `attrs`.
    pub fn where_attrs(&self, attrs: &Attributes) -> Vec<Record> {
        self.iter().filter(|r| r.matches(attrs)).collect()
    }

    pub fn find_where(&self, attrs: &Attributes) -> Option<Record> {
        self.iter().find(|r| r.matches(attrs))
    }

    /// One attribute from every member, in order.
    pub fn pluck(&self, attr: &str) -> Vec<Option<Value>> {
        self.iter().map(|r| r.get(attr)).collect()
    }

    /// The members' attributes as a JSON array.
    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(|r| r.to_json()).collect())
    }

    /// A new set with the same configuration and members.
    pub fn clone_set(&self) -> Self {
        RecordSetBuilder {
            config: self.inner.config.clone(),
            comparator: self.comparator(),
            models: self.iter().map(Entry::Record).collect(),
        }
        .build()
    }

    /// Turns a response body into entries: an array of objects, or a single
    /// object. Runs the set's parse hook first.
    pub fn parse(&self, response: Value) -> Vec<Entry> {
        let response = match &self.inner.config.parse {
            Some(f) => f(response),
            None => response,
        };
        entries_from(response)
    }

    // ── Membership ───────────────────────────────────────────────

    /// Reconciles the set with `entries`.
    ///
    /// Entries already present are kept (and, with `merge`, updated in
    /// place); new ones are added when `add` is on; members not mentioned
    /// are removed when `remove` is on. All three default to on. Returns
    /// the member each entry resolved to, skipping entries that failed
    /// validation.
    pub fn set<I>(&self, entries: I, options: &Options) -> Vec<Record>
    where
        I: IntoIterator,
        I::Item: Into<Entry>,
    {
        let entries: Vec<Entry> = entries.into_iter().map(Into::into).collect();
        let add = options.add.unwrap_or(true);
        let remove = options.remove.unwrap_or(true);
        let merge = options.merge.unwrap_or(true);
        let parse = options.parses();

        let len = self.len() as isize;
        let at = options.at.map(|at| {
            let at = if at > len {
                len
            } else if at < 0 {
                at + len + 1
            } else {
                at
            };
            usize::try_from(at).unwrap_or(0)
        });

        let comparator = self.comparator();
        let sortable = comparator.is_some() && at.is_none() && options.sort != Some(false);
        let sort_attr = comparator
            .as_ref()
            .and_then(|c| c.attribute_name().map(str::to_owned));
        let mut sort = false;

        let mut changes = Changes::default();
        let mut order: Vec<Record> = Vec::new();
        let mut seen: HashSet<ClientId> = HashSet::new();
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            if let Some(existing) = self.get(entry.lookup()) {
                if merge && !entry.is(&existing) {
                    let attrs = match entry {
                        Entry::Record(record) => record.attributes(),
                        Entry::Attrs(attrs) => attrs,
                    };
                    let attrs = if parse {
                        existing.parse(Value::Object(attrs), options)
                    } else {
                        attrs
                    };
                    existing.set(attrs, options);
                    changes.merged.push(existing.clone());
                    if sortable && !sort {
                        sort = existing.has_changed(sort_attr.as_deref());
                    }
                }
                if seen.insert(existing.cid()) {
                    order.push(existing.clone());
                }
                results.push(existing);
            } else if add {
                if let Some(record) = self.prepare(entry, options) {
                    self.add_reference(&record);
                    seen.insert(record.cid());
                    order.push(record.clone());
                    changes.added.push(record.clone());
                    results.push(record);
                }
            }
        }

        if remove {
            let stale: Vec<Record> = self
                .inner
                .models
                .borrow()
                .iter()
                .filter(|m| !seen.contains(&m.cid()))
                .cloned()
                .collect();
            if !stale.is_empty() {
                self.remove_models(stale.iter().map(Lookup::from).collect(), options);
            }
            changes.removed = stale;
        }

        // A change listener may have removed members during the merge.
        let indexed = |r: &Record| self.is_indexed(r);
        order.retain(indexed);
        changes.added.retain(indexed);
        changes.merged.retain(indexed);
        results.retain(indexed);

        let mut order_changed = false;
        let replace = !sortable && add && remove;
        if !order.is_empty() && replace {
            let mut models = self.inner.models.borrow_mut();
            // Members appended after the survivors do not count as a reorder.
            order_changed = models.iter().zip(&order).any(|(a, b)| a != b);
            *models = order;
        } else if !changes.added.is_empty() {
            if sortable {
                sort = true;
            }
            let mut models = self.inner.models.borrow_mut();
            let pos = at.unwrap_or(models.len()).min(models.len());
            models.splice(pos..pos, changes.added.iter().cloned());
        }

        let sorted = (sort && self.sort_members()) || order_changed;
        if sorted || !changes.is_empty() {
            debug!(
                set = %self.inner.events.id(),
                added = changes.added.len(),
                removed = changes.removed.len(),
                merged = changes.merged.len(),
                sorted,
                "reconciled"
            );
        }

        if !options.silent {
            for (i, record) in changes.added.iter().enumerate() {
                let mut options = options.clone();
                if let Some(at) = at {
                    options.index = Some(at + i);
                }
                record.events().trigger(
                    "add",
                    &Payload::Added {
                        record: record.clone(),
                        collection: self.clone(),
                        options,
                    },
                );
            }
            if sorted {
                self.inner.events.trigger(
                    "sort",
                    &Payload::Sorted {
                        collection: self.clone(),
                        options: options.clone(),
                    },
                );
            }
            if !changes.is_empty() {
                self.inner.events.trigger(
                    "update",
                    &Payload::Updated {
                        collection: self.clone(),
                        changes,
                        options: options.clone(),
                    },
                );
            }
        }
        results
    }

    /// Adds entries, keeping existing members as they are unless `merge`
    /// is requested.
    pub fn add<I>(&self, entries: I, options: &Options) -> Vec<Record>
    where
        I: IntoIterator,
        I::Item: Into<Entry>,
    {
        let mut options = options.clone();
        options.merge.get_or_insert(false);
        options.add = Some(true);
        options.remove = Some(false);
        self.set(entries, &options)
    }

    /// Removes the given members, emitting `"remove"` for each and a
    /// trailing `"update"`.
    pub fn remove<I>(&self, lookups: I, options: &Options) -> Vec<Record>
    where
        I: IntoIterator,
        I::Item: Into<Lookup>,
    {
        let removed = self.remove_models(lookups.into_iter().map(Into::into).collect(), options);
        if !options.silent && !removed.is_empty() {
            self.inner.events.trigger(
                "update",
                &Payload::Updated {
                    collection: self.clone(),
                    changes: Changes {
                        removed: removed.clone(),
                        ..Changes::default()
                    },
                    options: options.clone(),
                },
            );
        }
        removed
    }

    /// Replaces every member with `entries`, emitting a single `"reset"`.
    pub fn reset<I>(&self, entries: I, options: &Options) -> Vec<Record>
    where
        I: IntoIterator,
        I::Item: Into<Entry>,
    {
        let previous = self.models();
        for record in &previous {
            self.remove_reference(record);
        }
        self.inner.models.borrow_mut().clear();
        self.inner.by_id.borrow_mut().clear();

        let added = self.add(entries, &options.clone().silent());
        if !options.silent {
            self.inner.events.trigger(
                "reset",
                &Payload::Reset {
                    collection: self.clone(),
                    previous,
                    options: options.clone(),
                },
            );
        }
        added
    }

    /// Appends one entry.
    pub fn push(&self, entry: impl Into<Entry>, options: &Options) -> Option<Record> {
        let at = self.len() as isize;
        self.add([entry.into()], &options.clone().at(at))
            .into_iter()
            .next()
    }

    /// Removes and returns the last member.
    pub fn pop(&self, options: &Options) -> Option<Record> {
        let last = self.at(-1)?;
        self.remove([last], options).into_iter().next()
    }

    /// Prepends one entry.
    pub fn unshift(&self, entry: impl Into<Entry>, options: &Options) -> Option<Record> {
        self.add([entry.into()], &options.clone().at(0))
            .into_iter()
            .next()
    }

    /// Removes and returns the first member.
    pub fn shift(&self, options: &Options) -> Option<Record> {
        let first = self.at(0)?;
        self.remove([first], options).into_iter().next()
    }

    /// Reorders the members by the comparator.
    ///
    /// The members are detached from the set while the comparator runs, so
    /// a comparator that inspects the set sees it empty.
    pub fn sort(&self, options: &Options) -> ModelResult<()> {
        if self.inner.comparator.borrow().is_none() {
            return Err(ModelError::MissingComparator);
        }
        self.sort_members();
        if !options.silent {
            self.inner.events.trigger(
                "sort",
                &Payload::Sorted {
                    collection: self.clone(),
                    options: options.clone(),
                },
            );
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn id_key(&self, attrs: &Attributes) -> Option<IndexKey> {
        self.model_id(attrs)
            .as_ref()
            .and_then(IdKey::from_value)
            .map(IndexKey::Id)
    }

    fn is_indexed(&self, record: &Record) -> bool {
        self.inner
            .by_id
            .borrow()
            .contains_key(&IndexKey::Client(record.cid()))
    }

    /// Returns whether the order changed.
    fn sort_members(&self) -> bool {
        let Some(comparator) = self.comparator() else {
            return false;
        };
        let before = self.inner.models.take();
        let mut members = before.clone();
        comparator.sort(&mut members);
        let changed = members != before;
        *self.inner.models.borrow_mut() = members;
        changed
    }

    /// Resolves an entry to a record that can join this set.
    pub(crate) fn prepare(&self, entry: Entry, options: &Options) -> Option<Record> {
        match entry {
            Entry::Record(record) => {
                if record.collection().is_none() {
                    record.set_collection(self);
                }
                Some(record)
            }
            Entry::Attrs(attrs) => {
                let record = Record::build(&self.inner.config.schema, attrs, options, Some(self));
                let Some(error) = record.validation_error() else {
                    return Some(record);
                };
                let mut options = options.clone();
                options.validation_error = Some(error.clone());
                self.inner.events.trigger(
                    "invalid",
                    &Payload::Invalid {
                        target: Target::Set(self.clone()),
                        error,
                        options,
                    },
                );
                None
            }
        }
    }

    fn add_reference(&self, record: &Record) {
        let id = self.id_key(&record.attributes());
        {
            let mut by_id = self.inner.by_id.borrow_mut();
            by_id.insert(IndexKey::Client(record.cid()), record.clone());
            if let Some(id) = id {
                by_id.insert(id, record.clone());
            }
        }
        record
            .events()
            .on_with_context(ALL, &self.inner.on_member, self.inner.events.id());
    }

    fn remove_reference(&self, record: &Record) {
        self.unindex(record);
        record.release_collection(self);
        record.events().off(
            Some(ALL),
            Some(&self.inner.on_member),
            Some(self.inner.events.id()),
        );
    }

    fn unindex(&self, record: &Record) {
        let id = self.id_key(&record.attributes());
        let mut by_id = self.inner.by_id.borrow_mut();
        by_id.remove(&IndexKey::Client(record.cid()));
        if let Some(id) = id {
            by_id.remove(&id);
        }
    }

    fn remove_models(&self, lookups: Vec<Lookup>, options: &Options) -> Vec<Record> {
        let mut removed = Vec::new();
        for lookup in lookups {
            let Some(record) = self.get(lookup) else {
                continue;
            };
            let index = {
                let mut models = self.inner.models.borrow_mut();
                let Some(index) = models.iter().position(|m| m == &record) else {
                    continue;
                };
                models.remove(index);
                index
            };
            self.unindex(&record);
            if !options.silent {
                let mut options = options.clone();
                options.index = Some(index);
                record.events().trigger(
                    "remove",
                    &Payload::Removed {
                        record: record.clone(),
                        collection: self.clone(),
                        index,
                        options,
                    },
                );
            }
            self.remove_reference(&record);
            removed.push(record);
        }
        removed
    }

    fn rekey(&self, record: &Record) {
        let previous = self.id_key(&record.previous_attributes());
        let current = self.id_key(&record.attributes());
        if previous == current {
            return;
        }
        let mut by_id = self.inner.by_id.borrow_mut();
        if let Some(key) = &previous {
            by_id.remove(key);
        }
        if let Some(key) = current {
            by_id.insert(key, record.clone());
        }
        debug!(cid = %record.cid(), "member identity changed, index updated");
    }

    fn on_member_event(&self, name: &str, payload: &Payload) {
        if let Some(record) = payload.record() {
            if (name == "add" || name == "remove") && payload.collection() != Some(self) {
                return;
            }
            if name == "destroy" {
                self.remove([record], payload.options());
            }
            if name == "change" {
                self.rekey(record);
            }
        }
        self.inner.events.trigger(name, payload);
    }
}

pub(crate) fn entries_from(response: Value) -> Vec<Entry> {
    match response {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(attrs) => Some(Entry::Attrs(attrs)),
                other => {
                    warn!(item = %other, "ignoring non-object item in response");
                    None
                }
            })
            .collect(),
        Value::Object(attrs) => vec![Entry::Attrs(attrs)],
        Value::Null => Vec::new(),
        other => {
            warn!(response = %other, "ignoring non-collection response");
            Vec::new()
        }
    }
}

impl Emits<Payload> for RecordSet {
    fn events(&self) -> &Events<Payload> {
        &self.inner.events
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for RecordSet {}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSet")
            .field("id", &self.inner.events.id())
            .field("len", &self.inner.models.try_borrow().map_or(0, |m| m.len()))
            .field("url", &self.inner.config.url)
            .field("comparator", &*self.inner.comparator.borrow())
            .finish()
    }
}
