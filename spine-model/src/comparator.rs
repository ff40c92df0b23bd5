use crate::record::Record;
use serde_json::Value;
use spine_types::compare_values;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

type KeyFn = Rc<dyn Fn(&Record) -> Value>;
type OrderFn = Rc<dyn Fn(&Record, &Record) -> Ordering>;

/// The order a [`RecordSet`](crate::RecordSet) keeps its members in.
#[derive(Clone)]
pub enum Comparator {
    /// Stable sort by the value of one attribute. Members missing it sort
    /// last.
    Attribute(String),
    /// Stable sort by a derived key.
    Key(KeyFn),
    /// A two-argument order.
    Order(OrderFn),
}

impl Comparator {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    pub fn key<F>(f: F) -> Self
    where
        F: Fn(&Record) -> Value + 'static,
    {
        Self::Key(Rc::new(f))
    }

    pub fn order<F>(f: F) -> Self
    where
        F: Fn(&Record, &Record) -> Ordering + 'static,
    {
        Self::Order(Rc::new(f))
    }

    /// The attribute this comparator sorts by, when it names one.
    pub fn attribute_name(&self) -> Option<&str> {
        match self {
            Self::Attribute(name) => Some(name),
            _ => None,
        }
    }

    pub(crate) fn sort(&self, members: &mut Vec<Record>) {
        match self {
            Self::Attribute(name) => sort_by_key(members, |r| r.get(name)),
            Self::Key(key) => sort_by_key(members, |r| Some(key(r))),
            Self::Order(order) => members.sort_by(|a, b| order(a, b)),
        }
    }
}

fn sort_by_key(members: &mut Vec<Record>, key: impl Fn(&Record) -> Option<Value>) {
    let mut keyed: Vec<(Option<Value>, Record)> =
        members.drain(..).map(|r| (key(&r), r)).collect();
    keyed.sort_by(|(a, _), (b, _)| compare_values(a.as_ref(), b.as_ref()));
    members.extend(keyed.into_iter().map(|(_, r)| r));
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            Self::Key(_) => f.write_str("Key(..)"),
            Self::Order(_) => f.write_str("Order(..)"),
        }
    }
}
