//! Attribute maps and JSON value semantics.
//!
//! `serde_json::Value`'s own `PartialEq` distinguishes `1` from `1.0`, which
//! is not what change detection wants: a record that holds `1` and is set to
//! `1.0` has not changed. The helpers here define the equality, ordering and
//! identity-key rules the record and set layers rely on.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt;

/// The attribute mapping held by a record. Insertion order is preserved.
pub type Attributes = Map<String, Value>;

/// Deep equality over optional JSON values.
///
/// `None` stands for an absent attribute and is only equal to another
/// `None`. Numbers compare by numeric value regardless of representation.
#[must_use]
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => json_equal(a, b),
        _ => false,
    }
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Total order used when sorting records by an attribute or a key function.
///
/// Values of the same kind compare naturally (numbers numerically, strings
/// lexicographically, arrays element by element). Across kinds the order is
/// bool < number < string < array < object < null, and an absent value sorts
/// after everything.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_json(a, b),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if numbers_equal(x, y) {
                return Ordering::Equal;
            }
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(xs), Value::Array(ys)) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| compare_json(x, y))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Value::Object(xs), Value::Object(ys)) => xs.len().cmp(&ys.len()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Canonical string form of a server identity, used as an index key.
///
/// `"7"` and `7` map to the same key, as do `7` and `7.0`. `null` has no key:
/// a record whose identity attribute is null is indexed by client id only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdKey(String);

impl IdKey {
    /// Derives the key for an identity value, or `None` for `null`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let key = match value {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            Value::Number(n) => number_key(n),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        };
        Some(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn number_key(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for IdKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Converts a JSON value into an attribute map.
///
/// `null` becomes an empty map; any other non-object is rejected.
pub fn into_attributes(value: Value) -> crate::Result<Attributes> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Attributes::new()),
        Value::Bool(_) => Err(crate::Error::NotAnObject("bool")),
        Value::Number(_) => Err(crate::Error::NotAnObject("number")),
        Value::String(_) => Err(crate::Error::NotAnObject("string")),
        Value::Array(_) => Err(crate::Error::NotAnObject("array")),
    }
}
