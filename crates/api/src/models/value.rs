use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single property value.
///
/// Conversions between representations follow the lenient rules of a
/// repository value map: a string reads as a boolean when it spells `true`,
/// numbers parse from strings, and a multi-value property reads as its first
/// element when a single value is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Strings(Vec<String>),
}

impl Value {
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Strings(v) => v.first().cloned(),
            Value::Bool(b) => Some(b.to_string()),
            Value::Long(l) => Some(l.to_string()),
            Value::Double(d) => Some(d.to_string()),
        }
    }

    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Value::Strings(v) => v.clone(),
            other => other.as_string().into_iter().collect(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.trim().eq_ignore_ascii_case("true")),
            Value::Strings(v) => v.first().map(|s| s.trim().eq_ignore_ascii_case("true")),
            Value::Long(_) | Value::Double(_) => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            Value::Double(d) => Some(*d as i64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Strings(v) => v.first().and_then(|s| s.trim().parse().ok()),
            Value::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Strings(v) => write!(f, "[{}]", v.join(", ")),
            other => write!(f, "{}", other.as_string().unwrap_or_default()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Strings(v)
    }
}

impl From<&[&str]> for Value {
    fn from(v: &[&str]) -> Self {
        Value::Strings(v.iter().map(|s| s.to_string()).collect())
    }
}

/// The properties of a resource, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueMap(BTreeMap<String, Value>);

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::as_string)
    }

    /// Multi-value read; a single value becomes a one-element list.
    pub fn get_strings(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(Value::as_strings)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_long)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
