use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of primitive a primary key holds.
///
/// Keys are integers or text; every other value kind is `Unsupported` and
/// never participates in key equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Int,
    String,
    Unsupported,
}

/// A record's primary-key value tagged with its kind.
///
/// Two keys are equal iff their kinds match and their values compare equal
/// under that kind. A key of an `Unsupported` kind is never equal to
/// anything, itself included, which is why `RecordKey` implements
/// `PartialEq` but not `Eq` (the same shape `f64` has because of NaN).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordKey {
    kind: KeyType,
    value: Value,
}

impl RecordKey {
    /// Classifies a value into a key. Integers and text map to their
    /// kinds; everything else becomes `Unsupported`.
    pub fn from_value(value: Value) -> Self {
        let kind = match &value {
            Value::Integer(_) => KeyType::Int,
            Value::Text(_) => KeyType::String,
            _ => KeyType::Unsupported,
        };
        Self { kind, value }
    }

    pub fn int(value: i64) -> Self {
        Self::from_value(Value::Integer(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::from_value(Value::Text(value.into()))
    }

    pub fn kind(&self) -> KeyType {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_supported(&self) -> bool {
        self.kind != KeyType::Unsupported
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.kind, other.kind) {
            (KeyType::Int, KeyType::Int) => match (&self.value, &other.value) {
                (Value::Integer(a), Value::Integer(b)) => a == b,
                _ => false,
            },
            (KeyType::String, KeyType::String) => match (&self.value, &other.value) {
                (Value::Text(a), Value::Text(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Text(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<i32> for RecordKey {
    fn from(v: i32) -> Self {
        Self::int(i64::from(v))
    }
}

impl From<&str> for RecordKey {
    fn from(v: &str) -> Self {
        Self::text(v)
    }
}

impl From<String> for RecordKey {
    fn from(v: String) -> Self {
        Self::text(v)
    }
}
