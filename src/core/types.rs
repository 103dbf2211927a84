//! Value types and typed values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The closed set of types a variable, argument or return slot can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Number,
    Map,
    List,
}

impl ValueType {
    /// All value types, in declaration order
    pub const ALL: [ValueType; 4] = [
        ValueType::String,
        ValueType::Number,
        ValueType::Map,
        ValueType::List,
    ];

    /// Whether a value of type `other` may be bound to a slot of this type.
    ///
    /// Exact match only: there is no coercion between types.
    pub fn compatible(self, other: ValueType) -> bool {
        self == other
    }

    /// Parse the stored textual form of a value into a typed value
    pub fn parse(self, raw: &str) -> Result<Value, ParseError> {
        let fail = |reason: String| ParseError {
            target: self,
            raw: raw.to_string(),
            reason,
        };

        match self {
            ValueType::String => Ok(Value::String(raw.to_string())),
            ValueType::Number => {
                let number: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| fail("not a number".to_string()))?;
                if !number.is_finite() {
                    return Err(fail("number must be finite".to_string()));
                }
                Ok(Value::Number(number))
            }
            ValueType::Map | ValueType::List => {
                let value: Value =
                    serde_json::from_str(raw).map_err(|e| fail(e.to_string()))?;
                if value.value_type() != self {
                    return Err(fail(format!("expected {}, found {}", self, value.value_type())));
                }
                Ok(value)
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "String",
            ValueType::Number => "Number",
            ValueType::Map => "Map",
            ValueType::List => "List",
        };
        f.write_str(name)
    }
}

/// Free-function form of [`ValueType::compatible`]
pub fn compatible(a: ValueType, b: ValueType) -> bool {
    a.compatible(b)
}

/// Free-function form of [`ValueType::parse`]
pub fn parse(raw: &str, value_type: ValueType) -> Result<Value, ParseError> {
    value_type.parse(raw)
}

/// Text that could not be read as the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot parse {raw:?} as {target}: {reason}")]
pub struct ParseError {
    pub target: ValueType,
    pub raw: String,
    pub reason: String,
}

/// A typed in-memory value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The type this value belongs to
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Number(_) => ValueType::Number,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether every number in this value, nested ones included, is finite
    pub fn is_finite(&self) -> bool {
        match self {
            Value::String(_) => true,
            Value::Number(n) => n.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Map(entries) => entries.values().all(Value::is_finite),
        }
    }

    /// Textual form used in reports and terminal output.
    ///
    /// Integral numbers print without a fraction, nested ones included.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::List(_) | Value::Map(_) => self.to_json().to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                serde_json::Value::from(*n as i64)
            }
            Value::Number(n) => serde_json::Value::from(*n),
            Value::List(items) => items.iter().map(Value::to_json).collect(),
            Value::Map(entries) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
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

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}
