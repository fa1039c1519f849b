//! Runtime value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a parameter, scoped variable or return slot.
///
/// `Any` doubles as "no value" when it describes a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Any,
    Integer,
    Float,
    String,
}

impl ValueType {
    /// Parse a type keyword, case-insensitively.
    ///
    /// Accepts `any`, `int`/`integer`, `float` and `string`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "any" => Some(ValueType::Any),
            "int" | "integer" => Some(ValueType::Integer),
            "float" => Some(ValueType::Float),
            "string" => Some(ValueType::String),
            _ => None,
        }
    }

    /// Whether a slot of this declared type can hold a value of type `offered`.
    pub fn accepts(self, offered: ValueType) -> bool {
        self == ValueType::Any || self == offered
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "Any",
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::String => "String",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value
///
/// Strings are owned; assigning a new value drops whatever payload was held before.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    #[default]
    Unset,
    Integer(i32),
    Float(f64),
    String(String),
}

impl Value {
    pub fn set_integer(&mut self, v: i32) {
        *self = Value::Integer(v);
    }

    pub fn set_float(&mut self, v: f64) {
        *self = Value::Float(v);
    }

    pub fn set_string(&mut self, v: impl Into<String>) {
        *self = Value::String(v.into());
    }

    pub fn set_unset(&mut self) {
        *self = Value::Unset;
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Type of the payload; `Unset` reports `Any`.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Unset => ValueType::Any,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
        }
    }

    /// Display name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Integer view. Strings that do not parse read as 0.
    pub fn as_integer(&self) -> i32 {
        match self {
            Value::Unset => 0,
            Value::Integer(i) => *i,
            Value::Float(f) => *f as i32,
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i32>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i32))
                    .unwrap_or(0)
            }
        }
    }

    /// Float view. Strings that do not parse read as 0.0.
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Unset => 0.0,
            Value::Integer(i) => f64::from(*i),
            Value::Float(f) => *f,
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        }
    }

    /// String view. Numbers use their canonical formatting; `Unset` is blank.
    pub fn as_string(&self) -> String {
        match self {
            Value::Unset => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Convert to `target`, leaving `Unset` and `Any` targets untouched.
    pub fn coerce_to(&self, target: ValueType) -> Value {
        match (target, self) {
            (_, Value::Unset) | (ValueType::Any, _) => self.clone(),
            (ValueType::Integer, _) => Value::Integer(self.as_integer()),
            (ValueType::Float, _) => Value::Float(self.as_float()),
            (ValueType::String, _) => Value::String(self.as_string()),
        }
    }

    /// Text form used by annotated parameter listings: floats get an `f`
    /// suffix and strings are quoted with escapes.
    pub fn annotated(&self) -> String {
        match self {
            Value::Unset => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format!("{}f", f),
            Value::String(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '\r' => {}
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        _ => out.push(c),
                    }
                }
                out.push('"');
                out
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
