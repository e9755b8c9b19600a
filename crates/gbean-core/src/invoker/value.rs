use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dynamic value carried through attributes and operations
pub use serde_json::Value;

/// Declared type of an attribute, parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// No value; the return type of setters
    Unit,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
    /// Any JSON value
    Any,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Unit => "unit",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Any => "any",
        }
    }

    /// The narrowest type describing `value`
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Null => ValueType::Unit,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(n) if n.is_f64() => ValueType::Float,
            Value::Number(_) => ValueType::Int,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::List,
            Value::Object(_) => ValueType::Map,
        }
    }

    /// Whether `value` can be passed where this type is declared.
    ///
    /// Reference-like types (string, list, map) accept null.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Unit => value.is_null(),
            ValueType::Bool => value.is_boolean(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Float => value.is_number(),
            ValueType::String => value.is_string() || value.is_null(),
            ValueType::List => value.is_array() || value.is_null(),
            ValueType::Map => value.is_object() || value.is_null(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unit" | "void" => Ok(ValueType::Unit),
            "bool" | "boolean" => Ok(ValueType::Bool),
            "int" | "integer" | "long" => Ok(ValueType::Int),
            "float" | "double" => Ok(ValueType::Float),
            "string" | "str" => Ok(ValueType::String),
            "list" | "array" => Ok(ValueType::List),
            "map" | "object" => Ok(ValueType::Map),
            "any" => Ok(ValueType::Any),
            other => Err(format!("Unknown value type: {}", other)),
        }
    }
}
