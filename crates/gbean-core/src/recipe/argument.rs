use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use crate::invoker::value::{Value, ValueType};
use crate::kernel::error::BoxError;
use crate::recipe::error::{ConstructionError, Result};

/// A shared object passed as a property or produced by a recipe
#[derive(Clone)]
pub struct Instance {
    type_name: String,
    object: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("type_name", &self.type_name).finish_non_exhaustive()
    }
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            type_name: type_name::<T>().to_string(),
            object: value,
        }
    }

    pub fn from_handle(type_name: impl Into<String>, object: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            type_name: type_name.into(),
            object,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type id of the wrapped object, not of the `Arc`
    pub fn type_id(&self) -> TypeId {
        (*self.object).type_id()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    pub fn handle(&self) -> Arc<dyn Any + Send + Sync> {
        self.object.clone()
    }
}

/// A resolved property value
#[derive(Debug, Clone)]
pub enum Argument {
    Value(Value),
    Object(Instance),
}

impl Argument {
    pub fn is_null(&self) -> bool {
        matches!(self, Argument::Value(Value::Null))
    }

    fn describe(&self) -> String {
        match self {
            Argument::Value(value) => ValueType::of(value).to_string(),
            Argument::Object(instance) => instance.type_name().to_string(),
        }
    }

    fn value_or_err(&self, expected: &str) -> std::result::Result<&Value, BoxError> {
        match self {
            Argument::Value(value) => Ok(value),
            Argument::Object(instance) => {
                Err(format!("expected {}, got object {}", expected, instance.type_name()).into())
            }
        }
    }

    pub fn string(&self) -> std::result::Result<String, BoxError> {
        self.value_or_err("string")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("expected string, got {}", self.describe()).into())
    }

    pub fn int(&self) -> std::result::Result<i64, BoxError> {
        self.value_or_err("int")?
            .as_i64()
            .ok_or_else(|| format!("expected int, got {}", self.describe()).into())
    }

    pub fn float(&self) -> std::result::Result<f64, BoxError> {
        self.value_or_err("float")?
            .as_f64()
            .ok_or_else(|| format!("expected float, got {}", self.describe()).into())
    }

    pub fn bool(&self) -> std::result::Result<bool, BoxError> {
        self.value_or_err("bool")?
            .as_bool()
            .ok_or_else(|| format!("expected bool, got {}", self.describe()).into())
    }

    pub fn json(&self) -> std::result::Result<Value, BoxError> {
        self.value_or_err("json").cloned()
    }

    pub fn object<T: Any + Send + Sync>(&self) -> std::result::Result<Arc<T>, BoxError> {
        self.optional_object::<T>()?
            .ok_or_else(|| format!("expected {}, got null", type_name::<T>()).into())
    }

    /// Null yields `None`
    pub fn optional_object<T: Any + Send + Sync>(&self) -> std::result::Result<Option<Arc<T>>, BoxError> {
        match self {
            Argument::Value(Value::Null) => Ok(None),
            Argument::Object(instance) => instance
                .downcast::<T>()
                .map(Some)
                .ok_or_else(|| format!("expected {}, got {}", type_name::<T>(), instance.type_name()).into()),
            Argument::Value(value) => {
                Err(format!("expected {}, got {}", type_name::<T>(), ValueType::of(value)).into())
            }
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<Instance> for Argument {
    fn from(instance: Instance) -> Self {
        Argument::Object(instance)
    }
}

/// Declared type of a constructor or setter parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    String,
    /// Any JSON value, passed through unchanged
    Json,
    Object { type_id: TypeId, type_name: &'static str },
}

impl ParamType {
    pub fn object<T: Any>() -> Self {
        ParamType::Object {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::String => "string",
            ParamType::Json => "json",
            ParamType::Object { type_name, .. } => *type_name,
        }
    }

    /// `false`, `0` or `0.0` for primitives, null otherwise
    pub fn default_argument(&self) -> Argument {
        Argument::Value(match self {
            ParamType::Bool => Value::Bool(false),
            ParamType::Int => Value::from(0),
            ParamType::Float => Value::from(0.0),
            _ => Value::Null,
        })
    }

    /// Convert `argument` to this type; strings are parsed into primitives
    pub fn coerce(&self, argument: &Argument) -> Result<Argument> {
        let mismatch = |message: &str| ConstructionError::Conversion {
            expected: self.name().to_string(),
            actual: argument.describe(),
            message: message.to_string(),
        };

        let value = match (self, argument) {
            (ParamType::Object { type_id, .. }, Argument::Object(instance)) => {
                return if instance.type_id() == *type_id {
                    Ok(argument.clone())
                } else {
                    Err(mismatch("object of a different type"))
                };
            }
            (ParamType::Object { .. }, Argument::Value(Value::Null)) => return Ok(argument.clone()),
            (_, Argument::Object(_)) => return Err(mismatch("objects only convert to object parameters")),
            (ParamType::Object { .. }, Argument::Value(_)) => return Err(mismatch("plain values do not convert to objects")),
            (_, Argument::Value(value)) => value,
        };

        let converted = match (self, value) {
            (ParamType::Json, v) => Some(v.clone()),
            (ParamType::String, Value::String(_) | Value::Null) => Some(value.clone()),
            (ParamType::Bool, Value::Bool(_)) => Some(value.clone()),
            (ParamType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (ParamType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (ParamType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (ParamType::Float, Value::Number(n)) => n.as_f64().map(Value::from),
            (ParamType::Float, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::from),
            _ => None,
        };
        converted
            .map(Argument::Value)
            .ok_or_else(|| mismatch("incompatible value"))
    }

    pub fn accepts(&self, argument: &Argument) -> bool {
        self.coerce(argument).is_ok()
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named arguments handed to a constructor or factory method
#[derive(Debug, Clone, Default)]
pub struct Args {
    entries: Vec<(String, Argument)>,
}

impl Args {
    pub(crate) fn new(entries: Vec<(String, Argument)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> std::result::Result<&Argument, BoxError> {
        self.entries
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, argument)| argument)
            .ok_or_else(|| format!("no argument named '{}'", name).into())
    }

    pub fn string(&self, name: &str) -> std::result::Result<String, BoxError> {
        self.get(name)?.string()
    }

    pub fn int(&self, name: &str) -> std::result::Result<i64, BoxError> {
        self.get(name)?.int()
    }

    pub fn float(&self, name: &str) -> std::result::Result<f64, BoxError> {
        self.get(name)?.float()
    }

    pub fn bool(&self, name: &str) -> std::result::Result<bool, BoxError> {
        self.get(name)?.bool()
    }

    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> std::result::Result<Arc<T>, BoxError> {
        self.get(name)?.object::<T>()
    }

    pub fn optional_object<T: Any + Send + Sync>(&self, name: &str) -> std::result::Result<Option<Arc<T>>, BoxError> {
        self.get(name)?.optional_object::<T>()
    }
}
