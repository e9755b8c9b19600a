//! # GBean Recipe Errors
use thiserror::Error;

use crate::kernel::error::BoxError;

#[derive(Debug, Error)]
pub enum ConstructionError {
    /// No usable setter for a property. `level` grades how close the best
    /// candidate came: 1 arity, 2 returns a value, 3 abstract, 4 not public
    /// or static, 5 value type mismatch.
    #[error("No usable setter for property '{property}' of '{type_name}' (level {level}): {message}")]
    MissingAccessor {
        type_name: String,
        property: String,
        level: u8,
        message: String,
    },

    #[error("No matching constructor for '{type_name}': {message}")]
    NoMatchingConstructor { type_name: String, message: String },

    #[error("Circular reference: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Unknown reference '{0}'")]
    UnknownReference(String),

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Cannot convert {actual} to {expected}: {message}")]
    Conversion {
        expected: String,
        actual: String,
        message: String,
    },

    /// The constructor, factory method, setter or init method failed
    #[error("Failed to instantiate '{type_name}': {source}")]
    Instantiation {
        type_name: String,
        #[source]
        source: BoxError,
    },

    #[error("Init method '{method}' not found on '{type_name}'")]
    MissingInitMethod { type_name: String, method: String },
}

/// Shorthand for Result with the recipe error type
pub type Result<T> = std::result::Result<T, ConstructionError>;
