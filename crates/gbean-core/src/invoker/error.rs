//! # GBean Invoker Errors
//!
//! Errors raised while building a [`ServiceInvoker`](crate::invoker::ServiceInvoker)
//! from a descriptor or dispatching attributes and operations through it.
use thiserror::Error;

use crate::kernel::error::BoxError;

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("No attribute '{attribute}' on service '{service}'")]
    NoSuchAttribute { service: String, attribute: String },

    #[error("No operation '{signature}' on service '{service}'")]
    NoSuchOperation { service: String, signature: String },

    /// The member exists but the service is not running
    #[error("Service '{service}' is not running: {message}")]
    IllegalState { service: String, message: String },

    #[error("Attribute '{attribute}' of service '{service}' is not writable")]
    AttributeNotWritable { service: String, attribute: String },

    #[error("Attribute '{attribute}' of service '{service}' is not readable")]
    AttributeNotReadable { service: String, attribute: String },

    #[error("Invalid argument for '{operation}': {message}")]
    InvalidArgument { operation: String, message: String },

    /// The descriptor cannot be turned into a consistent dispatch table
    #[error("Invalid descriptor for type '{type_name}': {message}")]
    Configuration { type_name: String, message: String },

    /// The target itself failed; `source` is the error it returned
    #[error("Operation '{operation}' failed: {source}")]
    Invocation {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl InvokerError {
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, InvokerError::IllegalState { .. })
    }
}

/// Shorthand for Result with the invoker error type
pub type Result<T> = std::result::Result<T, InvokerError>;
