//! # GBean Kernel Errors
//!
//! Defines the error type returned by every public kernel operation.
//!
//! [`Error`] covers registry lookups (`ServiceNotFound`,
//! `ServiceAlreadyExists`), lifecycle misuse (`IllegalState`,
//! `UnsatisfiedConditions`, `CyclicDependency`), factory failures, and wraps
//! the typed errors of the invoker, recipe and config subsystems.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigError;
use crate::invoker::error::InvokerError;
use crate::kernel::name::ServiceName;
use crate::kernel::state::ServiceState;
use crate::recipe::error::ConstructionError;

/// Boxed error produced by service factories, conditions and listeners
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// No service is registered under the name
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceName),

    /// A service is already registered under the name
    #[error("Service already exists: {0}")]
    ServiceAlreadyExists(ServiceName),

    /// The operation is not valid in the service's current lifecycle state
    #[error("Illegal state for service '{name}' ({state}): {message}")]
    IllegalState {
        name: ServiceName,
        state: ServiceState,
        message: String,
    },

    /// Start or stop conditions were polled and at least one was unsatisfied
    #[error("Unsatisfied {phase} conditions for service '{name}': {}", .unsatisfied.join("; "))]
    UnsatisfiedConditions {
        name: ServiceName,
        phase: KernelLifecyclePhase,
        unsatisfied: Vec<String>,
    },

    /// Dependency cycle found while starting recursively
    #[error("Circular dependency detected: {}", format_path(.0))]
    CyclicDependency(Vec<ServiceName>),

    #[error("Invalid service name '{name}': {reason}")]
    InvalidServiceName { name: String, reason: String },

    /// The kernel has not been booted or has been shut down
    #[error("Kernel '{0}' is not running")]
    KernelNotRunning(String),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase:?}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        service_name: Option<ServiceName>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// The service factory failed to create or destroy the service object
    #[error("Service factory for '{name}' failed during {phase}: {source}")]
    Factory {
        name: ServiceName,
        phase: KernelLifecyclePhase,
        #[source]
        source: BoxError,
    },

    /// Specific, typed invoker error
    #[error("Invoker error: {0}")]
    Invoker(#[from] InvokerError),

    /// Specific, typed object recipe error
    #[error("Recipe error: {0}")]
    Recipe(#[from] ConstructionError),

    /// Specific, typed configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in a service's or the kernel's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("boot")]
    Boot,
    #[error("load")]
    Load,
    #[error("start")]
    Start,
    #[error("stop")]
    Stop,
    #[error("unload")]
    Unload,
    #[error("shutdown")]
    Shutdown,
}

fn format_path(path: &[ServiceName]) -> String {
    path.iter().map(ServiceName::as_str).collect::<Vec<_>>().join(" -> ")
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    pub(crate) fn illegal_state(name: &ServiceName, state: ServiceState, message: impl Into<String>) -> Self {
        Error::IllegalState {
            name: name.clone(),
            state,
            message: message.into(),
        }
    }

    /// True for `ServiceNotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ServiceNotFound(_))
    }

    /// True for `IllegalState` and `KernelNotRunning`
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState { .. } | Error::KernelNotRunning(_))
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
