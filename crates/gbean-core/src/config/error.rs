//! # GBean Configuration Errors
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension or requested format is not compiled in
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to deserialize from {format}: {message}")]
    Deserialization { format: String, message: String },

    #[error("Failed to serialize to {format}: {message}")]
    Serialization { format: String, message: String },

    /// Parsed, but describes an inconsistent set of services
    #[error("Invalid service definition{}: {message}", .service.as_ref().map(|s| format!(" '{}'", s)).unwrap_or_default())]
    InvalidDefinition {
        service: Option<String>,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(service: Option<&str>, message: impl Into<String>) -> Self {
        ConfigError::InvalidDefinition {
            service: service.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Shorthand for Result with the config error type
pub type Result<T> = std::result::Result<T, ConfigError>;
