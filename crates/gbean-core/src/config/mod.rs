//! # GBean Configuration
//!
//! Kernel and service definitions read from configuration files.
//!
//! - **[`data`]**: [`ConfigFormat`] (JSON, plus YAML and TOML behind the
//!   `yaml-config` / `toml-config` features) and the free-form
//!   [`ConfigData`] map handed to services through their environment.
//! - **[`definition`]**: [`KernelConfig`] and [`ServiceDefinition`], with
//!   validation of names and dependencies.
//! - **[`deploy`]**: builds recipes and factories from definitions through a
//!   [`TypeCatalog`](crate::recipe::TypeCatalog) and loads them into a kernel.
pub mod data;
pub mod definition;
pub mod deploy;
pub mod error;

pub use data::{ConfigData, ConfigFormat};
pub use definition::{KernelConfig, KernelSection, ServiceDefinition};
pub use deploy::{build_factory, build_recipe, check_services, load_services, start_services};
pub use error::ConfigError;

// Test module declaration
#[cfg(test)]
mod tests;
