//! # GBean Core
//!
//! A service lifecycle kernel with descriptor-driven invocation and
//! recipe-based dependency injection.
//!
//! - [`kernel`]: the service registry, state machine and boot/shutdown.
//! - [`lifecycle`]: lifecycle listeners and the event monitor.
//! - [`invoker`]: attribute and operation dispatch over running services.
//! - [`recipe`]: constructor/setter resolution and object graphs.
//! - [`management`]: shadow objects and lifecycle notifications.
//! - [`config`]: kernel configuration files.
pub mod config;
pub mod invoker;
pub mod kernel;
pub mod lifecycle;
pub mod management;
pub mod recipe;
pub mod utils;

// Re-export key public types for the binary and service crates
pub use config::{KernelConfig, ServiceDefinition};
pub use invoker::{ServiceDescriptor, ServiceInvoker, ServiceInvokerManager, Value, ValueType};
pub use kernel::error::Error as KernelError;
pub use kernel::{
    FnServiceFactory, Kernel, NamePattern, ServiceContext, ServiceEnvironment, ServiceFactory, ServiceHandle,
    ServiceName, ServiceState,
};
pub use lifecycle::{LifecycleEvent, LifecycleListener};
pub use management::ManagementBridge;
pub use recipe::{ClassDescriptor, ObjectRecipe, TypeCatalog};

#[cfg(test)]
mod tests;
