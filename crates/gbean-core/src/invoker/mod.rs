//! # GBean Service Invoker
//!
//! Exposes running service objects as dynamically typed endpoints.
//!
//! A service type publishes a [`ServiceDescriptor`] listing its methods. The
//! [`ServiceInvoker`] turns that list into two dispatch tables: attributes,
//! discovered from `get`/`is`/`set` accessor names, and operations keyed by
//! name plus parameter types with a parallel numeric index. Values crossing
//! the boundary are [`Value`]s checked against a [`ValueType`].
//!
//! The [`ServiceInvokerManager`] keeps invokers in step with the lifecycle.
pub mod descriptor;
pub mod error;
#[allow(clippy::module_inception)]
pub mod invoker;
pub mod manager;
pub mod value;

pub use descriptor::{DescriptorBuilder, MethodDescriptor, OperationSignature, ServiceDescriptor};
pub use error::InvokerError;
pub use invoker::{AttributeInfo, OperationInfo, ServiceInvoker};
pub use manager::ServiceInvokerManager;
pub use value::{Value, ValueType};

// Test module declaration
#[cfg(test)]
mod tests;
