//! # GBean Kernel
//!
//! The `kernel` module owns the registry of named services and drives each
//! of them through its lifecycle.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Kernel facade**: [`Kernel`](bootstrap::Kernel) loads, starts, stops and
//!   unloads services, boots itself as a service and tears everything down in
//!   dependency order on shutdown.
//! - **Service state machine**: [`ServiceInstance`](instance::ServiceInstance)
//!   moves one service through STARTING / RUNNING / STOPPING / STOPPED and
//!   reports each step to the lifecycle monitor.
//! - **Factories and conditions**: the [`ServiceFactory`](factory::ServiceFactory)
//!   seam creates service objects; [`ServiceCondition`](condition::ServiceCondition)s
//!   gate starts and stops.
//! - **Names and dependencies**: [`ServiceName`](name::ServiceName) and
//!   [`NamePattern`](name::NamePattern), plus the bidirectional
//!   [`ServiceDependencyRegistry`](dependency::ServiceDependencyRegistry).
//! - **Error Handling**: kernel [`Error`](error::Error) and its `Result` alias.
pub mod bootstrap;
pub mod condition;
pub mod constants;
pub mod dependency;
pub mod error;
pub mod factory;
pub mod instance;
pub mod name;
pub mod state;

pub use bootstrap::{Kernel, KernelService, WeakKernel};
pub use condition::{ConditionOutcome, DependenciesRunning, DependentsStopped, FnCondition, ServiceCondition};
pub use dependency::ServiceDependencyRegistry;
pub use error::{BoxError, Error, KernelLifecyclePhase, Result};
pub use factory::{FnServiceFactory, ServiceContext, ServiceEnvironment, ServiceFactory, ServiceHandle};
pub use instance::{ServiceInstance, StartStrategy, StopStrategy};
pub use name::{NamePattern, ServiceName};
pub use state::ServiceState;

// Test module declaration
#[cfg(test)]
mod tests;
