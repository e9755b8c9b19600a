//! The seam between the kernel and the code that builds service objects.
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::data::ConfigData;
use crate::invoker::descriptor::ServiceDescriptor;
use crate::kernel::bootstrap::Kernel;
use crate::kernel::condition::ServiceCondition;
use crate::kernel::constants;
use crate::kernel::error::{BoxError, Result};
use crate::kernel::name::ServiceName;

/// A running service object as the kernel holds it
pub type ServiceHandle = Arc<dyn Any + Send + Sync>;

/// Where a service comes from and the configuration it was given
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEnvironment {
    label: String,
    config: ConfigData,
}

impl ServiceEnvironment {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            config: ConfigData::new(),
        }
    }

    pub fn with_config(mut self, config: ConfigData) -> Self {
        self.config = config;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &ConfigData {
        &self.config
    }
}

impl Default for ServiceEnvironment {
    fn default() -> Self {
        Self::new(constants::DEFAULT_ENVIRONMENT_LABEL)
    }
}

/// What a factory sees while creating or destroying its service
pub struct ServiceContext<'a> {
    kernel: &'a Kernel,
    name: &'a ServiceName,
    environment: &'a ServiceEnvironment,
}

impl<'a> ServiceContext<'a> {
    pub fn new(kernel: &'a Kernel, name: &'a ServiceName, environment: &'a ServiceEnvironment) -> Self {
        Self {
            kernel,
            name,
            environment,
        }
    }

    pub fn kernel(&self) -> &'a Kernel {
        self.kernel
    }

    pub fn name(&self) -> &'a ServiceName {
        self.name
    }

    pub fn environment(&self) -> &'a ServiceEnvironment {
        self.environment
    }

    /// The running object of another service, downcast to `T`
    pub fn dependency<T: Any + Send + Sync>(&self, name: &ServiceName) -> Result<Arc<T>> {
        self.kernel.get_service_as::<T>(name)
    }
}

/// Creates and destroys the object behind one service.
///
/// Only `type_name` and `create_service` are required.
pub trait ServiceFactory: Send + Sync {
    /// Name of the type this factory produces
    fn type_name(&self) -> &str;

    /// Services that must be RUNNING before this one starts
    fn dependencies(&self) -> BTreeSet<ServiceName> {
        BTreeSet::new()
    }

    /// Initial value of the instance's enabled flag
    fn is_enabled(&self) -> bool {
        true
    }

    fn start_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        Vec::new()
    }

    fn stop_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        Vec::new()
    }

    /// Methods exposed through the invoker, if any
    fn descriptor(&self) -> Option<Arc<ServiceDescriptor>> {
        None
    }

    fn create_service(&self, context: &ServiceContext<'_>) -> std::result::Result<ServiceHandle, BoxError>;

    fn destroy_service(&self, _context: &ServiceContext<'_>, _service: ServiceHandle) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

type CreateFn = dyn Fn(&ServiceContext<'_>) -> std::result::Result<ServiceHandle, BoxError> + Send + Sync;
type DestroyFn = dyn Fn(&ServiceContext<'_>, ServiceHandle) -> std::result::Result<(), BoxError> + Send + Sync;

/// [`ServiceFactory`] assembled from closures
pub struct FnServiceFactory {
    type_name: String,
    dependencies: BTreeSet<ServiceName>,
    enabled: bool,
    start_conditions: Vec<Arc<dyn ServiceCondition>>,
    stop_conditions: Vec<Arc<dyn ServiceCondition>>,
    descriptor: Option<Arc<ServiceDescriptor>>,
    create: Box<CreateFn>,
    destroy: Option<Box<DestroyFn>>,
}

impl fmt::Debug for FnServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnServiceFactory")
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .field("enabled", &self.enabled)
            .field("has_descriptor", &self.descriptor.is_some())
            .finish_non_exhaustive()
    }
}

impl FnServiceFactory {
    pub fn new<F>(type_name: impl Into<String>, create: F) -> Self
    where
        F: Fn(&ServiceContext<'_>) -> std::result::Result<ServiceHandle, BoxError> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            dependencies: BTreeSet::new(),
            enabled: true,
            start_conditions: Vec::new(),
            stop_conditions: Vec::new(),
            descriptor: None,
            create: Box::new(create),
            destroy: None,
        }
    }

    /// Factory handing out the same shared object on every start
    pub fn instance<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        let handle: ServiceHandle = Arc::new(value);
        Self::new(type_name, move |_| Ok(handle.clone()))
    }

    pub fn depends_on(mut self, name: ServiceName) -> Self {
        self.dependencies.insert(name);
        self
    }

    pub fn with_descriptor(mut self, descriptor: Arc<ServiceDescriptor>) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_start_condition(mut self, condition: Arc<dyn ServiceCondition>) -> Self {
        self.start_conditions.push(condition);
        self
    }

    pub fn with_stop_condition(mut self, condition: Arc<dyn ServiceCondition>) -> Self {
        self.stop_conditions.push(condition);
        self
    }

    pub fn on_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(&ServiceContext<'_>, ServiceHandle) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(destroy));
        self
    }

    /// Load the service with its enabled flag off
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl ServiceFactory for FnServiceFactory {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn dependencies(&self) -> BTreeSet<ServiceName> {
        self.dependencies.clone()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        self.start_conditions.clone()
    }

    fn stop_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        self.stop_conditions.clone()
    }

    fn descriptor(&self) -> Option<Arc<ServiceDescriptor>> {
        self.descriptor.clone()
    }

    fn create_service(&self, context: &ServiceContext<'_>) -> std::result::Result<ServiceHandle, BoxError> {
        (self.create)(context)
    }

    fn destroy_service(&self, context: &ServiceContext<'_>, service: ServiceHandle) -> std::result::Result<(), BoxError> {
        match &self.destroy {
            Some(destroy) => destroy(context, service),
            None => Ok(()),
        }
    }
}
