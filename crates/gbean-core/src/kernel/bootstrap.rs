use std::any::{Any, type_name};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::SystemTime;

use crate::invoker::descriptor::ServiceDescriptor;
use crate::invoker::value::{Value, ValueType};
use crate::kernel::constants;
use crate::kernel::dependency::ServiceDependencyRegistry;
use crate::kernel::error::{BoxError, Error, KernelLifecyclePhase, Result};
use crate::kernel::factory::{ServiceContext, ServiceEnvironment, ServiceFactory, ServiceHandle};
use crate::kernel::instance::{ServiceInstance, StartStrategy, StopStrategy};
use crate::kernel::name::{NamePattern, ServiceName, matches_any};
use crate::kernel::state::ServiceState;
use crate::lifecycle::{LifecycleListener, LifecycleMonitor, ListenerId};
use crate::utils::{lock, read, write};

type HookFn = Box<dyn FnOnce() -> std::result::Result<(), BoxError> + Send>;

struct ShutdownHook {
    name: String,
    hook: HookFn,
}

struct KernelInner {
    name: ServiceName,
    monitor: Arc<LifecycleMonitor>,
    services: RwLock<BTreeMap<ServiceName, Arc<ServiceInstance>>>,
    dependencies: Mutex<ServiceDependencyRegistry>,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
    running: AtomicBool,
    shutting_down: AtomicBool,
    boot_time: Mutex<Option<SystemTime>>,
}

/// Registry and lifecycle driver for named services.
///
/// `Kernel` is a cheap handle; clones share the same registry. Services and
/// listeners that need to call back into the kernel without keeping it
/// alive hold a [`WeakKernel`].
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

/// Non-owning handle to a [`Kernel`]
#[derive(Clone)]
pub struct WeakKernel {
    inner: Weak<KernelInner>,
}

impl WeakKernel {
    pub fn upgrade(&self) -> Option<Kernel> {
        self.inner.upgrade().map(|inner| Kernel { inner })
    }
}

impl fmt::Debug for WeakKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKernel")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .field("services_count", &read(&self.inner.services).len())
            .field("monitor", &self.inner.monitor)
            .finish()
    }
}

impl Kernel {
    /// Create an unbooted kernel
    pub fn new(name: &str) -> Result<Self> {
        let name = ServiceName::new(name)?;
        let monitor = Arc::new(LifecycleMonitor::new());
        let services = RwLock::new(BTreeMap::new());
        let dependencies = Mutex::new(ServiceDependencyRegistry::new());
        log::debug!("Created kernel '{}'", name);
        Ok(Self {
            inner: Arc::new(KernelInner {
                name,
                monitor,
                services,
                dependencies,
                shutdown_hooks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                boot_time: Mutex::new(None),
            }),
        })
    }

    pub fn name(&self) -> &ServiceName {
        &self.inner.name
    }

    pub fn downgrade(&self) -> WeakKernel {
        WeakKernel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn boot_time(&self) -> Option<SystemTime> {
        *lock(&self.inner.boot_time)
    }

    pub fn monitor(&self) -> &Arc<LifecycleMonitor> {
        &self.inner.monitor
    }

    /// Mark the kernel running and start its own service.
    ///
    /// The kernel loads itself under its own name, so listeners registered
    /// before boot see it go through `loaded`, `starting` and `running`.
    pub fn boot(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(Error::illegal_state(self.name(), ServiceState::Running, "kernel is already booted"));
        }
        log::info!("Booting {} kernel '{}' v{}", constants::APP_NAME, self.name(), constants::APP_VERSION);
        *lock(&self.inner.boot_time) = Some(SystemTime::now());

        let name = self.name().clone();
        let booted = self
            .load_service(name.clone(), Arc::new(KernelServiceFactory), ServiceEnvironment::default())
            .and_then(|()| self.start_service(&name));
        if let Err(e) = booted {
            log::error!("Kernel '{}' failed to boot: {}", name, e);
            if let Ok(instance) = self.instance(&name) {
                if let Err(cleanup) = self.unload_instance(&instance) {
                    log::warn!("Kernel service left loaded after failed boot: {}", cleanup);
                }
            }
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Boot,
                service_name: Some(name),
                message: "failed to start the kernel service".to_string(),
                source: Some(Box::new(e)),
            });
        }
        log::info!("Kernel '{}' booted", self.name());
        Ok(())
    }

    fn require_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::KernelNotRunning(self.name().to_string()))
        }
    }

    fn require_accepting(&self) -> Result<()> {
        self.require_running()?;
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Shutdown,
                service_name: None,
                message: "kernel is shutting down".to_string(),
                source: None,
            });
        }
        Ok(())
    }

    fn instance(&self, name: &ServiceName) -> Result<Arc<ServiceInstance>> {
        read(&self.inner.services)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(name.clone()))
    }

    /// Register a service; it starts out STOPPED
    pub fn load_service(
        &self,
        name: ServiceName,
        factory: Arc<dyn ServiceFactory>,
        environment: ServiceEnvironment,
    ) -> Result<()> {
        self.require_accepting()?;
        let instance = {
            let mut services = write(&self.inner.services);
            if services.contains_key(&name) {
                return Err(Error::ServiceAlreadyExists(name));
            }
            let instance = Arc::new(ServiceInstance::new(
                name.clone(),
                factory,
                environment,
                self.inner.monitor.clone(),
            ));
            services.insert(name, instance.clone());
            instance
        };
        instance.init(self);
        Ok(())
    }

    pub fn start_service(&self, name: &ServiceName) -> Result<()> {
        self.start_service_with(name, StartStrategy::Synchronous)
    }

    pub fn start_service_with(&self, name: &ServiceName, strategy: StartStrategy) -> Result<()> {
        self.require_accepting()?;
        self.instance(name)?.start(self, strategy)
    }

    /// Start every dependency depth-first, then the service itself
    pub fn start_service_recursive(&self, name: &ServiceName) -> Result<()> {
        self.require_accepting()?;
        let mut path = Vec::new();
        let mut started = HashSet::new();
        self.start_recursive(name, &mut path, &mut started)
    }

    fn start_recursive(
        &self,
        name: &ServiceName,
        path: &mut Vec<ServiceName>,
        started: &mut HashSet<ServiceName>,
    ) -> Result<()> {
        if let Some(pos) = path.iter().position(|visited| visited == name) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(name.clone());
            return Err(Error::CyclicDependency(cycle));
        }
        if started.contains(name) {
            return Ok(());
        }
        let instance = self.instance(name)?;

        path.push(name.clone());
        for dependency in self.get_my_dependencies(name) {
            self.start_recursive(&dependency, path, started)?;
        }
        path.pop();

        instance.start(self, StartStrategy::Synchronous)?;
        started.insert(name.clone());
        Ok(())
    }

    pub fn stop_service(&self, name: &ServiceName) -> Result<()> {
        self.stop_service_with(name, StopStrategy::Synchronous)
    }

    pub fn stop_service_with(&self, name: &ServiceName, strategy: StopStrategy) -> Result<()> {
        self.require_running()?;
        self.instance(name)?.stop(self, strategy)
    }

    /// Remove a STOPPED service from the registry
    pub fn unload_service(&self, name: &ServiceName) -> Result<()> {
        self.require_running()?;
        let instance = self.instance(name)?;
        if name == self.name() && !self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::illegal_state(
                name,
                instance.state(),
                "the kernel service is only unloaded by shutdown",
            ));
        }
        self.unload_instance(&instance)
    }

    fn unload_instance(&self, instance: &Arc<ServiceInstance>) -> Result<()> {
        instance.destroy(self)?;
        let mut services = write(&self.inner.services);
        if services
            .get(instance.name())
            .is_some_and(|registered| Arc::ptr_eq(registered, instance))
        {
            services.remove(instance.name());
        }
        Ok(())
    }

    /// The live service object; only while RUNNING
    pub fn get_service(&self, name: &ServiceName) -> Result<ServiceHandle> {
        self.instance(name)?.service()
    }

    /// The live service object downcast to `T`
    pub fn get_service_as<T: Any + Send + Sync>(&self, name: &ServiceName) -> Result<Arc<T>> {
        self.get_service(name)?
            .downcast::<T>()
            .map_err(|_| Error::Other(format!("Service '{}' is not a {}", name, type_name::<T>())))
    }

    pub fn get_service_state(&self, name: &ServiceName) -> Result<ServiceState> {
        Ok(self.instance(name)?.state())
    }

    /// When the service last entered RUNNING; None unless running
    pub fn get_service_start_time(&self, name: &ServiceName) -> Result<Option<SystemTime>> {
        Ok(self.instance(name)?.start_time())
    }

    pub fn is_service_enabled(&self, name: &ServiceName) -> Result<bool> {
        Ok(self.instance(name)?.is_enabled())
    }

    pub fn set_service_enabled(&self, name: &ServiceName, enabled: bool) -> Result<()> {
        self.require_running()?;
        self.instance(name)?.set_enabled(enabled);
        log::debug!("Service '{}' enabled = {}", name, enabled);
        Ok(())
    }

    pub fn get_service_factory(&self, name: &ServiceName) -> Result<Arc<dyn ServiceFactory>> {
        let instance = self.instance(name)?;
        instance
            .factory()
            .ok_or_else(|| Error::illegal_state(name, instance.state(), "service has been unloaded"))
    }

    pub fn get_service_descriptor(&self, name: &ServiceName) -> Result<Option<Arc<ServiceDescriptor>>> {
        Ok(self.get_service_factory(name)?.descriptor())
    }

    pub fn get_service_environment(&self, name: &ServiceName) -> Result<Arc<ServiceEnvironment>> {
        let instance = self.instance(name)?;
        instance
            .environment()
            .ok_or_else(|| Error::illegal_state(name, instance.state(), "service has been unloaded"))
    }

    pub fn is_loaded(&self, name: &ServiceName) -> bool {
        read(&self.inner.services).contains_key(name)
    }

    /// Names matching `pattern`, sorted
    pub fn list_services(&self, pattern: &NamePattern) -> Vec<ServiceName> {
        read(&self.inner.services)
            .keys()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect()
    }

    /// Names matching any of `patterns` (all names for an empty set), sorted
    pub fn list_services_matching(&self, patterns: &[NamePattern]) -> Vec<ServiceName> {
        read(&self.inner.services)
            .keys()
            .filter(|name| matches_any(patterns, name))
            .cloned()
            .collect()
    }

    pub fn get_my_dependencies(&self, name: &ServiceName) -> BTreeSet<ServiceName> {
        lock(&self.inner.dependencies).get_my_dependencies(name)
    }

    pub fn get_dependencies_on_me(&self, name: &ServiceName) -> BTreeSet<ServiceName> {
        lock(&self.inner.dependencies).get_dependencies_on_me(name)
    }

    pub(crate) fn register_dependencies(&self, name: &ServiceName, parents: BTreeSet<ServiceName>) {
        lock(&self.inner.dependencies).register_dependencies(name, parents);
    }

    pub(crate) fn unregister_dependencies(&self, name: &ServiceName) {
        lock(&self.inner.dependencies).unregister_dependencies(name);
    }

    pub fn add_lifecycle_listener(
        &self,
        listener: Arc<dyn LifecycleListener>,
        patterns: Vec<NamePattern>,
    ) -> ListenerId {
        self.inner.monitor.add_lifecycle_listener(listener, patterns)
    }

    pub fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool {
        self.inner.monitor.remove_lifecycle_listener(listener)
    }

    /// Register a hook run at the start of [`shutdown`](Self::shutdown).
    ///
    /// Hooks run last-registered first. A hook registered under an existing
    /// name replaces it in place.
    pub fn register_shutdown_hook<F>(&self, name: &str, hook: F)
    where
        F: FnOnce() -> std::result::Result<(), BoxError> + Send + 'static,
    {
        let mut hooks = lock(&self.inner.shutdown_hooks);
        let entry = ShutdownHook {
            name: name.to_string(),
            hook: Box::new(hook),
        };
        match hooks.iter().position(|existing| existing.name == name) {
            Some(pos) => hooks[pos] = entry,
            None => hooks.push(entry),
        }
    }

    pub fn unregister_shutdown_hook(&self, name: &str) -> bool {
        let mut hooks = lock(&self.inner.shutdown_hooks);
        let before = hooks.len();
        hooks.retain(|hook| hook.name != name);
        hooks.len() != before
    }

    fn run_shutdown_hooks(&self) {
        let hooks = std::mem::take(&mut *lock(&self.inner.shutdown_hooks));
        for ShutdownHook { name, hook } in hooks.into_iter().rev() {
            log::debug!("Running shutdown hook '{}'", name);
            match panic::catch_unwind(AssertUnwindSafe(hook)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Shutdown hook '{}' failed: {}", name, e),
                Err(_) => log::error!("Shutdown hook '{}' panicked", name),
            }
        }
    }

    /// Stop and unload everything, the kernel's own service last.
    ///
    /// Shutdown hooks run first. Services stop dependents-first; once no
    /// service can stop cleanly the rest are forced. Teardown continues past
    /// failures and the first one is returned at the end.
    pub fn shutdown(&self) -> Result<()> {
        self.require_running()?;
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Shutdown,
                service_name: None,
                message: "shutdown already in progress".to_string(),
                source: None,
            });
        }
        log::info!("Shutting down kernel '{}'", self.name());

        self.run_shutdown_hooks();

        let mut failures: Vec<(ServiceName, Error)> = Vec::new();
        self.stop_all(&mut failures);

        for name in self.list_services_matching(&[]) {
            if &name == self.name() {
                continue;
            }
            if let Ok(instance) = self.instance(&name) {
                if let Err(e) = self.unload_instance(&instance) {
                    log::error!("Failed to unload '{}' during shutdown: {}", name, e);
                    failures.push((name, e));
                }
            }
        }

        if let Ok(kernel_service) = self.instance(self.name()) {
            let teardown = kernel_service
                .stop(self, StopStrategy::Force)
                .and_then(|()| self.unload_instance(&kernel_service));
            if let Err(e) = teardown {
                failures.push((self.name().clone(), e));
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.shutting_down.store(false, Ordering::SeqCst);
        *lock(&self.inner.boot_time) = None;

        match failures.into_iter().next() {
            None => {
                log::info!("Kernel '{}' shut down", self.name());
                Ok(())
            }
            Some((name, e)) => Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Shutdown,
                message: format!("failed to tear down '{}'", name),
                service_name: Some(name),
                source: Some(Box::new(e)),
            }),
        }
    }

    /// Stop every service except the kernel, dependents before dependencies
    fn stop_all(&self, failures: &mut Vec<(ServiceName, Error)>) {
        loop {
            let remaining: Vec<Arc<ServiceInstance>> = read(&self.inner.services)
                .values()
                .filter(|instance| instance.name() != self.name() && instance.state() != ServiceState::Stopped)
                .cloned()
                .collect();
            if remaining.is_empty() {
                return;
            }

            let mut progressed = false;
            for instance in &remaining {
                let blocked = self
                    .get_dependencies_on_me(instance.name())
                    .iter()
                    .any(|dependent| self.get_service_state(dependent).is_ok_and(|state| state.is_started()));
                if blocked {
                    continue;
                }
                match instance.stop(self, StopStrategy::Synchronous) {
                    Ok(()) => progressed |= instance.state() == ServiceState::Stopped,
                    Err(e) => log::warn!("Service '{}' did not stop cleanly: {}", instance.name(), e),
                }
            }

            if !progressed {
                for instance in remaining {
                    if let Err(e) = instance.stop(self, StopStrategy::Force) {
                        log::error!("Failed to force stop of '{}': {}", instance.name(), e);
                        failures.push((instance.name().clone(), e));
                    }
                }
                return;
            }
        }
    }
}

/// The object the kernel registers as its own service
pub struct KernelService {
    kernel: WeakKernel,
}

impl KernelService {
    fn kernel(&self) -> std::result::Result<Kernel, BoxError> {
        self.kernel.upgrade().ok_or_else(|| "kernel has been dropped".into())
    }

    pub fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor::builder::<KernelService>(constants::KERNEL_SERVICE_TYPE)
            .method("getKernelName", &[], ValueType::String, |service, _| {
                Ok(Value::from(service.kernel()?.name().to_string()))
            })
            .method("getServiceCount", &[], ValueType::Int, |service, _| {
                Ok(Value::from(service.kernel()?.list_services_matching(&[]).len()))
            })
            .getter("isRunning", ValueType::Bool, |service| {
                Value::from(service.kernel.upgrade().is_some_and(|kernel| kernel.is_running()))
            })
            .method("listServices", &[ValueType::String], ValueType::List, |service, args| {
                let pattern = args.first().and_then(Value::as_str).unwrap_or("**");
                let pattern = NamePattern::new(pattern)?;
                let names: Vec<Value> = service
                    .kernel()?
                    .list_services(&pattern)
                    .into_iter()
                    .map(|name| Value::from(name.to_string()))
                    .collect();
                Ok(Value::Array(names))
            })
            .build()
    }
}

struct KernelServiceFactory;

impl ServiceFactory for KernelServiceFactory {
    fn type_name(&self) -> &str {
        constants::KERNEL_SERVICE_TYPE
    }

    fn descriptor(&self) -> Option<Arc<ServiceDescriptor>> {
        Some(Arc::new(KernelService::descriptor()))
    }

    fn create_service(&self, context: &ServiceContext<'_>) -> std::result::Result<ServiceHandle, BoxError> {
        Ok(Arc::new(KernelService {
            kernel: context.kernel().downgrade(),
        }))
    }
}
