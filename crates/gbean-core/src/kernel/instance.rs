use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, SystemTime};

use crate::kernel::bootstrap::Kernel;
use crate::kernel::condition::{self, DependenciesRunning, DependentsStopped, ServiceCondition};
use crate::kernel::constants;
use crate::kernel::error::{BoxError, Error, KernelLifecyclePhase, Result};
use crate::kernel::factory::{ServiceContext, ServiceEnvironment, ServiceFactory, ServiceHandle};
use crate::kernel::name::ServiceName;
use crate::kernel::state::ServiceState;
use crate::lifecycle::LifecycleMonitor;
use crate::utils::lock;

/// How `start` treats unsatisfied start conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartStrategy {
    /// Fail with `UnsatisfiedConditions`
    #[default]
    Synchronous,
    /// Re-poll until satisfied. There is no timeout.
    Blocking { poll_interval: Duration },
}

impl StartStrategy {
    /// Blocking with the default poll interval
    pub fn blocking() -> Self {
        StartStrategy::Blocking {
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// How `stop` treats unsatisfied stop conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopStrategy {
    /// Fail with `UnsatisfiedConditions` and return to RUNNING
    #[default]
    Synchronous,
    /// Log the unsatisfied conditions and stop anyway
    Force,
}

struct InstanceInner {
    state: ServiceState,
    factory: Option<Arc<dyn ServiceFactory>>,
    environment: Option<Arc<ServiceEnvironment>>,
    service: Option<ServiceHandle>,
    start_time: Option<SystemTime>,
    initialized: bool,
    destroyed: bool,
}

/// Serializes transitions and remembers the thread inside one.
///
/// Events fire while a transition is held, so a listener calling back into
/// the same service runs on the owning thread; that call is refused instead
/// of waiting on a lock its own thread holds.
struct TransitionLock {
    gate: Mutex<()>,
    owner: Mutex<Option<ThreadId>>,
}

struct TransitionGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _gate: MutexGuard<'a, ()>,
}

impl Drop for TransitionGuard<'_> {
    // Runs before `_gate` is released
    fn drop(&mut self) {
        *lock(self.owner) = None;
    }
}

impl TransitionLock {
    fn new() -> Self {
        Self {
            gate: Mutex::new(()),
            owner: Mutex::new(None),
        }
    }

    fn enter(&self, name: &ServiceName, state: ServiceState) -> Result<TransitionGuard<'_>> {
        let current = thread::current().id();
        if *lock(&self.owner) == Some(current) {
            return Err(Error::illegal_state(
                name,
                state,
                "transition in progress; lifecycle listeners cannot drive their own service",
            ));
        }
        let gate = lock(&self.gate);
        *lock(&self.owner) = Some(current);
        Ok(TransitionGuard {
            owner: &self.owner,
            _gate: gate,
        })
    }
}

/// Lifecycle state machine of one loaded service.
///
/// `transition` is held for the whole of `start`, `stop` and `destroy`, so
/// those never interleave. `inner` is only held for short reads and the
/// final commit of a transition; events fire without it.
pub struct ServiceInstance {
    name: ServiceName,
    transition: TransitionLock,
    inner: Mutex<InstanceInner>,
    enabled: AtomicBool,
    monitor: Arc<LifecycleMonitor>,
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ServiceInstance")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("type_name", &inner.factory.as_ref().map(|factory| factory.type_name().to_string()))
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

fn panicked(what: &str) -> BoxError {
    format!("service factory panicked during {}", what).into()
}

impl ServiceInstance {
    pub(crate) fn new(
        name: ServiceName,
        factory: Arc<dyn ServiceFactory>,
        environment: ServiceEnvironment,
        monitor: Arc<LifecycleMonitor>,
    ) -> Self {
        let enabled = factory.is_enabled();
        Self {
            name,
            transition: TransitionLock::new(),
            inner: Mutex::new(InstanceInner {
                state: ServiceState::Stopped,
                factory: Some(factory),
                environment: Some(Arc::new(environment)),
                service: None,
                start_time: None,
                initialized: false,
                destroyed: false,
            }),
            enabled: AtomicBool::new(enabled),
            monitor,
        }
    }

    /// Register dependencies and the monitor source, then fire `loaded`
    pub(crate) fn init(&self, kernel: &Kernel) {
        let Ok(_transition) = self.transition.enter(&self.name, self.state()) else {
            return;
        };
        let factory = {
            let inner = lock(&self.inner);
            if inner.initialized || inner.destroyed {
                return;
            }
            inner.factory.clone()
        };
        if let Some(factory) = factory {
            kernel.register_dependencies(&self.name, factory.dependencies());
        }
        self.monitor.add_source(&self.name);
        lock(&self.inner).initialized = true;
        log::debug!("Service '{}' loaded", self.name);
        self.monitor.fire_loaded(&self.name);
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        lock(&self.inner).state
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        lock(&self.inner).start_time
    }

    /// The service object; only available while RUNNING
    pub fn service(&self) -> Result<ServiceHandle> {
        let inner = lock(&self.inner);
        match (&inner.service, inner.state) {
            (Some(service), ServiceState::Running) => Ok(service.clone()),
            (_, state) => Err(Error::illegal_state(&self.name, state, "service is not running")),
        }
    }

    pub fn factory(&self) -> Option<Arc<dyn ServiceFactory>> {
        lock(&self.inner).factory.clone()
    }

    pub fn environment(&self) -> Option<Arc<ServiceEnvironment>> {
        lock(&self.inner).environment.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// A disabled service refuses to start; a running one keeps running
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner).destroyed
    }

    fn set_state(&self, state: ServiceState) {
        lock(&self.inner).state = state;
    }

    fn collaborators(&self, inner: &InstanceInner) -> Result<(Arc<dyn ServiceFactory>, Arc<ServiceEnvironment>)> {
        match (&inner.factory, &inner.environment) {
            (Some(factory), Some(environment)) => Ok((factory.clone(), environment.clone())),
            _ => Err(Error::illegal_state(&self.name, inner.state, "service has been unloaded")),
        }
    }

    /// Move STOPPED -> STARTING -> RUNNING.
    ///
    /// A no-op when already STARTING or RUNNING. On failure the instance is
    /// back in STOPPED, `stopped` has been fired, and the error is returned.
    pub fn start(&self, kernel: &Kernel, strategy: StartStrategy) -> Result<()> {
        if self.state().is_started() {
            return Ok(());
        }
        let _transition = self.transition.enter(&self.name, self.state())?;

        let (factory, environment) = {
            let inner = lock(&self.inner);
            if inner.state.is_started() {
                return Ok(());
            }
            if inner.destroyed {
                return Err(Error::illegal_state(&self.name, inner.state, "service has been unloaded"));
            }
            if !inner.initialized {
                return Err(Error::illegal_state(&self.name, inner.state, "service has not been initialized"));
            }
            if !self.is_enabled() {
                return Err(Error::illegal_state(&self.name, inner.state, "service is disabled"));
            }
            self.collaborators(&inner)?
        };

        self.set_state(ServiceState::Starting);
        log::debug!("Service '{}' starting", self.name);
        self.monitor.fire_starting(&self.name);

        let context = ServiceContext::new(kernel, &self.name, &environment);
        let mut conditions: Vec<Arc<dyn ServiceCondition>> = vec![Arc::new(DependenciesRunning)];
        conditions.extend(factory.start_conditions());
        if let Err(e) = self.await_start_conditions(&conditions, &context, strategy) {
            self.abort_start();
            return Err(e);
        }

        let created = panic::catch_unwind(AssertUnwindSafe(|| factory.create_service(&context)))
            .unwrap_or_else(|_| Err(panicked("create")));
        match created {
            Ok(service) => {
                {
                    let mut inner = lock(&self.inner);
                    inner.service = Some(service);
                    inner.start_time = Some(SystemTime::now());
                    inner.state = ServiceState::Running;
                }
                log::info!("Service '{}' is running", self.name);
                self.monitor.fire_running(&self.name);
                Ok(())
            }
            Err(source) => {
                log::error!("Service '{}' failed to start: {}", self.name, source);
                self.abort_start();
                Err(Error::Factory {
                    name: self.name.clone(),
                    phase: KernelLifecyclePhase::Start,
                    source,
                })
            }
        }
    }

    fn abort_start(&self) {
        self.set_state(ServiceState::Stopped);
        self.monitor.fire_stopped(&self.name);
    }

    fn await_start_conditions(
        &self,
        conditions: &[Arc<dyn ServiceCondition>],
        context: &ServiceContext<'_>,
        strategy: StartStrategy,
    ) -> Result<()> {
        loop {
            let unsatisfied = condition::unsatisfied(conditions, context);
            if unsatisfied.is_empty() {
                return Ok(());
            }
            match strategy {
                StartStrategy::Synchronous => {
                    return Err(Error::UnsatisfiedConditions {
                        name: self.name.clone(),
                        phase: KernelLifecyclePhase::Start,
                        unsatisfied,
                    });
                }
                StartStrategy::Blocking { poll_interval } => {
                    log::debug!("Service '{}' waiting: {}", self.name, unsatisfied.join("; "));
                    thread::sleep(poll_interval);
                }
            }
        }
    }

    /// Move RUNNING -> STOPPING -> STOPPED.
    ///
    /// A no-op when already STOPPING or STOPPED. Unsatisfied stop conditions
    /// (synchronous) or a failing `destroy_service` put the instance back in
    /// RUNNING with its object kept.
    pub fn stop(&self, kernel: &Kernel, strategy: StopStrategy) -> Result<()> {
        if self.state().is_stopped() {
            return Ok(());
        }
        let _transition = self.transition.enter(&self.name, self.state())?;

        let (factory, environment, service) = {
            let inner = lock(&self.inner);
            if inner.state.is_stopped() {
                return Ok(());
            }
            let (factory, environment) = self.collaborators(&inner)?;
            (factory, environment, inner.service.clone())
        };

        self.set_state(ServiceState::Stopping);
        log::debug!("Service '{}' stopping", self.name);
        self.monitor.fire_stopping(&self.name);

        let context = ServiceContext::new(kernel, &self.name, &environment);
        let mut conditions: Vec<Arc<dyn ServiceCondition>> = vec![Arc::new(DependentsStopped)];
        conditions.extend(factory.stop_conditions());
        let unsatisfied = condition::unsatisfied(&conditions, &context);
        if !unsatisfied.is_empty() {
            match strategy {
                StopStrategy::Synchronous => {
                    self.restore_running();
                    return Err(Error::UnsatisfiedConditions {
                        name: self.name.clone(),
                        phase: KernelLifecyclePhase::Stop,
                        unsatisfied,
                    });
                }
                StopStrategy::Force => {
                    log::warn!("Forcing stop of '{}': {}", self.name, unsatisfied.join("; "));
                }
            }
        }

        let destroyed = match service {
            Some(service) => panic::catch_unwind(AssertUnwindSafe(|| factory.destroy_service(&context, service)))
                .unwrap_or_else(|_| Err(panicked("destroy"))),
            None => Ok(()),
        };
        match destroyed {
            Ok(()) => {
                {
                    let mut inner = lock(&self.inner);
                    inner.service = None;
                    inner.start_time = None;
                    inner.state = ServiceState::Stopped;
                }
                log::info!("Service '{}' stopped", self.name);
                self.monitor.fire_stopped(&self.name);
                Ok(())
            }
            Err(source) => {
                log::error!("Service '{}' failed to stop: {}", self.name, source);
                self.restore_running();
                Err(Error::Factory {
                    name: self.name.clone(),
                    phase: KernelLifecyclePhase::Stop,
                    source,
                })
            }
        }
    }

    fn restore_running(&self) {
        self.set_state(ServiceState::Running);
        self.monitor.fire_running(&self.name);
    }

    /// Release the factory and environment, fire `unloaded` and drop the
    /// monitor source and dependency entries. Only valid from STOPPED.
    pub(crate) fn destroy(&self, kernel: &Kernel) -> Result<()> {
        let _transition = self.transition.enter(&self.name, self.state())?;
        {
            let mut inner = lock(&self.inner);
            if inner.destroyed {
                return Ok(());
            }
            if inner.state != ServiceState::Stopped {
                return Err(Error::illegal_state(
                    &self.name,
                    inner.state,
                    "service must be stopped before it is unloaded",
                ));
            }
            inner.factory = None;
            inner.environment = None;
            inner.service = None;
            inner.destroyed = true;
        }

        self.monitor.fire_unloaded(&self.name);
        self.monitor.remove_source(&self.name);
        kernel.unregister_dependencies(&self.name);
        log::debug!("Service '{}' unloaded", self.name);
        Ok(())
    }
}
