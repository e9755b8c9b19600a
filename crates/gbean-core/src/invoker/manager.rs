use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::invoker::invoker::ServiceInvoker;
use crate::kernel::bootstrap::{Kernel, WeakKernel};
use crate::kernel::name::ServiceName;
use crate::lifecycle::{LifecycleListener, ListenerResult};
use crate::utils::{read, write};

/// Keeps one [`ServiceInvoker`] per running service that publishes a descriptor.
///
/// Registered as a lifecycle listener for every name: an invoker is built
/// when the service reaches RUNNING, detached on `stopping` and dropped on
/// `stopped` / `unloaded`.
pub struct ServiceInvokerManager {
    kernel: WeakKernel,
    invokers: RwLock<HashMap<ServiceName, Arc<ServiceInvoker>>>,
}

impl fmt::Debug for ServiceInvokerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInvokerManager")
            .field("invokers_count", &read(&self.invokers).len())
            .finish()
    }
}

impl ServiceInvokerManager {
    /// Create a manager and register it with `kernel`.
    ///
    /// Services that are already running get their invokers immediately.
    pub fn install(kernel: &Kernel) -> Arc<Self> {
        let manager = Arc::new(Self {
            kernel: kernel.downgrade(),
            invokers: RwLock::new(HashMap::new()),
        });
        kernel.add_lifecycle_listener(manager.clone(), Vec::new());

        for name in kernel.list_services_matching(&[]) {
            if kernel.get_service_state(&name).is_ok_and(|state| state.is_running()) {
                manager.attach(&name);
            }
        }
        log::debug!("Service invoker manager installed on kernel '{}'", kernel.name());
        manager
    }

    /// Current invoker for `name`, if the service is running and described
    pub fn get_invoker(&self, name: &ServiceName) -> Option<Arc<ServiceInvoker>> {
        read(&self.invokers).get(name).cloned()
    }

    pub fn invoker_count(&self) -> usize {
        read(&self.invokers).len()
    }

    fn attach(&self, name: &ServiceName) {
        let Some(kernel) = self.kernel.upgrade() else {
            return;
        };
        let descriptor = match kernel.get_service_descriptor(name) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Cannot read descriptor of '{}': {}", name, e);
                return;
            }
        };
        let target = match kernel.get_service(name) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Cannot fetch running service '{}': {}", name, e);
                return;
            }
        };

        let invoker = match ServiceInvoker::new(name.clone(), descriptor) {
            Ok(invoker) => invoker,
            Err(e) => {
                log::error!("Failed to build invoker for '{}': {}", name, e);
                return;
            }
        };
        if let Err(e) = invoker.start(target) {
            log::error!("Failed to attach invoker for '{}': {}", name, e);
            return;
        }
        write(&self.invokers).insert(name.clone(), Arc::new(invoker));
        log::debug!("Invoker attached for '{}'", name);
    }
}

impl LifecycleListener for ServiceInvokerManager {
    fn running(&self, name: &ServiceName) -> ListenerResult {
        self.attach(name);
        Ok(())
    }

    fn stopping(&self, name: &ServiceName) -> ListenerResult {
        if let Some(invoker) = self.get_invoker(name) {
            invoker.stop();
        }
        Ok(())
    }

    fn stopped(&self, name: &ServiceName) -> ListenerResult {
        if write(&self.invokers).remove(name).is_some() {
            log::debug!("Invoker removed for '{}'", name);
        }
        Ok(())
    }

    fn unloaded(&self, name: &ServiceName) -> ListenerResult {
        write(&self.invokers).remove(name);
        Ok(())
    }
}
