use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::invoker::manager::ServiceInvokerManager;
use crate::kernel::bootstrap::{Kernel, WeakKernel};
use crate::kernel::name::ServiceName;
use crate::lifecycle::{LifecycleEvent, LifecycleListener, ListenerResult};
use crate::management::shadow::ServiceShadow;
use crate::utils::{read, write};

/// Keeps a [`ServiceShadow`] for every loaded service.
///
/// Install it after the [`ServiceInvokerManager`] so that shadows see the
/// invoker attached when `running` is broadcast.
pub struct ManagementBridge {
    kernel: WeakKernel,
    invokers: Option<Arc<ServiceInvokerManager>>,
    shadows: RwLock<BTreeMap<ServiceName, Arc<ServiceShadow>>>,
}

impl fmt::Debug for ManagementBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementBridge")
            .field("shadows", &read(&self.shadows).keys().collect::<Vec<_>>())
            .field("has_invokers", &self.invokers.is_some())
            .finish()
    }
}

impl ManagementBridge {
    pub fn install(kernel: &Kernel, invokers: Option<Arc<ServiceInvokerManager>>) -> Arc<Self> {
        let bridge = Arc::new(Self {
            kernel: kernel.downgrade(),
            invokers,
            shadows: RwLock::new(BTreeMap::new()),
        });
        kernel.add_lifecycle_listener(bridge.clone(), Vec::new());
        for name in kernel.list_services_matching(&[]) {
            bridge.shadow_for(&name);
        }
        log::debug!("Management bridge installed on kernel '{}'", kernel.name());
        bridge
    }

    pub fn get_shadow(&self, name: &ServiceName) -> Option<Arc<ServiceShadow>> {
        read(&self.shadows).get(name).cloned()
    }

    pub fn shadow_names(&self) -> Vec<ServiceName> {
        read(&self.shadows).keys().cloned().collect()
    }

    fn shadow_for(&self, name: &ServiceName) -> Arc<ServiceShadow> {
        write(&self.shadows)
            .entry(name.clone())
            .or_insert_with(|| Arc::new(ServiceShadow::new(name.clone(), self.kernel.clone(), self.invokers.clone())))
            .clone()
    }

    fn notify(&self, name: &ServiceName, event: LifecycleEvent) {
        if let Some(shadow) = self.get_shadow(name) {
            shadow.emit(event);
        }
    }
}

impl LifecycleListener for ManagementBridge {
    fn loaded(&self, name: &ServiceName) -> ListenerResult {
        self.shadow_for(name).emit(LifecycleEvent::Loaded);
        Ok(())
    }

    fn starting(&self, name: &ServiceName) -> ListenerResult {
        self.notify(name, LifecycleEvent::Starting);
        Ok(())
    }

    fn running(&self, name: &ServiceName) -> ListenerResult {
        self.notify(name, LifecycleEvent::Running);
        Ok(())
    }

    fn stopping(&self, name: &ServiceName) -> ListenerResult {
        self.notify(name, LifecycleEvent::Stopping);
        Ok(())
    }

    fn stopped(&self, name: &ServiceName) -> ListenerResult {
        self.notify(name, LifecycleEvent::Stopped);
        Ok(())
    }

    fn unloaded(&self, name: &ServiceName) -> ListenerResult {
        let shadow = write(&self.shadows).remove(name);
        if let Some(shadow) = shadow {
            shadow.emit(LifecycleEvent::Unloaded);
        }
        Ok(())
    }
}
