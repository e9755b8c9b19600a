use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::invoker::error::InvokerError;
use crate::invoker::invoker::ServiceInvoker;
use crate::invoker::manager::ServiceInvokerManager;
use crate::invoker::value::{Value, ValueType};
use crate::kernel::bootstrap::{Kernel, WeakKernel};
use crate::kernel::error::{Error, Result};
use crate::kernel::name::ServiceName;
use crate::lifecycle::LifecycleEvent;
use crate::utils::lock;

/// Attributes every shadow answers from the kernel itself
pub const KERNEL_ATTRIBUTES: [&str; 3] = ["state", "startTime", "enabled"];

/// A lifecycle event as seen by shadow subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Per-shadow, starting at 1
    pub sequence: u64,
    pub event: LifecycleEvent,
    pub source: ServiceName,
    pub timestamp: SystemTime,
}

/// Type for subscription identifiers
pub type SubscriptionId = u64;

/// Callback receiving shadow notifications
pub type NotificationListener = Arc<dyn Fn(&Notification) + Send + Sync>;

fn millis(time: SystemTime) -> Value {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| Value::from(elapsed.as_millis() as u64))
        .unwrap_or(Value::Null)
}

/// Management view of one loaded service.
///
/// Answers `state`, `startTime` and `enabled` from the kernel and forwards
/// every other attribute or operation to the service's invoker.
pub struct ServiceShadow {
    name: ServiceName,
    kernel: WeakKernel,
    invokers: Option<Arc<ServiceInvokerManager>>,
    sequence: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, NotificationListener)>>,
    next_subscription: AtomicU64,
}

impl fmt::Debug for ServiceShadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceShadow")
            .field("name", &self.name)
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .field("subscribers_count", &lock(&self.subscribers).len())
            .finish()
    }
}

impl ServiceShadow {
    pub(crate) fn new(name: ServiceName, kernel: WeakKernel, invokers: Option<Arc<ServiceInvokerManager>>) -> Self {
        Self {
            name,
            kernel,
            invokers,
            sequence: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    fn kernel(&self) -> Result<Kernel> {
        self.kernel
            .upgrade()
            .ok_or_else(|| Error::Other("kernel has been dropped".to_string()))
    }

    /// The invoker, or the error a missing one stands for
    fn invoker(&self, missing: InvokerError) -> Result<Arc<ServiceInvoker>> {
        if let Some(invoker) = self.invokers.as_ref().and_then(|manager| manager.get_invoker(&self.name)) {
            return Ok(invoker);
        }
        let running = self
            .kernel()?
            .get_service_state(&self.name)
            .is_ok_and(|state| state.is_running());
        if running {
            Err(missing.into())
        } else {
            Err(InvokerError::IllegalState {
                service: self.name.to_string(),
                message: "service is not running".to_string(),
            }
            .into())
        }
    }

    pub fn get_attribute(&self, attribute: &str) -> Result<Value> {
        let kernel = self.kernel()?;
        match attribute {
            "state" => Ok(Value::from(kernel.get_service_state(&self.name)?.name())),
            "startTime" => Ok(kernel.get_service_start_time(&self.name)?.map_or(Value::Null, millis)),
            "enabled" => Ok(Value::from(kernel.is_service_enabled(&self.name)?)),
            _ => {
                let invoker = self.invoker(InvokerError::NoSuchAttribute {
                    service: self.name.to_string(),
                    attribute: attribute.to_string(),
                })?;
                Ok(invoker.get_attribute(attribute)?)
            }
        }
    }

    pub fn set_attribute(&self, attribute: &str, value: Value) -> Result<()> {
        let kernel = self.kernel()?;
        match attribute {
            "enabled" => {
                let enabled = value.as_bool().ok_or_else(|| InvokerError::InvalidArgument {
                    operation: "enabled".to_string(),
                    message: format!("expected bool, got {}", ValueType::of(&value)),
                })?;
                kernel.set_service_enabled(&self.name, enabled)
            }
            "state" | "startTime" => Err(InvokerError::AttributeNotWritable {
                service: self.name.to_string(),
                attribute: attribute.to_string(),
            }
            .into()),
            _ => {
                let invoker = self.invoker(InvokerError::NoSuchAttribute {
                    service: self.name.to_string(),
                    attribute: attribute.to_string(),
                })?;
                Ok(invoker.set_attribute(attribute, value)?)
            }
        }
    }

    /// Kernel attributes followed by the invoker's, if it is attached
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = KERNEL_ATTRIBUTES.iter().map(|name| name.to_string()).collect();
        if let Some(invoker) = self.invokers.as_ref().and_then(|manager| manager.get_invoker(&self.name)) {
            names.extend(
                invoker
                    .attributes()
                    .into_iter()
                    .map(|info| info.name)
                    .filter(|name| !KERNEL_ATTRIBUTES.contains(&name.as_str())),
            );
        }
        names
    }

    /// `start`, `startRecursive` and `stop` drive the lifecycle; anything
    /// else is dispatched to the invoker.
    pub fn invoke(&self, operation: &str, parameter_types: &[ValueType], args: &[Value]) -> Result<Value> {
        let kernel = self.kernel()?;
        if parameter_types.is_empty() {
            match operation {
                "start" => return kernel.start_service(&self.name).map(|()| Value::Null),
                "startRecursive" => return kernel.start_service_recursive(&self.name).map(|()| Value::Null),
                "stop" => return kernel.stop_service(&self.name).map(|()| Value::Null),
                _ => {}
            }
        }
        let invoker = self.invoker(InvokerError::NoSuchOperation {
            service: self.name.to_string(),
            signature: crate::invoker::descriptor::OperationSignature::new(operation, parameter_types).to_string(),
        })?;
        Ok(invoker.invoke(operation, parameter_types, args)?)
    }

    pub fn subscribe(&self, listener: NotificationListener) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        lock(&self.subscribers).push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(subscription, _)| *subscription != id);
        subscribers.len() != before
    }

    /// Sequence number of the last notification, 0 before the first
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let notification = Notification {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            event,
            source: self.name.clone(),
            timestamp: SystemTime::now(),
        };
        let subscribers: Vec<NotificationListener> =
            lock(&self.subscribers).iter().map(|(_, listener)| listener.clone()).collect();
        for subscriber in subscribers {
            subscriber(&notification);
        }
    }
}
