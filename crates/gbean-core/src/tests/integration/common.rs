#![cfg(test)]

use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::invoker::{ServiceDescriptor, ServiceInvokerManager, ValueType};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::name::ServiceName;
use crate::lifecycle::{LifecycleListener, ListenerResult};
use crate::management::ManagementBridge;
use crate::recipe::{ClassDescriptor, ParamType, Parameter, TypeCatalog};

pub fn name(s: &str) -> ServiceName {
    ServiceName::new(s).expect("valid service name")
}

/// A booted kernel with invokers and the management bridge installed
pub struct Stack {
    pub kernel: Kernel,
    pub invokers: Arc<ServiceInvokerManager>,
    pub bridge: Arc<ManagementBridge>,
}

pub fn boot_stack(kernel_name: &str) -> Stack {
    let kernel = Kernel::new(kernel_name).expect("kernel name");
    kernel.boot().expect("boot");
    let invokers = ServiceInvokerManager::install(&kernel);
    let bridge = ManagementBridge::install(&kernel, Some(invokers.clone()));
    Stack { kernel, invokers, bridge }
}

/// Records "<event>:<service>" for every lifecycle event it sees
#[derive(Default)]
pub struct EventLog {
    entries: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, event: &str, name: &ServiceName) -> ListenerResult {
        self.entries.lock().unwrap().push(format!("{}:{}", event, name));
        Ok(())
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl LifecycleListener for EventLog {
    fn loaded(&self, name: &ServiceName) -> ListenerResult {
        self.push("loaded", name)
    }
    fn starting(&self, name: &ServiceName) -> ListenerResult {
        self.push("starting", name)
    }
    fn running(&self, name: &ServiceName) -> ListenerResult {
        self.push("running", name)
    }
    fn stopping(&self, name: &ServiceName) -> ListenerResult {
        self.push("stopping", name)
    }
    fn stopped(&self, name: &ServiceName) -> ListenerResult {
        self.push("stopped", name)
    }
    fn unloaded(&self, name: &ServiceName) -> ListenerResult {
        self.push("unloaded", name)
    }
}

/// In-memory key/value store used as a deployable service
pub struct Store {
    pub capacity: i64,
    entries: Mutex<Vec<(String, String)>>,
}

impl Store {
    pub fn put(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() as i64 >= self.capacity {
            return Err(format!("store is full ({} entries)", self.capacity));
        }
        entries.push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Front end writing through to a [`Store`]
pub struct Cache {
    pub store: Arc<Store>,
    pub prefix: String,
}

pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.register(
        ClassDescriptor::builder::<Store>("Store")
            .constructor(
                vec![Parameter::new("capacity", ParamType::Int).with_default(json!(16))],
                |args| {
                    Ok(Store {
                        capacity: args.int("capacity")?,
                        entries: Mutex::new(Vec::new()),
                    })
                },
            )
            .build(),
        Some(
            ServiceDescriptor::builder::<Store>("Store")
                .getter("getCapacity", ValueType::Int, |store| json!(store.capacity))
                .getter("getSize", ValueType::Int, |store| json!(store.len()))
                .method("put", &[ValueType::String, ValueType::String], ValueType::Unit, |store, args| {
                    store.put(args[0].as_str().unwrap_or_default(), args[1].as_str().unwrap_or_default())?;
                    Ok(serde_json::Value::Null)
                })
                .build(),
        ),
    );
    catalog.register(
        ClassDescriptor::builder::<Cache>("Cache")
            .constructor(vec![Parameter::new("store", ParamType::object::<Store>())], |args| {
                Ok(Cache {
                    store: args.object::<Store>("store")?,
                    prefix: String::new(),
                })
            })
            .setter("setPrefix", ParamType::String, |cache, arg| {
                cache.prefix = arg.string()?;
                Ok(())
            })
            .build(),
        None,
    );
    catalog
}
