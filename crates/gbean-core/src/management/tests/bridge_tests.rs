use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::invoker::{InvokerError, ServiceDescriptor, ServiceInvokerManager, Value, ValueType};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::error::Error;
use crate::kernel::factory::{FnServiceFactory, ServiceEnvironment, ServiceHandle};
use crate::kernel::name::ServiceName;
use crate::kernel::state::ServiceState;
use crate::lifecycle::LifecycleEvent;
use crate::management::{ManagementBridge, Notification};

struct Gauge {
    level: AtomicI64,
}

fn gauge_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::builder::<Gauge>("Gauge")
        .getter("getLevel", ValueType::Int, |g| json!(g.level.load(Ordering::SeqCst)))
        .setter("setLevel", ValueType::Int, |g, v| {
            g.level.store(v.as_i64().ok_or("level must be an int")?, Ordering::SeqCst);
            Ok(())
        })
        .method("reset", &[], ValueType::Unit, |g, _| {
            g.level.store(0, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .build()
}

fn name(s: &str) -> ServiceName {
    ServiceName::new(s).unwrap()
}

struct Fixture {
    kernel: Kernel,
    bridge: Arc<ManagementBridge>,
}

fn fixture() -> Fixture {
    let kernel = Kernel::new("k").unwrap();
    kernel.boot().unwrap();
    let invokers = ServiceInvokerManager::install(&kernel);
    let bridge = ManagementBridge::install(&kernel, Some(invokers));
    let factory = FnServiceFactory::new("Gauge", |_| {
        Ok(Arc::new(Gauge {
            level: AtomicI64::new(5),
        }) as ServiceHandle)
    })
    .with_descriptor(Arc::new(gauge_descriptor()));
    kernel
        .load_service(name("app/gauge"), Arc::new(factory), ServiceEnvironment::default())
        .unwrap();
    Fixture { kernel, bridge }
}

#[test]
fn test_shadows_track_loaded_services() {
    let Fixture { kernel, bridge } = fixture();
    assert_eq!(bridge.shadow_names(), vec![name("app/gauge"), name("k")]);

    kernel.unload_service(&name("app/gauge")).unwrap();
    assert!(bridge.get_shadow(&name("app/gauge")).is_none());
    assert_eq!(bridge.shadow_names(), vec![name("k")]);
}

#[test]
fn test_kernel_attributes() {
    let Fixture { kernel, bridge } = fixture();
    let shadow = bridge.get_shadow(&name("app/gauge")).unwrap();

    assert_eq!(shadow.get_attribute("state").unwrap(), json!("STOPPED"));
    assert_eq!(shadow.get_attribute("startTime").unwrap(), Value::Null);
    assert_eq!(shadow.get_attribute("enabled").unwrap(), json!(true));

    kernel.start_service(&name("app/gauge")).unwrap();
    assert_eq!(shadow.get_attribute("state").unwrap(), json!("RUNNING"));
    assert!(shadow.get_attribute("startTime").unwrap().as_u64().is_some());

    assert!(matches!(
        shadow.set_attribute("state", json!("STOPPED")),
        Err(Error::Invoker(InvokerError::AttributeNotWritable { .. }))
    ));
    assert!(matches!(
        shadow.set_attribute("enabled", json!("no")),
        Err(Error::Invoker(InvokerError::InvalidArgument { .. }))
    ));

    shadow.set_attribute("enabled", json!(false)).unwrap();
    assert!(!kernel.is_service_enabled(&name("app/gauge")).unwrap());
}

#[test]
fn test_service_attributes_go_through_invoker() {
    let Fixture { kernel, bridge } = fixture();
    let shadow = bridge.get_shadow(&name("app/gauge")).unwrap();

    // stopped: the member may exist, the service just is not there
    assert!(matches!(
        shadow.get_attribute("level"),
        Err(Error::Invoker(InvokerError::IllegalState { .. }))
    ));
    assert_eq!(shadow.attribute_names(), vec!["state", "startTime", "enabled"]);

    kernel.start_service(&name("app/gauge")).unwrap();
    assert_eq!(shadow.get_attribute("level").unwrap(), json!(5));
    shadow.set_attribute("level", json!(9)).unwrap();
    assert_eq!(shadow.get_attribute("level").unwrap(), json!(9));
    shadow.invoke("reset", &[], &[]).unwrap();
    assert_eq!(shadow.get_attribute("level").unwrap(), json!(0));
    assert_eq!(shadow.attribute_names(), vec!["state", "startTime", "enabled", "level"]);

    assert!(matches!(
        shadow.get_attribute("pressure"),
        Err(Error::Invoker(InvokerError::NoSuchAttribute { .. }))
    ));
}

#[test]
fn test_lifecycle_operations() {
    let Fixture { kernel, bridge } = fixture();
    let shadow = bridge.get_shadow(&name("app/gauge")).unwrap();

    shadow.invoke("start", &[], &[]).unwrap();
    assert_eq!(kernel.get_service_state(&name("app/gauge")).unwrap(), ServiceState::Running);

    shadow.invoke("stop", &[], &[]).unwrap();
    assert_eq!(kernel.get_service_state(&name("app/gauge")).unwrap(), ServiceState::Stopped);
    assert!(kernel.is_loaded(&name("app/gauge")));

    shadow.invoke("startRecursive", &[], &[]).unwrap();
    assert_eq!(kernel.get_service_state(&name("app/gauge")).unwrap(), ServiceState::Running);
}

#[test]
fn test_notifications_are_sequenced() {
    let Fixture { kernel, bridge } = fixture();
    let shadow = bridge.get_shadow(&name("app/gauge")).unwrap();
    // `loaded` was already emitted
    assert_eq!(shadow.last_sequence(), 1);

    let received: Arc<Mutex<Vec<(u64, LifecycleEvent)>>> = Arc::default();
    let sink = received.clone();
    let subscription = shadow.subscribe(Arc::new(move |n: &Notification| {
        sink.lock().unwrap().push((n.sequence, n.event));
    }));

    kernel.start_service(&name("app/gauge")).unwrap();
    kernel.stop_service(&name("app/gauge")).unwrap();
    assert!(shadow.unsubscribe(subscription));
    assert!(!shadow.unsubscribe(subscription));
    kernel.unload_service(&name("app/gauge")).unwrap();

    assert_eq!(
        *received.lock().unwrap(),
        vec![
            (2, LifecycleEvent::Starting),
            (3, LifecycleEvent::Running),
            (4, LifecycleEvent::Stopping),
            (5, LifecycleEvent::Stopped),
        ]
    );
    assert_eq!(shadow.last_sequence(), 6);
}

#[test]
fn test_bridge_without_invokers() {
    let kernel = Kernel::new("k").unwrap();
    kernel.boot().unwrap();
    let bridge = ManagementBridge::install(&kernel, None);
    let shadow = bridge.get_shadow(&name("k")).unwrap();

    assert_eq!(shadow.get_attribute("state").unwrap(), json!("RUNNING"));
    assert!(matches!(
        shadow.get_attribute("kernelName"),
        Err(Error::Invoker(InvokerError::NoSuchAttribute { .. }))
    ));
}
