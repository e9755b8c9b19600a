use std::sync::Arc;

use serde_json::json;

use super::invoker_tests::{Counter, counter_descriptor};
use crate::invoker::{ServiceInvokerManager, ValueType};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::factory::{FnServiceFactory, ServiceEnvironment, ServiceHandle};
use crate::kernel::name::ServiceName;

fn name(s: &str) -> ServiceName {
    ServiceName::new(s).expect("valid service name")
}

fn setup() -> (Kernel, Arc<ServiceInvokerManager>) {
    let kernel = Kernel::new("k").unwrap();
    kernel.boot().unwrap();
    let manager = ServiceInvokerManager::install(&kernel);
    (kernel, manager)
}

fn load_counter(kernel: &Kernel, service: &str) {
    let factory = FnServiceFactory::new("Counter", |_| Ok(Arc::new(Counter::new()) as ServiceHandle))
        .with_descriptor(Arc::new(counter_descriptor()));
    kernel
        .load_service(name(service), Arc::new(factory), ServiceEnvironment::default())
        .unwrap();
}

#[test]
fn test_kernel_service_is_attached_on_install() {
    let (_kernel, manager) = setup();
    let invoker = manager.get_invoker(&name("k")).expect("kernel invoker");

    assert_eq!(invoker.get_attribute("kernelName").unwrap(), json!("k"));
    assert_eq!(invoker.get_attribute("running").unwrap(), json!(true));
    assert_eq!(invoker.get_attribute("serviceCount").unwrap(), json!(1));
    assert_eq!(
        invoker.invoke("listServices", &[ValueType::String], &[json!("**")]).unwrap(),
        json!(["k"])
    );
}

#[test]
fn test_invoker_follows_service_lifecycle() {
    let (kernel, manager) = setup();
    load_counter(&kernel, "app/counter");
    assert!(manager.get_invoker(&name("app/counter")).is_none());

    kernel.start_service(&name("app/counter")).unwrap();
    let invoker = manager.get_invoker(&name("app/counter")).expect("attached on start");
    invoker.set_attribute("count", json!(3)).unwrap();
    assert_eq!(invoker.invoke("add", &[ValueType::Int], &[json!(4)]).unwrap(), json!(7));
    assert_eq!(manager.invoker_count(), 2);

    kernel.stop_service(&name("app/counter")).unwrap();
    assert!(manager.get_invoker(&name("app/counter")).is_none());
    // a handle kept across the stop is detached
    assert!(invoker.get_attribute("count").unwrap_err().is_illegal_state());

    // restarting builds a fresh invoker over the new object
    kernel.start_service(&name("app/counter")).unwrap();
    let invoker = manager.get_invoker(&name("app/counter")).unwrap();
    assert_eq!(invoker.get_attribute("count").unwrap(), json!(0));
}

#[test]
fn test_services_without_descriptor_are_skipped() {
    let (kernel, manager) = setup();
    kernel
        .load_service(name("plain"), Arc::new(FnServiceFactory::instance("Plain", ())), ServiceEnvironment::default())
        .unwrap();
    kernel.start_service(&name("plain")).unwrap();
    assert!(manager.get_invoker(&name("plain")).is_none());
}

#[test]
fn test_descriptor_type_mismatch_is_not_attached() {
    let (kernel, manager) = setup();
    let factory = FnServiceFactory::instance("Liar", 5u32).with_descriptor(Arc::new(counter_descriptor()));
    kernel
        .load_service(name("liar"), Arc::new(factory), ServiceEnvironment::default())
        .unwrap();
    kernel.start_service(&name("liar")).unwrap();
    assert!(manager.get_invoker(&name("liar")).is_none());
}

#[test]
fn test_install_after_start_attaches_running_services() {
    let kernel = Kernel::new("k").unwrap();
    kernel.boot().unwrap();
    load_counter(&kernel, "early");
    kernel.start_service(&name("early")).unwrap();

    let manager = ServiceInvokerManager::install(&kernel);
    assert!(manager.get_invoker(&name("early")).is_some());
    assert_eq!(manager.invoker_count(), 2);
}
