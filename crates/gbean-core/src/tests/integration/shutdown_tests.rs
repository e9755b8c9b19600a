#![cfg(test)]

use std::sync::{Arc, Mutex};

use super::common::{EventLog, boot_stack, catalog, name};
use crate::config::{ConfigFormat, KernelConfig, load_services, start_services};
use crate::kernel::error::Error;
use crate::lifecycle::LifecycleEvent;
use crate::management::Notification;

const CONFIG: &str = r#"{
    "kernel": { "name": "shop" },
    "services": [
        { "name": "shop/store", "type": "Store" },
        { "name": "shop/cache", "type": "Cache", "references": { "store": "shop/store" } }
    ]
}"#;

fn deployed_stack() -> super::common::Stack {
    let config = KernelConfig::from_str(CONFIG, ConfigFormat::Json).unwrap();
    let stack = boot_stack("shop");
    load_services(&stack.kernel, &config, &catalog()).unwrap();
    start_services(&stack.kernel, &config).unwrap();
    stack
}

#[test]
fn test_shutdown_stops_dependents_first_and_kernel_last() {
    let stack = deployed_stack();
    let events = Arc::new(EventLog::default());
    stack.kernel.add_lifecycle_listener(events.clone(), Vec::new());

    stack.kernel.shutdown().unwrap();

    let teardown: Vec<String> = events
        .entries()
        .into_iter()
        .filter(|entry| entry.starts_with("stopped:") || entry.starts_with("unloaded:"))
        .collect();
    assert_eq!(
        teardown,
        vec![
            "stopped:shop/cache",
            "stopped:shop/store",
            "unloaded:shop/cache",
            "unloaded:shop/store",
            "stopped:shop",
            "unloaded:shop",
        ]
    );
    assert!(!stack.kernel.is_running());
    assert!(stack.bridge.shadow_names().is_empty());
    assert_eq!(stack.invokers.invoker_count(), 0);
    assert!(stack.kernel.list_services_matching(&[]).is_empty());
}

#[test]
fn test_shadows_are_told_about_unload() {
    let stack = deployed_stack();
    let seen: Arc<Mutex<Vec<LifecycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let shadow = stack.bridge.get_shadow(&name("shop/store")).unwrap();
    let before = shadow.last_sequence();
    {
        let seen = seen.clone();
        shadow.subscribe(Arc::new(move |notification: &Notification| {
            seen.lock().unwrap().push(notification.event);
        }));
    }

    stack.kernel.shutdown().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            LifecycleEvent::Stopping,
            LifecycleEvent::Stopped,
            LifecycleEvent::Unloaded
        ]
    );
    assert_eq!(shadow.last_sequence(), before + 3);
    // a detached shadow no longer reaches the kernel
    assert!(shadow.get_attribute("state").is_err());
}

#[test]
fn test_hooks_run_while_services_are_still_up() {
    let stack = deployed_stack();
    let observed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    for hook in ["flush", "report"] {
        let kernel = stack.kernel.downgrade();
        let observed = observed.clone();
        stack.kernel.register_shutdown_hook(hook, move || {
            let kernel = kernel.upgrade().ok_or("kernel dropped")?;
            let state = kernel.get_service_state(&name("shop/cache"))?;
            observed.lock().unwrap().push(format!("{}:{}", hook, state.name()));
            Ok(())
        });
    }
    stack.kernel.register_shutdown_hook("broken", || Err("disk unplugged".into()));

    stack.kernel.shutdown().unwrap();

    assert_eq!(*observed.lock().unwrap(), vec!["report:RUNNING", "flush:RUNNING"]);
}

#[test]
fn test_shutdown_twice_is_refused() {
    let stack = deployed_stack();
    stack.kernel.shutdown().unwrap();
    assert!(matches!(stack.kernel.shutdown(), Err(Error::KernelNotRunning(_))));
}
