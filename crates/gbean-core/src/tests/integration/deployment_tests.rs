#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use super::common::{Cache, EventLog, Store, boot_stack, catalog, name};
use crate::config::{KernelConfig, check_services, load_services, start_services};
use crate::invoker::{InvokerError, ValueType};
use crate::kernel::error::Error;
use crate::kernel::name::NamePattern;
use crate::kernel::state::ServiceState;

const CONFIG: &str = r#"{
    "kernel": { "name": "shop" },
    "services": [
        {
            "name": "shop/cache",
            "type": "Cache",
            "references": { "store": "shop/store" },
            "properties": { "prefix": "v1:" }
        },
        { "name": "shop/store", "type": "Store", "properties": { "capacity": "2" } }
    ]
}"#;

fn write_config(dir: &Path, file: &str, content: &str) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, content).expect("Failed to write config");
    path
}

#[test]
fn test_deploy_from_file_and_manage() {
    let dir = tempdir().expect("Failed to create temp directory");
    let config = KernelConfig::load(&write_config(dir.path(), "shop.json", CONFIG)).unwrap();

    let stack = boot_stack(&config.kernel.name);
    let events = Arc::new(EventLog::default());
    stack
        .kernel
        .add_lifecycle_listener(events.clone(), vec![NamePattern::new("shop/*").unwrap()]);

    load_services(&stack.kernel, &config, &catalog()).unwrap();
    start_services(&stack.kernel, &config).unwrap();

    // the store starts first because the cache references it
    assert_eq!(
        events.entries(),
        vec![
            "loaded:shop/cache",
            "loaded:shop/store",
            "starting:shop/store",
            "running:shop/store",
            "starting:shop/cache",
            "running:shop/cache",
        ]
    );

    let cache = stack.kernel.get_service_as::<Cache>(&name("shop/cache")).unwrap();
    let store = stack.kernel.get_service_as::<Store>(&name("shop/store")).unwrap();
    assert!(Arc::ptr_eq(&cache.store, &store));
    assert_eq!(cache.prefix, "v1:");
    assert_eq!(store.capacity, 2);

    let shadow = stack.bridge.get_shadow(&name("shop/store")).unwrap();
    assert_eq!(shadow.get_attribute("capacity").unwrap(), json!(2));
    let put = [ValueType::String, ValueType::String];
    shadow.invoke("put", &put, &[json!("a"), json!("1")]).unwrap();
    shadow.invoke("put", &put, &[json!("b"), json!("2")]).unwrap();
    assert_eq!(shadow.get_attribute("size").unwrap(), json!(2));

    match shadow.invoke("put", &put, &[json!("c"), json!("3")]) {
        Err(Error::Invoker(InvokerError::Invocation { source, .. })) => {
            assert!(source.to_string().contains("full"));
        }
        other => panic!("expected the store to refuse, got {:?}", other),
    }
}

#[test]
fn test_stopping_a_dependency_is_refused_while_dependents_run() {
    let config = KernelConfig::from_str(CONFIG, crate::config::ConfigFormat::Json).unwrap();
    let stack = boot_stack("shop");
    load_services(&stack.kernel, &config, &catalog()).unwrap();
    start_services(&stack.kernel, &config).unwrap();

    let store_shadow = stack.bridge.get_shadow(&name("shop/store")).unwrap();
    assert!(matches!(
        store_shadow.invoke("stop", &[], &[]),
        Err(Error::UnsatisfiedConditions { .. })
    ));
    assert_eq!(store_shadow.get_attribute("state").unwrap(), json!("RUNNING"));
    // the invoker survives the refused stop
    assert!(stack.invokers.get_invoker(&name("shop/store")).is_some());

    stack.kernel.stop_service(&name("shop/cache")).unwrap();
    store_shadow.invoke("stop", &[], &[]).unwrap();
    assert_eq!(
        stack.kernel.get_service_state(&name("shop/store")).unwrap(),
        ServiceState::Stopped
    );
    assert!(stack.invokers.get_invoker(&name("shop/store")).is_none());
}

#[test]
fn test_check_matches_deployment() {
    let config = KernelConfig::from_str(CONFIG, crate::config::ConfigFormat::Json).unwrap();
    let checked = check_services(&config, &catalog()).unwrap();
    let names: Vec<_> = checked.into_iter().map(|(service, type_name)| format!("{}={}", service, type_name)).collect();
    assert_eq!(names, vec!["shop/cache=Cache", "shop/store=Store"]);
}

#[cfg(feature = "toml-config")]
#[test]
fn test_deploy_from_toml_file() {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = write_config(
        dir.path(),
        "shop.toml",
        r#"
[kernel]
name = "shop"

[[services]]
name = "shop/store"
type = "Store"

[[services]]
name = "shop/cache"
type = "Cache"
enabled = false

[services.references]
store = "shop/store"
"#,
    );
    let config = KernelConfig::load(&path).unwrap();
    let stack = boot_stack(&config.kernel.name);
    load_services(&stack.kernel, &config, &catalog()).unwrap();
    start_services(&stack.kernel, &config).unwrap();

    assert_eq!(stack.kernel.get_service_as::<Store>(&name("shop/store")).unwrap().capacity, 16);
    assert_eq!(
        stack.kernel.get_service_state(&name("shop/cache")).unwrap(),
        ServiceState::Stopped
    );
}
