use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::config::{ConfigFormat, KernelConfig, build_recipe, check_services, load_services, start_services};
use crate::invoker::{ServiceDescriptor, ServiceInvokerManager, ValueType};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::error::Error;
use crate::kernel::name::ServiceName;
use crate::kernel::state::ServiceState;
use crate::recipe::{ClassDescriptor, ConstructionError, ParamType, Parameter, TypeCatalog};

struct Clock {
    zone: String,
}

struct Greeter {
    greeting: String,
    clock: Arc<Clock>,
    punctuation: Mutex<String>,
}

impl Greeter {
    fn greet(&self, who: &str) -> String {
        format!("{}, {} ({}){}", self.greeting, who, self.clock.zone, self.punctuation.lock().unwrap())
    }
}

fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.register(
        ClassDescriptor::builder::<Clock>("Clock")
            .constructor(
                vec![Parameter::new("zone", ParamType::String).with_default(json!("UTC"))],
                |args| Ok(Clock { zone: args.string("zone")? }),
            )
            .build(),
        None,
    );
    catalog.register(
        ClassDescriptor::builder::<Greeter>("Greeter")
            .constructor(
                vec![
                    Parameter::new("greeting", ParamType::String),
                    Parameter::new("clock", ParamType::object::<Clock>()),
                ],
                |args| {
                    Ok(Greeter {
                        greeting: args.string("greeting")?,
                        clock: args.object::<Clock>("clock")?,
                        punctuation: Mutex::new(String::new()),
                    })
                },
            )
            .setter("setPunctuation", ParamType::String, |greeter, arg| {
                *greeter.punctuation.get_mut().unwrap() = arg.string()?;
                Ok(())
            })
            .build(),
        Some(
            ServiceDescriptor::builder::<Greeter>("Greeter")
                .method("greet", &[ValueType::String], ValueType::String, |greeter, args| {
                    Ok(json!(greeter.greet(args[0].as_str().unwrap_or("stranger"))))
                })
                .getter("getPunctuation", ValueType::String, |greeter| {
                    json!(*greeter.punctuation.lock().unwrap())
                })
                .setter("setPunctuation", ValueType::String, |greeter, value| {
                    *greeter.punctuation.lock().unwrap() = value.as_str().unwrap_or_default().to_string();
                    Ok(())
                })
                .build(),
        ),
    );
    catalog
}

const CONFIG: &str = r#"{
    "kernel": { "name": "demo", "config": { "audience": "everyone", "region": "eu" } },
    "services": [
        {
            "name": "app/greeter",
            "type": "Greeter",
            "properties": { "greeting": "Hello", "punctuation": "!" },
            "references": { "clock": "app/clock" },
            "config": { "audience": "world" }
        },
        { "name": "app/clock", "type": "Clock", "properties": { "zone": "CET" } },
        { "name": "app/spare", "type": "Clock", "enabled": false }
    ]
}"#;

fn name(s: &str) -> ServiceName {
    ServiceName::new(s).unwrap()
}

fn deploy() -> (Kernel, KernelConfig) {
    let config = KernelConfig::from_str(CONFIG, ConfigFormat::Json).unwrap();
    let kernel = Kernel::new(&config.kernel.name).unwrap();
    kernel.boot().unwrap();
    let loaded = load_services(&kernel, &config, &catalog()).unwrap();
    assert_eq!(loaded, vec![name("app/greeter"), name("app/clock"), name("app/spare")]);
    (kernel, config)
}

#[test]
fn test_load_registers_services_and_dependencies() {
    let (kernel, _config) = deploy();

    for service in ["app/greeter", "app/clock", "app/spare"] {
        assert_eq!(kernel.get_service_state(&name(service)).unwrap(), ServiceState::Stopped);
    }
    assert_eq!(
        kernel.get_my_dependencies(&name("app/greeter")).into_iter().collect::<Vec<_>>(),
        vec![name("app/clock")]
    );
    assert!(!kernel.is_service_enabled(&name("app/spare")).unwrap());

    let environment = kernel.get_service_environment(&name("app/greeter")).unwrap();
    assert_eq!(environment.label(), "demo");
    assert_eq!(environment.config().get::<String>("audience").unwrap(), "world");
    assert_eq!(environment.config().get::<String>("region").unwrap(), "eu");
    let clock_environment = kernel.get_service_environment(&name("app/clock")).unwrap();
    assert_eq!(clock_environment.config().get::<String>("audience").unwrap(), "everyone");
    assert!(kernel.get_service_descriptor(&name("app/greeter")).unwrap().is_some());
    assert!(kernel.get_service_descriptor(&name("app/clock")).unwrap().is_none());
}

#[test]
fn test_start_services_wires_references() {
    let (kernel, config) = deploy();
    let invokers = ServiceInvokerManager::install(&kernel);
    start_services(&kernel, &config).unwrap();

    assert_eq!(kernel.get_service_state(&name("app/clock")).unwrap(), ServiceState::Running);
    assert_eq!(kernel.get_service_state(&name("app/spare")).unwrap(), ServiceState::Stopped);

    let greeter = kernel.get_service_as::<Greeter>(&name("app/greeter")).unwrap();
    let clock = kernel.get_service_as::<Clock>(&name("app/clock")).unwrap();
    assert!(Arc::ptr_eq(&greeter.clock, &clock));
    assert_eq!(greeter.greet("Ada"), "Hello, Ada (CET)!");

    let invoker = invokers.get_invoker(&name("app/greeter")).unwrap();
    invoker.set_attribute("punctuation", json!("?")).unwrap();
    assert_eq!(
        invoker.invoke("greet", &[ValueType::String], &[json!("Bob")]).unwrap(),
        json!("Hello, Bob (CET)?")
    );
}

#[test]
fn test_check_services_builds_without_kernel() {
    let config = KernelConfig::from_str(CONFIG, ConfigFormat::Json).unwrap();
    let checked = check_services(&config, &catalog()).unwrap();
    assert_eq!(
        checked,
        vec![
            (name("app/greeter"), "Greeter".to_string()),
            (name("app/clock"), "Clock".to_string()),
        ]
    );
}

#[test]
fn test_check_services_reports_construction_errors() {
    let mut config = KernelConfig::from_str(CONFIG, ConfigFormat::Json).unwrap();
    config.services[0].properties.remove("greeting");
    let err = check_services(&config, &catalog()).unwrap_err();
    assert!(matches!(err, Error::Recipe(ConstructionError::NoMatchingConstructor { .. })));
}

#[test]
fn test_unknown_type_is_rejected() {
    let mut config = KernelConfig::from_str(CONFIG, ConfigFormat::Json).unwrap();
    config.services[1].type_name = "Sundial".to_string();

    let err = build_recipe(&config.services[1], &catalog()).unwrap_err();
    assert!(matches!(err, Error::Recipe(ConstructionError::UnknownType(t)) if t == "Sundial"));

    let kernel = Kernel::new("demo").unwrap();
    kernel.boot().unwrap();
    assert!(load_services(&kernel, &config, &catalog()).is_err());
}
