//! Demonstration service types that configs can reference by name.
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use gbean_core::invoker::{ServiceDescriptor, ValueType};
use gbean_core::recipe::{ClassDescriptor, ParamType, Parameter, TypeCatalog};
use serde_json::json;

/// Reports the current time for a named zone
pub struct Clock {
    zone: String,
}

impl Clock {
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Seconds since the Unix epoch
    pub fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

/// Greets callers, stamping each greeting with its clock's zone
pub struct Greeter {
    greeting: String,
    clock: Arc<Clock>,
    greeted: Mutex<u64>,
}

impl Greeter {
    pub fn greet(&self, who: &str) -> String {
        let mut greeted = self.greeted.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *greeted += 1;
        format!("{}, {}! [{}]", self.greeting, who, self.clock.zone())
    }

    pub fn greeted(&self) -> u64 {
        *self.greeted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Catalog with `Clock` and `Greeter`
pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.register(
        ClassDescriptor::builder::<Clock>("Clock")
            .constructor(
                vec![Parameter::new("zone", ParamType::String).with_default(json!("UTC"))],
                |args| Ok(Clock { zone: args.string("zone")? }),
            )
            .build(),
        Some(
            ServiceDescriptor::builder::<Clock>("Clock")
                .getter("getZone", ValueType::String, |clock| json!(clock.zone()))
                .method("now", &[], ValueType::Int, |clock, _| Ok(json!(clock.now())))
                .build(),
        ),
    );
    catalog.register(
        ClassDescriptor::builder::<Greeter>("Greeter")
            .constructor(
                vec![
                    Parameter::new("greeting", ParamType::String).with_default(json!("Hello")),
                    Parameter::new("clock", ParamType::object::<Clock>()),
                ],
                |args| {
                    Ok(Greeter {
                        greeting: args.string("greeting")?,
                        clock: args.object::<Clock>("clock")?,
                        greeted: Mutex::new(0),
                    })
                },
            )
            .build(),
        Some(
            ServiceDescriptor::builder::<Greeter>("Greeter")
                .method("greet", &[ValueType::String], ValueType::String, |greeter, args| {
                    let who = args.first().and_then(|who| who.as_str()).ok_or("greet expects a name")?;
                    Ok(json!(greeter.greet(who)))
                })
                .getter("getGreeted", ValueType::Int, |greeter| json!(greeter.greeted()))
                .build(),
        ),
    );
    catalog
}
