//! Logging as a kernel service.
//!
//! Starting the service installs an `env_logger` backend (once per
//! process) and sets the global max level. The level comes from the
//! `level` key of the service's environment config and can be changed at
//! runtime through the `Level` attribute.
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use gbean_core::invoker::{ServiceDescriptor, ValueType};
use gbean_core::kernel::error::BoxError;
use gbean_core::kernel::factory::{ServiceContext, ServiceFactory, ServiceHandle};
use log::{LevelFilter, info};
use serde_json::json;

/// Type name reported by the logging service factory
pub const SERVICE_TYPE: &str = "LoggingService";

/// Environment config key holding the initial level
pub const LEVEL_KEY: &str = "level";

/// Level used when the environment config does not set one
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

/// The running logging service
#[derive(Debug)]
pub struct LoggingService {
    level: RwLock<LevelFilter>,
    installed: bool,
}

impl LoggingService {
    pub fn level(&self) -> LevelFilter {
        self.level.read().map(|level| *level).unwrap_or(DEFAULT_LEVEL)
    }

    /// Parse `level` (case-insensitive) and apply it process-wide
    pub fn set_level(&self, level: &str) -> Result<(), BoxError> {
        let filter = LevelFilter::from_str(level).map_err(|_| format!("unknown log level '{}'", level))?;
        match self.level.write() {
            Ok(mut current) => *current = filter,
            Err(poisoned) => *poisoned.into_inner() = filter,
        }
        log::set_max_level(filter);
        info!("Log level set to {}", filter);
        Ok(())
    }

    /// False when another logger was already installed in this process
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// Invoker descriptor of [`LoggingService`]
pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor::builder::<LoggingService>(SERVICE_TYPE)
        .getter("getLevel", ValueType::String, |service| json!(service.level().to_string()))
        .setter("setLevel", ValueType::String, |service, value| {
            let level = value.as_str().ok_or("level must be a string")?;
            service.set_level(level)
        })
        .getter("isInstalled", ValueType::Bool, |service| json!(service.is_installed()))
        .build()
}

/// Factory for [`LoggingService`]; load one per kernel
pub struct LoggingServiceFactory {
    default_level: LevelFilter,
    descriptor: Arc<ServiceDescriptor>,
}

impl Default for LoggingServiceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl LoggingServiceFactory {
    pub fn new(default_level: LevelFilter) -> Self {
        Self {
            default_level,
            descriptor: Arc::new(descriptor()),
        }
    }

    fn configured_level(&self, context: &ServiceContext<'_>) -> Result<LevelFilter, BoxError> {
        match context.environment().config().get::<String>(LEVEL_KEY) {
            Some(level) => LevelFilter::from_str(&level)
                .map_err(|_| BoxError::from(format!("unknown log level '{}' in config of '{}'", level, context.name()))),
            None => Ok(self.default_level),
        }
    }
}

impl ServiceFactory for LoggingServiceFactory {
    fn type_name(&self) -> &str {
        SERVICE_TYPE
    }

    fn descriptor(&self) -> Option<Arc<ServiceDescriptor>> {
        Some(self.descriptor.clone())
    }

    fn create_service(&self, context: &ServiceContext<'_>) -> Result<ServiceHandle, BoxError> {
        let level = self.configured_level(context)?;
        // RUST_LOG still refines the filter per module
        let installed = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init()
            .is_ok();
        log::set_max_level(level);
        if installed {
            info!("Logging initialized for kernel '{}' at {}", context.kernel().name(), level);
        } else {
            log::debug!("A logger is already installed; '{}' only adjusts the level", context.name());
        }
        Ok(Arc::new(LoggingService {
            level: RwLock::new(level),
            installed,
        }))
    }

    fn destroy_service(&self, context: &ServiceContext<'_>, _service: ServiceHandle) -> Result<(), BoxError> {
        info!("Shutting down logging service '{}'", context.name());
        log::logger().flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbean_core::config::ConfigData;
    use gbean_core::invoker::ServiceInvokerManager;
    use gbean_core::kernel::error::Error;
    use gbean_core::kernel::factory::ServiceEnvironment;
    use gbean_core::kernel::{Kernel, ServiceName};

    fn kernel_with_logging(level: Option<&str>) -> (Kernel, ServiceName) {
        let kernel = Kernel::new("test").expect("kernel name");
        kernel.boot().expect("boot");
        let mut config = ConfigData::new();
        if let Some(level) = level {
            config.set(LEVEL_KEY, level).unwrap();
        }
        let name = ServiceName::new("test/logging").unwrap();
        kernel
            .load_service(
                name.clone(),
                Arc::new(LoggingServiceFactory::default()),
                ServiceEnvironment::new("test").with_config(config),
            )
            .unwrap();
        (kernel, name)
    }

    #[test]
    fn test_level_from_config_and_invoker() {
        let (kernel, name) = kernel_with_logging(Some("debug"));
        let invokers = ServiceInvokerManager::install(&kernel);
        kernel.start_service(&name).unwrap();

        let service = kernel.get_service_as::<LoggingService>(&name).unwrap();
        assert_eq!(service.level(), LevelFilter::Debug);

        let invoker = invokers.get_invoker(&name).expect("invoker attached");
        assert_eq!(invoker.get_attribute("level").unwrap(), json!("DEBUG"));
        invoker.set_attribute("level", json!("warn")).unwrap();
        assert_eq!(service.level(), LevelFilter::Warn);

        assert!(invoker.set_attribute("level", json!("chatty")).is_err());
        assert_eq!(service.level(), LevelFilter::Warn);

        kernel.shutdown().unwrap();
    }

    #[test]
    fn test_unknown_config_level_fails_start() {
        let (kernel, name) = kernel_with_logging(Some("loud"));
        let err = kernel.start_service(&name).unwrap_err();
        assert!(matches!(err, Error::Factory { .. }));
        assert!(err.to_string().contains("loud"));
        assert!(!kernel.get_service_state(&name).unwrap().is_running());
    }

    #[test]
    fn test_second_logger_is_tolerated() {
        let (first, first_name) = kernel_with_logging(None);
        let (second, second_name) = kernel_with_logging(None);
        first.start_service(&first_name).unwrap();
        second.start_service(&second_name).unwrap();

        let a = first.get_service_as::<LoggingService>(&first_name).unwrap();
        let b = second.get_service_as::<LoggingService>(&second_name).unwrap();
        // at most one backend per process
        assert!(!(a.is_installed() && b.is_installed()));
        assert_eq!(b.level(), DEFAULT_LEVEL);
    }
}
