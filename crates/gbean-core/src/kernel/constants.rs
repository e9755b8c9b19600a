/// Application name
pub const APP_NAME: &str = "GBean";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kernel name used when a config does not set one
pub const DEFAULT_KERNEL_NAME: &str = "gbean";

/// Type name reported by the kernel's own service
pub const KERNEL_SERVICE_TYPE: &str = "GBeanKernel";

/// Default re-poll interval of blocking starts, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Environment label of services loaded without one
pub const DEFAULT_ENVIRONMENT_LABEL: &str = "default";
