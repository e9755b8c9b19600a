mod demo;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use core_logging::{LEVEL_KEY, LoggingServiceFactory};
use gbean_core::config::{ConfigData, KernelConfig, check_services, load_services, start_services};
use gbean_core::invoker::ServiceInvokerManager;
use gbean_core::kernel::error::Result;
use gbean_core::kernel::{Kernel, NamePattern, ServiceEnvironment, ServiceName};
use gbean_core::management::ManagementBridge;
use log::{error, info};

/// GBean: a service lifecycle kernel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Simple ping command for testing
    #[arg(long)]
    ping: bool,

    /// Initial level of the logging service
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot a kernel, deploy the configured services and run until Ctrl-C
    Run {
        /// Kernel config file (json, toml or yaml)
        #[arg(long)]
        config: PathBuf,
        /// Shut down right after everything has started
        #[arg(long)]
        once: bool,
    },
    /// Build every configured service without starting a kernel
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Load the configured services and print their states
    List {
        #[arg(long)]
        config: PathBuf,
        /// Only show services matching this name pattern
        #[arg(long)]
        pattern: Option<String>,
    },
}

/// A booted kernel with the management layers attached
struct Runtime {
    kernel: Kernel,
    bridge: Arc<ManagementBridge>,
}

impl Runtime {
    fn boot(config: &KernelConfig, log_level: &str) -> Result<Self> {
        println!("Initializing kernel...");
        let kernel = Kernel::new(&config.kernel.name)?;
        kernel.boot()?;
        let invokers = ServiceInvokerManager::install(&kernel);
        let bridge = ManagementBridge::install(&kernel, Some(invokers));

        let runtime = Self { kernel, bridge };
        if let Err(e) = runtime.deploy(config, log_level) {
            error!("Failed to deploy kernel '{}': {}", runtime.kernel.name(), e);
            if let Err(shutdown_error) = runtime.shutdown() {
                error!("Shutdown after failed deploy also failed: {}", shutdown_error);
            }
            return Err(e);
        }
        Ok(runtime)
    }

    /// Start the logging service, then load every configured service
    fn deploy(&self, config: &KernelConfig, log_level: &str) -> Result<()> {
        let logging = ServiceName::new(format!("{}/logging", self.kernel.name()))?;
        let mut logging_config = ConfigData::new();
        logging_config.set(LEVEL_KEY, log_level)?;
        self.kernel.load_service(
            logging.clone(),
            Arc::new(LoggingServiceFactory::default()),
            ServiceEnvironment::new("core-logging").with_config(logging_config),
        )?;
        self.kernel.start_service(&logging)?;
        load_services(&self.kernel, config, &demo::catalog())?;
        Ok(())
    }

    fn print_services(&self, patterns: &[NamePattern]) {
        println!("{:<32} {:<9} {:<16} ATTRIBUTES", "SERVICE", "STATE", "TYPE");
        for name in self.kernel.list_services_matching(patterns) {
            let state = self
                .kernel
                .get_service_state(&name)
                .map(|state| state.name())
                .unwrap_or("UNKNOWN");
            let type_name = self
                .kernel
                .get_service_factory(&name)
                .map(|factory| factory.type_name().to_string())
                .unwrap_or_default();
            let attributes = self
                .bridge
                .get_shadow(&name)
                .map(|shadow| shadow.attribute_names().join(","))
                .unwrap_or_default();
            println!("{:<32} {:<9} {:<16} {}", name, state, type_name, attributes);
        }
    }

    fn shutdown(self) -> Result<()> {
        println!("Shutting down kernel...");
        self.kernel.shutdown()
    }
}

fn load_config(path: &Path) -> Result<KernelConfig> {
    let config = KernelConfig::load(path)?;
    info!("Loaded config '{}' for kernel '{}'", path.display(), config.kernel.name);
    Ok(config)
}

async fn run(config_path: &Path, once: bool, log_level: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let runtime = Runtime::boot(&config, log_level)?;
    if let Err(e) = start_services(&runtime.kernel, &config) {
        error!("Failed to start configured services: {}", e);
        runtime.print_services(&[]);
        runtime.shutdown()?;
        return Err(e);
    }
    runtime.print_services(&[]);

    if !once {
        println!("Kernel '{}' is running. Press Ctrl-C to stop.", runtime.kernel.name());
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    }
    runtime.shutdown()
}

fn check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let checked = check_services(&config, &demo::catalog())?;
    println!("Config for kernel '{}' is valid:", config.kernel.name);
    for (name, type_name) in &checked {
        println!("  - {}: {}", name, type_name);
    }
    let skipped = config.services.len() - checked.len();
    if skipped > 0 {
        println!("  ({} disabled service(s) not built)", skipped);
    }
    Ok(())
}

fn list(config_path: &Path, pattern: Option<&str>, log_level: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let patterns = pattern.map(NamePattern::new).transpose()?.into_iter().collect::<Vec<_>>();
    let runtime = Runtime::boot(&config, log_level)?;
    runtime.print_services(&patterns);
    runtime.shutdown()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let result = match &args.command {
        Some(Commands::Run { config, once }) => run(config, *once, &args.log_level).await,
        Some(Commands::Check { config }) => check(config),
        Some(Commands::List { config, pattern }) => list(config, pattern.as_deref(), &args.log_level),
        None => {
            println!("No command specified. Run 'gbean --help' for usage.");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
