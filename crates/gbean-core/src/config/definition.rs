use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::data::{ConfigData, ConfigFormat};
use crate::config::error::{ConfigError, Result};
use crate::kernel::constants;
use crate::kernel::name::ServiceName;
use crate::recipe::RecipeOption;

fn default_kernel_name() -> String {
    constants::DEFAULT_KERNEL_NAME.to_string()
}

fn default_enabled() -> bool {
    true
}

/// `[kernel]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSection {
    #[serde(default = "default_kernel_name")]
    pub name: String,
    /// Environment config shared by every service; a service's own
    /// `config` entries override it
    #[serde(default, skip_serializing_if = "ConfigData::is_empty")]
    pub config: ConfigData,
}

impl Default for KernelSection {
    fn default() -> Self {
        Self {
            name: default_kernel_name(),
            config: ConfigData::new(),
        }
    }
}

/// One `[[services]]` entry: how to build a service and what it depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: ServiceName,
    /// Type name looked up in the type catalog
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub depends_on: Vec<ServiceName>,
    /// Plain property values handed to the recipe
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Property name -> service whose running object is injected
    #[serde(default)]
    pub references: BTreeMap<String, ServiceName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_method: Option<String>,
    #[serde(default)]
    pub options: Vec<RecipeOption>,
    /// Environment configuration visible to the factory
    #[serde(default)]
    pub config: ConfigData,
}

impl ServiceDefinition {
    pub fn new(name: ServiceName, type_name: impl Into<String>) -> Self {
        Self {
            name,
            type_name: type_name.into(),
            enabled: true,
            depends_on: Vec::new(),
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
            factory_method: None,
            init_method: None,
            options: Vec::new(),
            config: ConfigData::new(),
        }
    }

    /// Declared dependencies plus every referenced service
    pub fn dependencies(&self) -> BTreeSet<ServiceName> {
        self.depends_on
            .iter()
            .chain(self.references.values())
            .cloned()
            .collect()
    }
}

/// A kernel name plus the services to deploy into it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub kernel: KernelSection,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

impl KernelConfig {
    /// The kernel-wide config with `definition`'s own entries merged over it
    pub fn environment_config(&self, definition: &ServiceDefinition) -> ConfigData {
        let mut config = self.kernel.config.clone();
        config.merge(&definition.config);
        config
    }

    /// Load and validate a config file; the format follows the extension
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loading kernel config from {}", path.display());
        Self::from_str(&content, format)
    }

    pub fn from_str(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: KernelConfig = format.parse(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        format.render(self)
    }

    /// Reject duplicate names, self dependencies and references to
    /// services that are neither defined here nor the kernel itself.
    pub fn validate(&self) -> Result<()> {
        if self.kernel.name.trim().is_empty() {
            return Err(ConfigError::invalid(None, "kernel name must not be empty"));
        }
        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(&service.name) {
                return Err(ConfigError::invalid(Some(service.name.as_str()), "defined more than once"));
            }
        }
        for service in &self.services {
            if service.type_name.trim().is_empty() {
                return Err(ConfigError::invalid(Some(service.name.as_str()), "missing type"));
            }
            for dependency in service.dependencies() {
                if dependency == service.name {
                    return Err(ConfigError::invalid(Some(service.name.as_str()), "depends on itself"));
                }
                if !seen.contains(&dependency) && dependency.as_str() != self.kernel.name {
                    return Err(ConfigError::invalid(
                        Some(service.name.as_str()),
                        format!("depends on undefined service '{}'", dependency),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn service(&self, name: &ServiceName) -> Option<&ServiceDefinition> {
        self.services.iter().find(|service| &service.name == name)
    }
}
