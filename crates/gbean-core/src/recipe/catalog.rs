use std::collections::BTreeMap;
use std::sync::Arc;

use crate::invoker::descriptor::ServiceDescriptor;
use crate::recipe::descriptor::ClassDescriptor;
use crate::recipe::error::{ConstructionError, Result};
use crate::recipe::object_recipe::ObjectRecipe;

/// Construction and invocation metadata registered for one type name
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub class: Arc<ClassDescriptor>,
    pub service: Option<Arc<ServiceDescriptor>>,
}

/// Type name -> descriptors, so configuration can refer to types by name
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    types: BTreeMap<String, CatalogEntry>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the class descriptor's type name, replacing any previous entry
    pub fn register(&mut self, class: ClassDescriptor, service: Option<ServiceDescriptor>) {
        let type_name = class.type_name().to_string();
        if self.types.contains_key(&type_name) {
            log::warn!("Replacing catalog entry for type '{}'", type_name);
        }
        self.types.insert(
            type_name,
            CatalogEntry {
                class: Arc::new(class),
                service: service.map(Arc::new),
            },
        );
    }

    pub fn get(&self, type_name: &str) -> Option<&CatalogEntry> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Empty recipe for a registered type
    pub fn recipe(&self, type_name: &str) -> Result<ObjectRecipe> {
        self.get(type_name)
            .map(|entry| ObjectRecipe::new(entry.class.clone()))
            .ok_or_else(|| ConstructionError::UnknownType(type_name.to_string()))
    }
}
