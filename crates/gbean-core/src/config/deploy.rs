//! Turns a [`KernelConfig`] into loaded kernel services.
use std::sync::Arc;

use crate::config::definition::{KernelConfig, ServiceDefinition};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::error::Result;
use crate::kernel::factory::ServiceEnvironment;
use crate::kernel::name::ServiceName;
use crate::recipe::catalog::TypeCatalog;
use crate::recipe::graph::ObjectGraph;
use crate::recipe::object_recipe::{ObjectRecipe, Property};
use crate::recipe::service::RecipeServiceFactory;

/// Recipe described by one service definition
pub fn build_recipe(definition: &ServiceDefinition, catalog: &TypeCatalog) -> Result<ObjectRecipe> {
    let mut recipe = catalog.recipe(&definition.type_name)?;
    for (name, value) in &definition.properties {
        recipe.set_property(name.clone(), Property::Value(value.clone()));
    }
    for (name, target) in &definition.references {
        recipe.set_property(name.clone(), Property::Reference(target.to_string()));
    }
    if let Some(factory_method) = &definition.factory_method {
        recipe = recipe.with_factory_method(factory_method.clone());
    }
    if let Some(init_method) = &definition.init_method {
        recipe = recipe.with_init_method(init_method.clone());
    }
    for option in &definition.options {
        recipe = recipe.allow(*option);
    }
    Ok(recipe)
}

/// Service factory for one definition, carrying the catalog's invoker descriptor
pub fn build_factory(definition: &ServiceDefinition, catalog: &TypeCatalog) -> Result<RecipeServiceFactory> {
    let recipe = build_recipe(definition, catalog)?;
    let descriptor = catalog
        .get(&definition.type_name)
        .and_then(|entry| entry.service.clone());
    let factory = definition
        .dependencies()
        .into_iter()
        .fold(RecipeServiceFactory::new(recipe), RecipeServiceFactory::depends_on)
        .with_descriptor(descriptor)
        .with_enabled(definition.enabled);
    Ok(factory)
}

/// Load every configured service into `kernel`, in definition order
pub fn load_services(kernel: &Kernel, config: &KernelConfig, catalog: &TypeCatalog) -> Result<Vec<ServiceName>> {
    let mut loaded = Vec::with_capacity(config.services.len());
    for definition in &config.services {
        let factory = build_factory(definition, catalog)?;
        let environment = ServiceEnvironment::new(kernel.name().as_str()).with_config(config.environment_config(definition));
        kernel.load_service(definition.name.clone(), Arc::new(factory), environment)?;
        log::debug!("Loaded '{}' ({})", definition.name, definition.type_name);
        loaded.push(definition.name.clone());
    }
    log::info!("Loaded {} configured service(s)", loaded.len());
    Ok(loaded)
}

/// Recursively start every enabled configured service
pub fn start_services(kernel: &Kernel, config: &KernelConfig) -> Result<()> {
    for definition in config.services.iter().filter(|definition| definition.enabled) {
        kernel.start_service_recursive(&definition.name)?;
    }
    Ok(())
}

/// Build every enabled service's object without a kernel.
///
/// References resolve to the other configured services. Returns each
/// service name with the type it built.
pub fn check_services(config: &KernelConfig, catalog: &TypeCatalog) -> Result<Vec<(ServiceName, String)>> {
    let mut graph = ObjectGraph::new();
    for definition in &config.services {
        graph.add_recipe(definition.name.as_str(), build_recipe(definition, catalog)?);
    }
    let mut checked = Vec::new();
    for definition in config.services.iter().filter(|definition| definition.enabled) {
        let instance = graph.create(definition.name.as_str())?;
        checked.push((definition.name.clone(), instance.type_name().to_string()));
    }
    Ok(checked)
}
