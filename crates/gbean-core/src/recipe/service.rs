use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::invoker::descriptor::ServiceDescriptor;
use crate::kernel::error::BoxError;
use crate::kernel::factory::{ServiceContext, ServiceFactory, ServiceHandle};
use crate::kernel::name::ServiceName;
use crate::recipe::argument::{Argument, Instance};
use crate::recipe::error::{ConstructionError, Result};
use crate::recipe::object_recipe::{ObjectRecipe, ReferenceResolver};

/// Resolves recipe references to running kernel services
struct KernelReferences<'a, 'k> {
    context: &'a ServiceContext<'k>,
}

impl ReferenceResolver for KernelReferences<'_, '_> {
    fn resolve(&mut self, name: &str) -> Result<Argument> {
        let unknown = || ConstructionError::UnknownReference(name.to_string());
        let service_name = ServiceName::new(name).map_err(|_| unknown())?;
        let handle = self.context.kernel().get_service(&service_name).map_err(|e| {
            log::debug!("Reference '{}' of '{}' unavailable: {}", name, self.context.name(), e);
            unknown()
        })?;
        let type_name = self
            .context
            .kernel()
            .get_service_factory(&service_name)
            .map(|factory| factory.type_name().to_string())
            .unwrap_or_else(|_| name.to_string());
        Ok(Argument::Object(Instance::from_handle(type_name, handle)))
    }
}

/// [`ServiceFactory`] that builds its service object from an [`ObjectRecipe`].
///
/// Reference properties name other services; they are declared as
/// dependencies and resolved to those services' running objects.
pub struct RecipeServiceFactory {
    recipe: Arc<ObjectRecipe>,
    dependencies: BTreeSet<ServiceName>,
    descriptor: Option<Arc<ServiceDescriptor>>,
    enabled: bool,
}

impl fmt::Debug for RecipeServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeServiceFactory")
            .field("recipe", &self.recipe)
            .field("dependencies", &self.dependencies)
            .field("has_descriptor", &self.descriptor.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl RecipeServiceFactory {
    /// Every reference of `recipe` that is a valid service name becomes a dependency
    pub fn new(recipe: ObjectRecipe) -> Self {
        let dependencies = recipe
            .references()
            .into_iter()
            .filter_map(|name| ServiceName::new(name).ok())
            .collect();
        Self {
            recipe: Arc::new(recipe),
            dependencies,
            descriptor: None,
            enabled: true,
        }
    }

    pub fn depends_on(mut self, name: ServiceName) -> Self {
        self.dependencies.insert(name);
        self
    }

    pub fn with_descriptor(mut self, descriptor: Option<Arc<ServiceDescriptor>>) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn recipe(&self) -> &ObjectRecipe {
        &self.recipe
    }
}

impl ServiceFactory for RecipeServiceFactory {
    fn type_name(&self) -> &str {
        self.recipe.type_name()
    }

    fn dependencies(&self) -> BTreeSet<ServiceName> {
        self.dependencies.clone()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn descriptor(&self) -> Option<Arc<ServiceDescriptor>> {
        self.descriptor.clone()
    }

    fn create_service(&self, context: &ServiceContext<'_>) -> std::result::Result<ServiceHandle, BoxError> {
        let mut references = KernelReferences { context };
        let instance = self.recipe.create_with(&mut references)?;
        Ok(instance.handle())
    }
}
