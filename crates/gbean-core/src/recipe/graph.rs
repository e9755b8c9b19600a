use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::recipe::argument::{Argument, Instance};
use crate::recipe::error::{ConstructionError, Result};
use crate::recipe::object_recipe::{ObjectRecipe, ReferenceResolver};

/// Named recipes whose references point at each other.
///
/// Each name is built at most once; later references get the cached
/// instance. A reference back to a name still under construction is a
/// `CircularDependency` carrying the path.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    recipes: BTreeMap<String, Arc<ObjectRecipe>>,
    instances: HashMap<String, Instance>,
    creating: Vec<String>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_recipe(&mut self, name: impl Into<String>, recipe: ObjectRecipe) {
        self.recipes.insert(name.into(), Arc::new(recipe));
    }

    /// Register an already built object under `name`
    pub fn add_instance(&mut self, name: impl Into<String>, instance: Instance) {
        self.instances.insert(name.into(), instance);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name) || self.instances.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.recipes.keys().cloned().collect()
    }

    /// Build `name` and everything it references
    pub fn create(&mut self, name: &str) -> Result<Instance> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(instance.clone());
        }
        if let Some(pos) = self.creating.iter().position(|pending| pending == name) {
            let mut cycle = self.creating[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(ConstructionError::CircularDependency(cycle));
        }
        let recipe = self
            .recipes
            .get(name)
            .cloned()
            .ok_or_else(|| ConstructionError::UnknownReference(name.to_string()))?;

        self.creating.push(name.to_string());
        let built = recipe.create_with(self);
        self.creating.pop();

        let instance = built?;
        self.instances.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Build every recipe, in name order
    pub fn create_all(&mut self) -> Result<BTreeMap<String, Instance>> {
        let mut built = BTreeMap::new();
        for name in self.names() {
            let instance = self.create(&name)?;
            built.insert(name, instance);
        }
        Ok(built)
    }
}

impl ReferenceResolver for ObjectGraph {
    fn resolve(&mut self, name: &str) -> Result<Argument> {
        self.create(name).map(Argument::Object)
    }
}
