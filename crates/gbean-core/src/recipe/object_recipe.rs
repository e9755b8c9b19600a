use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::invoker::value::Value;
use crate::recipe::argument::{Args, Argument, Instance};
use crate::recipe::descriptor::{ClassDescriptor, ConstructorDescriptor, Object, SetterDescriptor, Visibility};
use crate::recipe::error::{ConstructionError, Result};

/// How a named property gets its value
#[derive(Debug, Clone)]
pub enum Property {
    Value(Value),
    Object(Instance),
    /// Built first, then passed as an object
    Recipe(Arc<ObjectRecipe>),
    /// Looked up by name through a [`ReferenceResolver`]
    Reference(String),
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Property::Value(value)
    }
}

impl From<Instance> for Property {
    fn from(instance: Instance) -> Self {
        Property::Object(instance)
    }
}

impl From<ObjectRecipe> for Property {
    fn from(recipe: ObjectRecipe) -> Self {
        Property::Recipe(Arc::new(recipe))
    }
}

/// Relaxations of the default matching rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecipeOption {
    /// Properties without a setter or constructor parameter are skipped
    IgnoreMissingProperties,
    /// Non-public setters may be used
    PrivateProperties,
    /// Static setters may be used
    StaticProperties,
    /// Non-public constructors and factory methods may be used
    PrivateConstructor,
    /// Unset constructor parameters get the type default
    DefaultMissingArguments,
}

/// Supplies objects for [`Property::Reference`] values
pub trait ReferenceResolver {
    fn resolve(&mut self, name: &str) -> Result<Argument>;
}

/// Resolver for recipes that must not contain references
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn resolve(&mut self, name: &str) -> Result<Argument> {
        Err(ConstructionError::UnknownReference(name.to_string()))
    }
}

/// Why a setter could not be used for a property
#[derive(Debug, Clone, PartialEq, Eq)]
struct SetterMiss {
    level: u8,
    message: String,
}

enum SetterLookup<'a> {
    Found(&'a SetterDescriptor),
    Missing(Option<SetterMiss>),
}

/// Builds one object from a [`ClassDescriptor`] and named properties.
///
/// Properties with a usable `set<Name>` setter are applied after
/// construction; the rest must be consumed by the constructor. Constructors
/// are tried from the most parameters to the fewest.
#[derive(Clone)]
pub struct ObjectRecipe {
    class: Arc<ClassDescriptor>,
    properties: BTreeMap<String, Property>,
    factory_method: Option<String>,
    init_method: Option<String>,
    options: BTreeSet<RecipeOption>,
}

impl fmt::Debug for ObjectRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRecipe")
            .field("type_name", &self.class.type_name())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("factory_method", &self.factory_method)
            .field("init_method", &self.init_method)
            .field("options", &self.options)
            .finish()
    }
}

impl ObjectRecipe {
    pub fn new(class: Arc<ClassDescriptor>) -> Self {
        Self {
            class,
            properties: BTreeMap::new(),
            factory_method: None,
            init_method: None,
            options: BTreeSet::new(),
        }
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn type_name(&self) -> &str {
        self.class.type_name()
    }

    pub fn set_property(&mut self, name: impl Into<String>, property: impl Into<Property>) {
        self.properties.insert(name.into(), property.into());
    }

    pub fn with_property(mut self, name: impl Into<String>, property: impl Into<Property>) -> Self {
        self.set_property(name, property);
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.properties.insert(name.into(), Property::Reference(target.into()));
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    /// Names of every referenced object
    pub fn references(&self) -> Vec<&str> {
        self.properties
            .values()
            .filter_map(|property| match property {
                Property::Reference(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn with_factory_method(mut self, name: impl Into<String>) -> Self {
        self.factory_method = Some(name.into());
        self
    }

    pub fn with_init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method = Some(name.into());
        self
    }

    pub fn allow(mut self, option: RecipeOption) -> Self {
        self.options.insert(option);
        self
    }

    pub fn options(&self) -> &BTreeSet<RecipeOption> {
        &self.options
    }

    fn has(&self, option: RecipeOption) -> bool {
        self.options.contains(&option)
    }

    /// Build without a reference resolver
    pub fn create(&self) -> Result<Instance> {
        self.create_with(&mut NoReferences)
    }

    pub fn create_with(&self, resolver: &mut dyn ReferenceResolver) -> Result<Instance> {
        let mut resolved = self.resolve_properties(resolver)?;

        let mut setters: BTreeMap<String, &SetterDescriptor> = BTreeMap::new();
        let mut required: Vec<(String, Option<SetterMiss>)> = Vec::new();
        for (name, argument) in &resolved {
            match self.find_setter(name, argument) {
                SetterLookup::Found(setter) => {
                    setters.insert(name.clone(), setter);
                }
                SetterLookup::Missing(miss) => required.push((name.clone(), miss)),
            }
        }

        let must_consume: Vec<&str> = if self.has(RecipeOption::IgnoreMissingProperties) {
            Vec::new()
        } else {
            required.iter().map(|(name, _)| name.as_str()).collect()
        };

        let (constructor, args) = self.select_constructor(&resolved, &must_consume, &required)?;
        let mut object = constructor
            .construct(&args)
            .map_err(|source| self.instantiation(source))?;

        let consumed: BTreeSet<&str> = constructor.parameters().iter().map(|param| param.name()).collect();
        resolved.retain(|name, _| !consumed.contains(name.as_str()));
        self.apply_setters(&mut object, resolved, &setters)?;

        if let Some(init) = &self.init_method {
            let method = self
                .class
                .lifecycle_method(init)
                .ok_or_else(|| ConstructionError::MissingInitMethod {
                    type_name: self.type_name().to_string(),
                    method: init.clone(),
                })?;
            method.invoke(object.as_mut()).map_err(|source| self.instantiation(source))?;
        }

        log::trace!("Built {} via {}", self.type_name(), constructor.signature());
        Ok(Instance::from_handle(self.type_name(), Arc::from(object)))
    }

    /// Build and downcast to `T`
    pub fn create_as<T: std::any::Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let instance = self.create()?;
        instance.downcast::<T>().ok_or_else(|| ConstructionError::Conversion {
            expected: std::any::type_name::<T>().to_string(),
            actual: instance.type_name().to_string(),
            message: "recipe produced a different type".to_string(),
        })
    }

    fn instantiation(&self, source: crate::kernel::error::BoxError) -> ConstructionError {
        ConstructionError::Instantiation {
            type_name: self.type_name().to_string(),
            source,
        }
    }

    fn resolve_properties(&self, resolver: &mut dyn ReferenceResolver) -> Result<BTreeMap<String, Argument>> {
        let mut resolved = BTreeMap::new();
        for (name, property) in &self.properties {
            let argument = match property {
                Property::Value(value) => Argument::Value(value.clone()),
                Property::Object(instance) => Argument::Object(instance.clone()),
                Property::Recipe(recipe) => Argument::Object(recipe.create_with(resolver)?),
                Property::Reference(target) => resolver.resolve(target)?,
            };
            resolved.insert(name.clone(), argument);
        }
        Ok(resolved)
    }

    fn find_setter(&self, property: &str, argument: &Argument) -> SetterLookup<'_> {
        let mut best: Option<SetterMiss> = None;
        let mut record = |level: u8, message: String| {
            if best.as_ref().is_none_or(|miss| level > miss.level) {
                best = Some(SetterMiss { level, message });
            }
        };

        for setter in self.class.setters().iter().filter(|setter| setter.sets(property)) {
            let spec = setter.spec();
            if spec.parameters.len() != 1 {
                record(1, format!("{} takes {} parameters", spec.name, spec.parameters.len()));
            } else if spec.returns_value {
                record(2, format!("{} returns a value", spec.name));
            } else if spec.is_abstract {
                record(3, format!("{} is abstract", spec.name));
            } else if spec.visibility != Visibility::Public && !self.has(RecipeOption::PrivateProperties) {
                record(4, format!("{} is not public", spec.name));
            } else if spec.is_static && !self.has(RecipeOption::StaticProperties) {
                record(4, format!("{} is static", spec.name));
            } else if !spec.parameters[0].accepts(argument) {
                record(5, format!("{} expects {}", spec.name, spec.parameters[0]));
            } else {
                return SetterLookup::Found(setter);
            }
        }
        SetterLookup::Missing(best)
    }

    fn candidates(&self) -> Result<Vec<&ConstructorDescriptor>> {
        let mut candidates: Vec<&ConstructorDescriptor> = match &self.factory_method {
            Some(name) => {
                let methods = self.class.factory_methods(name);
                if methods.is_empty() {
                    return Err(ConstructionError::NoMatchingConstructor {
                        type_name: self.type_name().to_string(),
                        message: format!("no factory method named '{}'", name),
                    });
                }
                methods
            }
            None => self.class.constructors().iter().collect(),
        };
        if !self.has(RecipeOption::PrivateConstructor) {
            candidates.retain(|candidate| candidate.visibility() == Visibility::Public);
        }
        // stable: equal arity keeps declaration order
        candidates.sort_by(|a, b| b.parameters().len().cmp(&a.parameters().len()));
        Ok(candidates)
    }

    fn select_constructor(
        &self,
        resolved: &BTreeMap<String, Argument>,
        must_consume: &[&str],
        required: &[(String, Option<SetterMiss>)],
    ) -> Result<(&ConstructorDescriptor, Args)> {
        let candidates = self.candidates()?;
        let mut first_miss: Option<String> = None;

        for candidate in candidates.iter().copied() {
            match self.bind_arguments(candidate, resolved, must_consume) {
                Ok(args) => return Ok((candidate, args)),
                Err(reason) => {
                    log::trace!("Skipping {}: {}", candidate.signature(), reason);
                    first_miss.get_or_insert_with(|| format!("{}: {}", candidate.signature(), reason));
                }
            }
        }

        let accessor_miss = required
            .iter()
            .filter(|(name, _)| must_consume.contains(&name.as_str()))
            .filter_map(|(name, miss)| miss.as_ref().map(|miss| (name, miss)))
            .max_by_key(|(_, miss)| miss.level);
        if let Some((property, miss)) = accessor_miss {
            return Err(ConstructionError::MissingAccessor {
                type_name: self.type_name().to_string(),
                property: property.clone(),
                level: miss.level,
                message: miss.message.clone(),
            });
        }

        let message = match first_miss {
            Some(reason) => reason,
            None if candidates.is_empty() => "no accessible constructor".to_string(),
            None => "no candidate matched".to_string(),
        };
        Err(ConstructionError::NoMatchingConstructor {
            type_name: self.type_name().to_string(),
            message,
        })
    }

    fn bind_arguments(
        &self,
        candidate: &ConstructorDescriptor,
        resolved: &BTreeMap<String, Argument>,
        must_consume: &[&str],
    ) -> std::result::Result<Args, String> {
        let uncovered: Vec<&str> = must_consume
            .iter()
            .copied()
            .filter(|property| !candidate.parameters().iter().any(|param| param.name() == *property))
            .collect();
        if !uncovered.is_empty() {
            return Err(format!("does not take {}", uncovered.join(", ")));
        }

        let mut entries = Vec::with_capacity(candidate.parameters().len());
        for param in candidate.parameters() {
            let argument = match (resolved.get(param.name()), param.default()) {
                (Some(argument), _) => param
                    .param_type()
                    .coerce(argument)
                    .map_err(|e| format!("parameter '{}': {}", param.name(), e))?,
                (None, Some(default)) => default.clone(),
                (None, None) if self.has(RecipeOption::DefaultMissingArguments) => {
                    param.param_type().default_argument()
                }
                (None, None) => return Err(format!("no value for parameter '{}'", param.name())),
            };
            entries.push((param.name().to_string(), argument));
        }
        Ok(Args::new(entries))
    }

    fn apply_setters(
        &self,
        object: &mut Object,
        remaining: BTreeMap<String, Argument>,
        setters: &BTreeMap<String, &SetterDescriptor>,
    ) -> Result<()> {
        for (name, argument) in remaining {
            let Some(setter) = setters.get(&name) else {
                log::debug!("Ignoring property '{}' of {}: no setter", name, self.type_name());
                continue;
            };
            let param_type = setter.spec().parameters[0];
            let argument = param_type.coerce(&argument)?;
            setter
                .apply(object.as_mut(), std::slice::from_ref(&argument))
                .map_err(|source| self.instantiation(source))?;
        }
        Ok(())
    }
}
