use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::kernel::error::BoxError;
use crate::recipe::argument::{Args, Argument, ParamType};

/// A freshly constructed object, still exclusively owned by the recipe
pub type Object = Box<dyn Any + Send + Sync>;

type ConstructFn = dyn Fn(&Args) -> Result<Object, BoxError> + Send + Sync;
type SetterFn = dyn Fn(&mut (dyn Any + Send + Sync), &[Argument]) -> Result<(), BoxError> + Send + Sync;
type LifecycleFn = dyn Fn(&mut (dyn Any + Send + Sync)) -> Result<(), BoxError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Named, typed constructor parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    param_type: ParamType,
    default: Option<Argument>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
        }
    }

    /// Value used when the recipe does not define this parameter
    pub fn with_default(mut self, default: impl Into<Argument>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    pub fn default(&self) -> Option<&Argument> {
        self.default.as_ref()
    }
}

/// A constructor, or a static factory method when it has a name
#[derive(Clone)]
pub struct ConstructorDescriptor {
    name: Option<String>,
    parameters: Vec<Parameter>,
    visibility: Visibility,
    construct: Arc<ConstructFn>,
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

impl ConstructorDescriptor {
    pub fn factory_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// `name(type, type)` for diagnostics
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|param| format!("{}: {}", param.name, param.param_type))
            .collect();
        format!("{}({})", self.name.as_deref().unwrap_or("new"), params.join(", "))
    }

    pub(crate) fn construct(&self, args: &Args) -> Result<Object, BoxError> {
        (self.construct)(args)
    }
}

/// Shape of a setter-like method, including the ways it can fail to be one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetterSpec {
    pub name: String,
    pub parameters: Vec<ParamType>,
    pub returns_value: bool,
    pub is_abstract: bool,
    pub is_static: bool,
    pub visibility: Visibility,
}

impl SetterSpec {
    pub fn new(name: impl Into<String>, parameters: Vec<ParamType>) -> Self {
        Self {
            name: name.into(),
            parameters,
            returns_value: false,
            is_abstract: false,
            is_static: false,
            visibility: Visibility::Public,
        }
    }

    pub fn returning_value(mut self) -> Self {
        self.returns_value = true;
        self
    }

    pub fn abstract_method(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }
}

#[derive(Clone)]
pub struct SetterDescriptor {
    spec: SetterSpec,
    apply: Arc<SetterFn>,
}

impl fmt::Debug for SetterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetterDescriptor").field("spec", &self.spec).finish_non_exhaustive()
    }
}

impl SetterDescriptor {
    pub fn spec(&self) -> &SetterSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Whether this method is named `set<property>`, ignoring case after `set`
    pub fn sets(&self, property: &str) -> bool {
        self.spec
            .name
            .strip_prefix("set")
            .is_some_and(|suffix| !suffix.is_empty() && suffix.eq_ignore_ascii_case(property))
    }

    pub(crate) fn apply(&self, target: &mut (dyn Any + Send + Sync), args: &[Argument]) -> Result<(), BoxError> {
        (self.apply)(target, args)
    }
}

/// Named no-argument method run after construction
#[derive(Clone)]
pub struct LifecycleMethod {
    name: String,
    invoke: Arc<LifecycleFn>,
}

impl fmt::Debug for LifecycleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMethod").field("name", &self.name).finish_non_exhaustive()
    }
}

impl LifecycleMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, target: &mut (dyn Any + Send + Sync)) -> Result<(), BoxError> {
        (self.invoke)(target)
    }
}

/// Construction metadata of one type: what recipes can call on it
#[derive(Debug)]
pub struct ClassDescriptor {
    type_name: String,
    type_id: TypeId,
    constructors: Vec<ConstructorDescriptor>,
    factory_methods: Vec<ConstructorDescriptor>,
    setters: Vec<SetterDescriptor>,
    lifecycle_methods: Vec<LifecycleMethod>,
}

impl ClassDescriptor {
    pub fn builder<T: Any + Send + Sync>(type_name: impl Into<String>) -> ClassBuilder<T> {
        ClassBuilder {
            descriptor: ClassDescriptor {
                type_name: type_name.into(),
                type_id: TypeId::of::<T>(),
                constructors: Vec::new(),
                factory_methods: Vec::new(),
                setters: Vec::new(),
                lifecycle_methods: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    pub fn factory_methods(&self, name: &str) -> Vec<&ConstructorDescriptor> {
        self.factory_methods
            .iter()
            .filter(|method| method.name.as_deref() == Some(name))
            .collect()
    }

    pub fn setters(&self) -> &[SetterDescriptor] {
        &self.setters
    }

    pub fn lifecycle_method(&self, name: &str) -> Option<&LifecycleMethod> {
        self.lifecycle_methods.iter().find(|method| method.name == name)
    }
}

/// Typed builder for [`ClassDescriptor`]
pub struct ClassBuilder<T> {
    descriptor: ClassDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    fn constructor_with<F>(name: Option<String>, visibility: Visibility, parameters: Vec<Parameter>, construct: F) -> ConstructorDescriptor
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        ConstructorDescriptor {
            name,
            parameters,
            visibility,
            construct: Arc::new(move |args: &Args| construct(args).map(|value| Box::new(value) as Object)),
        }
    }

    pub fn constructor<F>(mut self, parameters: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let ctor = Self::constructor_with(None, Visibility::Public, parameters, construct);
        self.descriptor.constructors.push(ctor);
        self
    }

    pub fn private_constructor<F>(mut self, parameters: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let ctor = Self::constructor_with(None, Visibility::Private, parameters, construct);
        self.descriptor.constructors.push(ctor);
        self
    }

    /// Static method producing a `T`, selected by name in a recipe
    pub fn factory_method<F>(mut self, name: &str, parameters: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let method = Self::constructor_with(Some(name.to_string()), Visibility::Public, parameters, construct);
        self.descriptor.factory_methods.push(method);
        self
    }

    /// Public single-argument `set<Name>` returning nothing
    pub fn setter<F>(self, name: &str, param_type: ParamType, set: F) -> Self
    where
        F: Fn(&mut T, &Argument) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.raw_setter(SetterSpec::new(name, vec![param_type]), move |target, args| match args {
            [argument] => set(target, argument),
            _ => Err(format!("expected one argument, got {}", args.len()).into()),
        })
    }

    /// Setter-like method with an arbitrary shape
    pub fn raw_setter<F>(mut self, spec: SetterSpec, set: F) -> Self
    where
        F: Fn(&mut T, &[Argument]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let type_name = self.descriptor.type_name.clone();
        let apply = move |target: &mut (dyn Any + Send + Sync), args: &[Argument]| {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| -> BoxError { format!("target is not a {}", type_name).into() })?;
            set(target, args)
        };
        self.descriptor.setters.push(SetterDescriptor {
            spec,
            apply: Arc::new(apply),
        });
        self
    }

    pub fn lifecycle<F>(mut self, name: &str, invoke: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let type_name = self.descriptor.type_name.clone();
        let invoke = move |target: &mut (dyn Any + Send + Sync)| {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| -> BoxError { format!("target is not a {}", type_name).into() })?;
            invoke(target)
        };
        self.descriptor.lifecycle_methods.push(LifecycleMethod {
            name: name.to_string(),
            invoke: Arc::new(invoke),
        });
        self
    }

    pub fn build(self) -> ClassDescriptor {
        self.descriptor
    }
}
