use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::invoker::value::{Value, ValueType};
use crate::kernel::error::BoxError;

/// Type-erased method body. The target is the running service object.
pub type MethodHandler =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &[Value]) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Name plus parameter types; the dispatch key of an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationSignature {
    pub name: String,
    pub parameters: Vec<ValueType>,
}

impl OperationSignature {
    pub fn new(name: impl Into<String>, parameters: &[ValueType]) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.to_vec(),
        }
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.parameters.iter().map(ValueType::name).collect();
        write!(f, "{}({})", self.name, params.join(", "))
    }
}

/// One public method of a service type
#[derive(Clone)]
pub struct MethodDescriptor {
    signature: OperationSignature,
    returns: ValueType,
    handler: MethodHandler,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("signature", &self.signature.to_string())
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn parameters(&self) -> &[ValueType] {
        &self.signature.parameters
    }

    pub fn returns(&self) -> ValueType {
        self.returns
    }

    pub fn signature(&self) -> &OperationSignature {
        &self.signature
    }

    pub fn call(&self, target: &(dyn Any + Send + Sync), args: &[Value]) -> std::result::Result<Value, BoxError> {
        (self.handler)(target, args)
    }
}

/// Declared capability table of a service type.
///
/// Stands in for runtime reflection: the service author lists the methods
/// once, and the invoker derives attributes and operations from them.
pub struct ServiceDescriptor {
    type_name: String,
    type_id: TypeId,
    methods: Vec<MethodDescriptor>,
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("type_name", &self.type_name)
            .field("methods", &self.methods)
            .finish()
    }
}

impl ServiceDescriptor {
    /// Start describing the service type `T`
    pub fn builder<T: Any + Send + Sync>(type_name: impl Into<String>) -> DescriptorBuilder<T> {
        DescriptorBuilder {
            type_name: type_name.into(),
            methods: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Whether `target` is an instance of the described type
    pub fn describes(&self, target: &(dyn Any + Send + Sync)) -> bool {
        target.type_id() == self.type_id
    }
}

/// Builder collecting the methods of `T`
pub struct DescriptorBuilder<T> {
    type_name: String,
    methods: Vec<MethodDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> DescriptorBuilder<T> {
    /// Add a method with explicit parameter and return types
    pub fn method<F>(mut self, name: &str, parameters: &[ValueType], returns: ValueType, body: F) -> Self
    where
        F: Fn(&T, &[Value]) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let type_name = self.type_name.clone();
        let handler: MethodHandler = Arc::new(move |target: &(dyn Any + Send + Sync), args: &[Value]| {
            let target = target
                .downcast_ref::<T>()
                .ok_or_else(|| -> BoxError { format!("target is not a {}", type_name).into() })?;
            body(target, args)
        });
        self.methods.push(MethodDescriptor {
            signature: OperationSignature::new(name, parameters),
            returns,
            handler,
        });
        self
    }

    /// Add a no-argument method returning a value, e.g. `getCount`
    pub fn getter<F>(self, name: &str, returns: ValueType, read: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.method(name, &[], returns, move |target, _| Ok(read(target)))
    }

    /// Add a single-argument method returning nothing, e.g. `setCount`
    pub fn setter<F>(self, name: &str, parameter: ValueType, write: F) -> Self
    where
        F: Fn(&T, &Value) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.method(name, &[parameter], ValueType::Unit, move |target, args| {
            write(target, args.first().unwrap_or(&Value::Null))?;
            Ok(Value::Null)
        })
    }

    pub fn build(self) -> ServiceDescriptor {
        ServiceDescriptor {
            type_name: self.type_name,
            type_id: TypeId::of::<T>(),
            methods: self.methods,
        }
    }
}
