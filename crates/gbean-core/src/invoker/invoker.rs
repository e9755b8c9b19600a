use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::invoker::descriptor::{MethodDescriptor, OperationSignature, ServiceDescriptor};
use crate::invoker::error::{InvokerError, Result};
use crate::invoker::value::{Value, ValueType};
use crate::kernel::factory::ServiceHandle;
use crate::kernel::name::ServiceName;
use crate::utils::lock;

/// Attribute metadata derived from accessor naming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub value_type: ValueType,
    /// Operation index of the getter
    pub getter: Option<usize>,
    /// Operation index of the setter
    pub setter: Option<usize>,
}

impl AttributeInfo {
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

/// Operation metadata; `index` is valid for [`ServiceInvoker::invoke_by_index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    pub index: usize,
    pub signature: OperationSignature,
    pub returns: ValueType,
}

#[derive(Default)]
struct PropertyAccessors {
    get: Option<(usize, ValueType)>,
    is: Option<(usize, ValueType)>,
    setters: Vec<(usize, ValueType)>,
}

/// `getFooBar` -> `fooBar`; None when nothing follows the prefix
fn property_name(method: &str, prefix: &str) -> Option<String> {
    let mut chars = method.strip_prefix(prefix)?.chars();
    let first = chars.next()?;
    if !first.is_uppercase() {
        return None;
    }
    Some(first.to_lowercase().chain(chars).collect())
}

/// Attribute and operation dispatch over a running service object.
///
/// The tables are built once from the descriptor and never change. The
/// live object is swapped by [`start`](Self::start) / [`stop`](Self::stop);
/// every call copies it out under the lock and invokes outside of it.
pub struct ServiceInvoker {
    service_name: ServiceName,
    descriptor: Arc<ServiceDescriptor>,
    attributes: BTreeMap<String, AttributeInfo>,
    operations: Vec<MethodDescriptor>,
    operation_index: HashMap<OperationSignature, usize>,
    target: Mutex<Option<ServiceHandle>>,
}

impl fmt::Debug for ServiceInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInvoker")
            .field("service_name", &self.service_name)
            .field("type_name", &self.descriptor.type_name())
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("operations_count", &self.operations.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ServiceInvoker {
    /// Build the dispatch tables for `descriptor`.
    ///
    /// Accessor rules: `get<Name>()` returning a value, or `is<Name>()`
    /// returning bool, is a getter; `set<Name>(x)` returning unit is a
    /// setter. A property with setters of different types is left as
    /// operations only.
    pub fn new(service_name: ServiceName, descriptor: Arc<ServiceDescriptor>) -> Result<Self> {
        let type_name = descriptor.type_name().to_string();
        let config_error = |message: String| InvokerError::Configuration {
            type_name: type_name.clone(),
            message,
        };

        let mut operations = Vec::with_capacity(descriptor.methods().len());
        let mut operation_index = HashMap::new();
        let mut properties: BTreeMap<String, PropertyAccessors> = BTreeMap::new();

        for method in descriptor.methods() {
            let index = operations.len();
            if operation_index.insert(method.signature().clone(), index).is_some() {
                return Err(config_error(format!("duplicate operation {}", method.signature())));
            }
            operations.push(method.clone());

            let params = method.parameters();
            let returns = method.returns();
            if params.is_empty() && returns != ValueType::Unit {
                if let Some(property) = property_name(method.name(), "get") {
                    properties.entry(property).or_default().get = Some((index, returns));
                    continue;
                }
                if returns == ValueType::Bool {
                    if let Some(property) = property_name(method.name(), "is") {
                        properties.entry(property).or_default().is = Some((index, returns));
                        continue;
                    }
                }
            }
            if params.len() == 1 && returns == ValueType::Unit {
                if let Some(property) = property_name(method.name(), "set") {
                    properties.entry(property).or_default().setters.push((index, params[0]));
                }
            }
        }

        let mut attributes = BTreeMap::new();
        for (name, accessors) in properties {
            let getter = match (accessors.get, accessors.is) {
                (Some(get), Some(is)) => {
                    if get.1 != is.1 {
                        return Err(config_error(format!(
                            "getter and is-getter of '{}' disagree: {} vs {}",
                            name, get.1, is.1
                        )));
                    }
                    Some(is)
                }
                (get, is) => is.or(get),
            };

            let setter = match accessors.setters.as_slice() {
                [] => None,
                [single] => Some(*single),
                _ => {
                    log::debug!(
                        "Property '{}' of {} has overloaded setters; exposing as operations only",
                        name,
                        type_name
                    );
                    continue;
                }
            };

            if let (Some((_, read_type)), Some((_, write_type))) = (getter, setter) {
                if read_type != write_type {
                    return Err(config_error(format!(
                        "getter and setter of '{}' disagree: {} vs {}",
                        name, read_type, write_type
                    )));
                }
            }

            let value_type = match (getter, setter) {
                (Some((_, t)), _) | (None, Some((_, t))) => t,
                (None, None) => continue,
            };
            attributes.insert(
                name.clone(),
                AttributeInfo {
                    name,
                    value_type,
                    getter: getter.map(|(index, _)| index),
                    setter: setter.map(|(index, _)| index),
                },
            );
        }

        Ok(Self {
            service_name,
            descriptor,
            attributes,
            operations,
            operation_index,
            target: Mutex::new(None),
        })
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }

    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    /// Attach the running service object
    pub fn start(&self, target: ServiceHandle) -> Result<()> {
        if !self.descriptor.describes(target.as_ref()) {
            return Err(InvokerError::Configuration {
                type_name: self.descriptor.type_name().to_string(),
                message: format!("service '{}' is not an instance of the described type", self.service_name),
            });
        }
        *lock(&self.target) = Some(target);
        Ok(())
    }

    /// Detach the service object; later calls fail with `IllegalState`
    pub fn stop(&self) {
        lock(&self.target).take();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.target).is_some()
    }

    pub fn attributes(&self) -> Vec<AttributeInfo> {
        self.attributes.values().cloned().collect()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.get(name)
    }

    pub fn operations(&self) -> Vec<OperationInfo> {
        self.operations
            .iter()
            .enumerate()
            .map(|(index, method)| OperationInfo {
                index,
                signature: method.signature().clone(),
                returns: method.returns(),
            })
            .collect()
    }

    pub fn get_attribute(&self, name: &str) -> Result<Value> {
        let attribute = self.lookup_attribute(name)?;
        let getter = attribute.getter.ok_or_else(|| InvokerError::AttributeNotReadable {
            service: self.service_name.to_string(),
            attribute: name.to_string(),
        })?;
        self.dispatch(getter, &[])
    }

    pub fn set_attribute(&self, name: &str, value: Value) -> Result<()> {
        let attribute = self.lookup_attribute(name)?;
        let setter = attribute.setter.ok_or_else(|| InvokerError::AttributeNotWritable {
            service: self.service_name.to_string(),
            attribute: name.to_string(),
        })?;
        self.dispatch(setter, &[value]).map(|_| ())
    }

    /// Dispatch by name and parameter types
    pub fn invoke(&self, name: &str, parameter_types: &[ValueType], args: &[Value]) -> Result<Value> {
        let index = self
            .get_operation_index(name, parameter_types)
            .ok_or_else(|| InvokerError::NoSuchOperation {
                service: self.service_name.to_string(),
                signature: OperationSignature::new(name, parameter_types).to_string(),
            })?;
        self.dispatch(index, args)
    }

    /// Resolve a signature once for repeated [`invoke_by_index`](Self::invoke_by_index) calls
    pub fn get_operation_index(&self, name: &str, parameter_types: &[ValueType]) -> Option<usize> {
        self.operation_index
            .get(&OperationSignature::new(name, parameter_types))
            .copied()
    }

    pub fn invoke_by_index(&self, index: usize, args: &[Value]) -> Result<Value> {
        if index >= self.operations.len() {
            return Err(InvokerError::NoSuchOperation {
                service: self.service_name.to_string(),
                signature: format!("#{}", index),
            });
        }
        self.dispatch(index, args)
    }

    fn lookup_attribute(&self, name: &str) -> Result<&AttributeInfo> {
        self.attributes.get(name).ok_or_else(|| InvokerError::NoSuchAttribute {
            service: self.service_name.to_string(),
            attribute: name.to_string(),
        })
    }

    fn current_target(&self) -> Result<ServiceHandle> {
        lock(&self.target).clone().ok_or_else(|| InvokerError::IllegalState {
            service: self.service_name.to_string(),
            message: "service is not running".to_string(),
        })
    }

    fn dispatch(&self, index: usize, args: &[Value]) -> Result<Value> {
        let method = &self.operations[index];
        let signature = method.signature();
        if args.len() != signature.parameters.len() {
            return Err(InvokerError::InvalidArgument {
                operation: signature.to_string(),
                message: format!("expected {} argument(s), got {}", signature.parameters.len(), args.len()),
            });
        }
        for (position, (expected, actual)) in signature.parameters.iter().zip(args).enumerate() {
            if !expected.accepts(actual) {
                return Err(InvokerError::InvalidArgument {
                    operation: signature.to_string(),
                    message: format!("argument {} must be {}, got {}", position, expected, ValueType::of(actual)),
                });
            }
        }

        let target = self.current_target()?;
        method
            .call(target.as_ref(), args)
            .map_err(|source| InvokerError::Invocation {
                operation: signature.to_string(),
                source,
            })
    }
}
