//! # GBean Object Recipes
//!
//! Dependency injection without reflection. A type registers a
//! [`ClassDescriptor`] naming its constructors, factory methods, setters and
//! lifecycle methods; an [`ObjectRecipe`] pairs it with named property
//! values and picks the constructor and setters that fit them.
//!
//! - [`ObjectGraph`] builds recipes that reference each other by name and
//!   rejects circular references.
//! - [`RecipeServiceFactory`] plugs a recipe into the kernel as a
//!   [`ServiceFactory`](crate::kernel::ServiceFactory), resolving references
//!   to running services.
//! - [`TypeCatalog`] maps type names used in configuration to descriptors.
pub mod argument;
pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod object_recipe;
pub mod service;

pub use argument::{Args, Argument, Instance, ParamType};
pub use catalog::{CatalogEntry, TypeCatalog};
pub use descriptor::{ClassBuilder, ClassDescriptor, Parameter, SetterSpec, Visibility};
pub use error::ConstructionError;
pub use graph::ObjectGraph;
pub use object_recipe::{NoReferences, ObjectRecipe, Property, RecipeOption, ReferenceResolver};
pub use service::RecipeServiceFactory;
