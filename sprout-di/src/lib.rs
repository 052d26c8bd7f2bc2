//! Dependency injection container based on named component definitions.
//!
//! Components are described by [ComponentDefinition](component_registry::ComponentDefinition)s
//! registered in a [ComponentDefinitionRegistry](component_registry::ComponentDefinitionRegistry).
//! A [ComponentFactory](factory::ComponentFactory) creates instances from those definitions,
//! resolving their dependencies, running lifecycle callbacks and storing singletons.
//!
//! ```
//! use sprout_di::component_registry::ComponentDefinition;
//! use sprout_di::factory::ComponentFactoryBuilder;
//! use sprout_di::instance_provider::{ComponentInstancePtr, TypedComponentInstanceProvider};
//!
//! struct Engine;
//!
//! struct Car {
//!     engine: ComponentInstancePtr<Engine>,
//! }
//!
//! let factory = ComponentFactoryBuilder::new().build();
//!
//! factory
//!     .register_definition("engine", ComponentDefinition::builder(|_| Ok(Engine)).build())
//!     .unwrap();
//! factory
//!     .register_definition(
//!         "car",
//!         ComponentDefinition::builder(|arguments| {
//!             Ok(Car {
//!                 engine: arguments.get::<Engine>(0)?,
//!             })
//!         })
//!         .parameter::<Engine>("engine")
//!         .build(),
//!     )
//!     .unwrap();
//!
//! let car = factory.instance_by_name_typed::<Car>("car").unwrap();
//! let engine = factory.primary_instance_typed::<Engine>().unwrap();
//! assert!(ComponentInstancePtr::ptr_eq(&car.engine, &engine));
//!
//! assert!(factory.destroy_singletons().is_empty());
//! ```

pub mod component;
pub mod component_registry;
pub mod dependency_graph;
mod error;
pub mod factory;
pub mod instance_provider;
pub mod lifecycle;
pub mod post_processor;
pub mod scope;

pub use error::{
    ComponentDefinitionRegistryError, ComponentInstanceProviderError, DefinitionError,
    DestructionError,
};
