//! Capability interfaces for components managed by the container.
//!
//! The container never inspects component types at runtime. Instead, everything it needs to know
//! about a type is captured when its [ComponentDefinition](crate::component_registry::ComponentDefinition)
//! is built - either with closures or by implementing the capability traits below:
//!
//! * [Constructible] - creates a raw instance from resolved constructor [Arguments]
//! * [PropertyBindable] - accepts resolved property values after construction
//! * [InitializingComponent] - built-in initialization callback, run after property injection
//! * [DisposableComponent] - built-in destruction callback, run on container shutdown
//!
//! ```
//! use sprout_di::component::{Arguments, Constructible, InitializingComponent, Parameter};
//! use sprout_di::instance_provider::{ComponentInstancePtr, ErrorPtr};
//!
//! struct Engine;
//!
//! struct Car {
//!     engine: ComponentInstancePtr<Engine>,
//! }
//!
//! impl Constructible for Car {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::of::<Engine>("engine")]
//!     }
//!
//!     fn construct(arguments: &Arguments) -> Result<Self, ErrorPtr> {
//!         Ok(Self {
//!             engine: arguments.get::<Engine>(0)?,
//!         })
//!     }
//! }
//!
//! impl InitializingComponent for Car {
//!     fn after_properties_set(&self) -> Result<(), ErrorPtr> {
//!         Ok(())
//!     }
//! }
//! ```

use crate::instance_provider::{ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr, TypeInfo};
use std::any::type_name;
use std::sync::Arc;
use thiserror::Error;

/// Name under which the [InitializingComponent] callback is known. A custom init method with this
/// name is not invoked a second time.
pub const AFTER_PROPERTIES_SET: &str = "after_properties_set";

/// Name under which the [DisposableComponent] callback is known. A custom destroy method with this
/// name is not invoked a second time.
pub const DESTROY: &str = "destroy";

/// Declared constructor (or factory method) parameter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_info: TypeInfo,
}

impl Parameter {
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_info: TypeInfo::of::<T>(),
        }
    }
}

/// Error for values of unexpected types handed to constructors or property binders.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ValueError {
    #[error("Missing argument at index {0}")]
    MissingArgument(usize),
    #[error("Value '{name}' is not of expected type: {expected}")]
    IncompatibleValue { name: String, expected: &'static str },
}

/// A resolved, type-erased value: either a literal from a definition or another component instance.
#[derive(Clone)]
pub struct Value {
    name: String,
    inner: ComponentInstanceAnyPtr,
}

impl Value {
    pub(crate) fn new(name: impl Into<String>, inner: ComponentInstanceAnyPtr) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// Name of the parameter or property this value was resolved for.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value as a typed shared pointer.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<ComponentInstancePtr<T>, ErrorPtr> {
        self.inner.clone().downcast::<T>().map_err(|_| {
            Arc::new(ValueError::IncompatibleValue {
                name: self.name.clone(),
                expected: type_name::<T>(),
            }) as ErrorPtr
        })
    }

    /// Returns a copy of the underlying value.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self) -> Result<T, ErrorPtr> {
        self.get::<T>().map(|value| (*value).clone())
    }

    #[inline]
    pub fn into_inner(self) -> ComponentInstanceAnyPtr {
        self.inner
    }
}

/// Resolved arguments for a constructor or factory method, in parameter order.
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw value at given index.
    pub fn value(&self, index: usize) -> Result<&Value, ErrorPtr> {
        self.values
            .get(index)
            .ok_or_else(|| Arc::new(ValueError::MissingArgument(index)) as ErrorPtr)
    }

    /// Returns the argument at given index as a typed shared pointer.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> Result<ComponentInstancePtr<T>, ErrorPtr> {
        self.value(index).and_then(Value::get::<T>)
    }

    /// Returns a copy of the argument at given index.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, index: usize) -> Result<T, ErrorPtr> {
        self.value(index).and_then(Value::cloned::<T>)
    }
}

/// Capability of being created from resolved constructor arguments.
pub trait Constructible: Sized {
    /// Parameters expected by [Constructible::construct], in order. Defaults to none.
    fn parameters() -> Vec<Parameter> {
        vec![]
    }

    fn construct(arguments: &Arguments) -> Result<Self, ErrorPtr>;
}

/// Capability of accepting property values after construction.
pub trait PropertyBindable {
    fn bind_property(&mut self, name: &str, value: &Value) -> Result<(), ErrorPtr>;
}

/// Built-in initialization callback, invoked after all properties are set and all
/// before-initialization post-processors have run.
pub trait InitializingComponent {
    fn after_properties_set(&self) -> Result<(), ErrorPtr>;
}

/// Built-in destruction callback, invoked when the container destroys a singleton.
pub trait DisposableComponent {
    fn destroy(&self) -> Result<(), ErrorPtr>;
}
