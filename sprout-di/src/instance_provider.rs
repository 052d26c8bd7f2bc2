//! Functionality related to retrieving component instances from a container.

pub use crate::error::ComponentInstanceProviderError;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, Any, TypeId};
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub type ComponentInstancePtr<T> = Arc<T>;

/// Type-erased, shared component instance.
pub type ComponentInstanceAnyPtr = ComponentInstancePtr<dyn Any + Send + Sync + 'static>;

/// Type-erased, uniquely owned component instance, before it gets shared.
pub type RawInstance = Box<dyn Any + Send + Sync + 'static>;

/// Shared error type for errors coming from user code.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Runtime type identity of a component, used for type-based dependency resolution.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Generic provider for component instances.
#[cfg_attr(test, automock)]
pub trait ComponentInstanceProvider {
    /// Returns an instance of the component registered under given name or alias.
    fn instance_by_name(
        &self,
        name: &str,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError>;

    /// Tries to return a primary instance of a given type. A primary component is either the only
    /// one registered or one marked as primary.
    fn primary_instance(
        &self,
        type_info: TypeInfo,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError>;

    /// Returns instances of all components registered with given type, in registration order.
    fn instances(
        &self,
        type_info: TypeInfo,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, ComponentInstanceProviderError>;
}

/// Helper trait for [ComponentInstanceProvider] providing strongly-typed access.
pub trait TypedComponentInstanceProvider {
    /// Typesafe version of [ComponentInstanceProvider::instance_by_name].
    fn instance_by_name_typed<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<ComponentInstancePtr<T>, ComponentInstanceProviderError>;

    /// Typesafe version of [ComponentInstanceProvider::primary_instance].
    fn primary_instance_typed<T: Send + Sync + 'static>(
        &self,
    ) -> Result<ComponentInstancePtr<T>, ComponentInstanceProviderError>;

    /// Tries to get an instance like [TypedComponentInstanceProvider::primary_instance_typed] does,
    /// but returns `None` on missing instance.
    fn primary_instance_option<T: Send + Sync + 'static>(
        &self,
    ) -> Result<Option<ComponentInstancePtr<T>>, ComponentInstanceProviderError>;

    /// Typesafe version of [ComponentInstanceProvider::instances].
    fn instances_typed<T: Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<ComponentInstancePtr<T>>, ComponentInstanceProviderError>;
}

fn downcast<T: Send + Sync + 'static>(
    name: &str,
    instance: ComponentInstanceAnyPtr,
) -> Result<ComponentInstancePtr<T>, ComponentInstanceProviderError> {
    instance
        .downcast::<T>()
        .map_err(|_| ComponentInstanceProviderError::IncompatibleComponent {
            name: name.to_string(),
            type_name: type_name::<T>().to_string(),
        })
}

impl<CIP: ComponentInstanceProvider + ?Sized> TypedComponentInstanceProvider for CIP {
    fn instance_by_name_typed<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<ComponentInstancePtr<T>, ComponentInstanceProviderError> {
        self.instance_by_name(name)
            .and_then(|instance| downcast(name, instance))
    }

    fn primary_instance_typed<T: Send + Sync + 'static>(
        &self,
    ) -> Result<ComponentInstancePtr<T>, ComponentInstanceProviderError> {
        self.primary_instance(TypeInfo::of::<T>())
            .and_then(|instance| downcast(type_name::<T>(), instance))
    }

    fn primary_instance_option<T: Send + Sync + 'static>(
        &self,
    ) -> Result<Option<ComponentInstancePtr<T>>, ComponentInstanceProviderError> {
        match self.primary_instance_typed::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(ComponentInstanceProviderError::NoSuchDefinition(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn instances_typed<T: Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<ComponentInstancePtr<T>>, ComponentInstanceProviderError> {
        self.instances(TypeInfo::of::<T>()).and_then(|instances| {
            instances
                .into_iter()
                .map(|instance| downcast(type_name::<T>(), instance))
                .collect()
        })
    }
}
