//! Storage for shared component instances.
//!
//! Only [singletons](crate::component_registry::Scope::Singleton) are stored. Prototypes are
//! created on every request and handed over to the caller, so the container never holds them.
//!
//! The store is owned by a single [ComponentFactory](crate::factory::ComponentFactory), so
//! multiple independent containers can live side by side in one process.

use crate::error::ComponentInstanceProviderError;
use crate::instance_provider::ComponentInstanceAnyPtr;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::trace;

#[derive(Default)]
struct Instances {
    instances: FxHashMap<String, ComponentInstanceAnyPtr>,
    // registration order, used as a base for destruction order
    names: Vec<String>,
}

impl Instances {
    fn insert(&mut self, name: &str, instance: ComponentInstanceAnyPtr) {
        if self.instances.insert(name.to_string(), instance).is_none() {
            self.names.push(name.to_string());
        }
    }
}

/// Container-scoped store of singleton instances.
///
/// Reads of already created instances only take a shared lock. First-time creation goes through a
/// per-name exclusive section, so at most one thread constructs a given singleton, while others
/// wait and then receive the same instance.
#[derive(Default)]
pub struct SingletonScope {
    instances: RwLock<Instances>,
    creation_locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
    in_creation: Mutex<FxHashMap<String, ThreadId>>,
    in_destruction: AtomicBool,
}

impl SingletonScope {
    /// Returns an already created instance.
    #[inline]
    pub fn instance(&self, name: &str) -> Option<ComponentInstanceAnyPtr> {
        self.instances.read().instances.get(name).cloned()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.read().instances.contains_key(name)
    }

    /// Returns names of stored singletons, in the order they were stored.
    pub fn names(&self) -> Vec<String> {
        self.instances.read().names.clone()
    }

    /// Returns the stored instance or creates it with given function. The instance is stored only
    /// if creation succeeds.
    pub fn get_or_create<F>(
        &self,
        name: &str,
        create: F,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError>
    where
        F: FnOnce() -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError>,
    {
        if let Some(instance) = self.instance(name) {
            return Ok(instance);
        }

        self.check_creation_allowed(name)?;

        let current_thread = thread::current().id();
        if self.in_creation.lock().get(name) == Some(&current_thread) {
            return Err(ComponentInstanceProviderError::CircularDependency {
                path: vec![name.to_string(), name.to_string()],
            });
        }

        let creation_lock = self
            .creation_locks
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();

        let _guard = creation_lock.lock();

        // another thread might have finished while we were waiting
        if let Some(instance) = self.instance(name) {
            return Ok(instance);
        }

        self.check_creation_allowed(name)?;

        self.in_creation
            .lock()
            .insert(name.to_string(), current_thread);

        let result = create();

        self.in_creation.lock().remove(name);

        let instance = result?;
        self.instances.write().insert(name, instance.clone());

        trace!("Stored singleton: {name}");
        Ok(instance)
    }

    /// Stores an externally created instance.
    pub fn register(
        &self,
        name: &str,
        instance: ComponentInstanceAnyPtr,
    ) -> Result<(), ComponentInstanceProviderError> {
        let mut instances = self.instances.write();
        if instances.instances.contains_key(name) {
            return Err(ComponentInstanceProviderError::DuplicateSingleton(
                name.to_string(),
            ));
        }

        instances.insert(name, instance);
        Ok(())
    }

    /// Removes a stored instance, if present.
    pub fn remove(&self, name: &str) -> Option<ComponentInstanceAnyPtr> {
        let mut instances = self.instances.write();
        let instance = instances.instances.remove(name)?;
        instances.names.retain(|registered| registered != name);

        self.creation_locks.lock().remove(name);
        Some(instance)
    }

    /// While set, creation of new singletons is rejected.
    pub fn set_in_destruction(&self, in_destruction: bool) {
        self.in_destruction.store(in_destruction, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_in_destruction(&self) -> bool {
        self.in_destruction.load(Ordering::SeqCst)
    }

    fn check_creation_allowed(&self, name: &str) -> Result<(), ComponentInstanceProviderError> {
        if self.is_in_destruction() {
            Err(ComponentInstanceProviderError::CreationNotAllowed(
                name.to_string(),
            ))
        } else {
            Ok(())
        }
    }
}
