//! Functionality related to registering definitions of components. [ComponentFactory](crate::factory::ComponentFactory)
//! creates component instances based on those definitions, which can come from any source:
//! explicit registration, configuration readers or definition post-processors.
//!
//! Definitions are keyed by a unique name. Additional names can be given via aliases, which are
//! resolved to the canonical name on every lookup.

pub mod definition;

pub use crate::component_registry::definition::{
    ArgumentSpec, ArgumentTarget, ComponentDefinition, ComponentDefinitionBuilder,
    ConstructionRecipe, Instantiation, Scope, ValueSource,
};
use crate::component_registry::alias::AliasMap;
pub use crate::error::ComponentDefinitionRegistryError;
use fxhash::{FxHashMap, FxHashSet};
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, warn};

pub type ComponentDefinitionPtr = Arc<ComponentDefinition>;

/// A registry of component definitions which can be used when creating instances.
#[cfg_attr(test, automock)]
pub trait ComponentDefinitionRegistry {
    /// Adds a new definition under given name. Fails on duplicate names, unless overriding is
    /// allowed, and always fails when replacing a definition which has already been instantiated.
    fn register(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ComponentDefinitionRegistryError>;

    /// Replaces an existing, not yet instantiated definition regardless of overriding settings.
    /// Intended for definition post-processing.
    fn replace(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ComponentDefinitionRegistryError>;

    /// Returns a definition with given name or alias.
    fn definition(
        &self,
        name: &str,
    ) -> Result<ComponentDefinitionPtr, ComponentDefinitionRegistryError>;

    /// Checks if there's a definition with given name or alias.
    fn contains(&self, name: &str) -> bool;

    /// Removes a definition with given name or alias, along with aliases pointing at it.
    fn remove(&self, name: &str)
        -> Result<ComponentDefinitionPtr, ComponentDefinitionRegistryError>;

    /// Returns a snapshot of all registered names, in registration order.
    fn names(&self) -> Vec<String>;

    /// Returns names of all definitions producing given type, in registration order.
    fn names_for_type(&self, type_id: TypeId) -> Vec<String>;

    /// Registers an alternative name for a component.
    fn register_alias(&self, name: &str, alias: &str)
        -> Result<(), ComponentDefinitionRegistryError>;

    fn remove_alias(&self, alias: &str) -> Result<(), ComponentDefinitionRegistryError>;

    /// Returns all aliases for given name, including transitive ones.
    fn aliases(&self, name: &str) -> Vec<String>;

    /// Resolves aliases to the name a definition is registered under.
    fn canonical_name(&self, name: &str) -> String;

    /// Marks a definition as used for creating instances, which freezes it. Returns `true` if the
    /// definition was not marked before.
    fn mark_in_use(&self, name: &str) -> bool;

    /// Unfreezes a definition whose instance could not be created.
    fn unmark_in_use(&self, name: &str);
}

#[derive(Default)]
struct RegistryState {
    definitions: FxHashMap<String, ComponentDefinitionPtr>,
    names: Vec<String>,
    aliases: AliasMap,
    in_use: FxHashSet<String>,
}

impl RegistryState {
    fn check_not_in_use(&self, name: &str) -> Result<(), ComponentDefinitionRegistryError> {
        if self.in_use.contains(name) {
            Err(ComponentDefinitionRegistryError::DefinitionInUse(
                name.to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Default in-memory registry. All operations are serialized by a single registry-wide lock.
pub struct DefaultComponentDefinitionRegistry {
    state: Mutex<RegistryState>,
    allow_definition_overriding: bool,
}

impl Default for DefaultComponentDefinitionRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DefaultComponentDefinitionRegistry {
    pub fn new(allow_definition_overriding: bool) -> Self {
        Self {
            state: Default::default(),
            allow_definition_overriding,
        }
    }

    #[inline]
    pub fn allow_definition_overriding(&self) -> bool {
        self.allow_definition_overriding
    }
}

impl ComponentDefinitionRegistry for DefaultComponentDefinitionRegistry {
    fn register(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ComponentDefinitionRegistryError> {
        let mut state = self.state.lock();

        if state.definitions.contains_key(name) {
            if !self.allow_definition_overriding {
                return Err(ComponentDefinitionRegistryError::DuplicateComponentName(
                    name.to_string(),
                ));
            }

            state.check_not_in_use(name)?;
            warn!(name, "Overriding component definition.");
        } else {
            if state.aliases.is_alias(name) {
                return Err(ComponentDefinitionRegistryError::DuplicateComponentName(
                    name.to_string(),
                ));
            }

            state.names.push(name.to_string());
        }

        debug!(
            name,
            type_name = definition.type_info.name,
            "Registering component definition."
        );

        state
            .definitions
            .insert(name.to_string(), Arc::new(definition));

        Ok(())
    }

    fn replace(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ComponentDefinitionRegistryError> {
        let mut state = self.state.lock();
        let name = state.aliases.canonical_name(name);

        state.check_not_in_use(&name)?;

        let entry = state
            .definitions
            .get_mut(&name)
            .ok_or_else(|| ComponentDefinitionRegistryError::NoSuchDefinition(name.clone()))?;

        *entry = Arc::new(definition);

        debug!("Replaced component definition: {name}");
        Ok(())
    }

    fn definition(
        &self,
        name: &str,
    ) -> Result<ComponentDefinitionPtr, ComponentDefinitionRegistryError> {
        let state = self.state.lock();
        let name = state.aliases.canonical_name(name);

        state
            .definitions
            .get(&name)
            .cloned()
            .ok_or(ComponentDefinitionRegistryError::NoSuchDefinition(name))
    }

    fn contains(&self, name: &str) -> bool {
        let state = self.state.lock();
        let name = state.aliases.canonical_name(name);
        state.definitions.contains_key(&name)
    }

    fn remove(
        &self,
        name: &str,
    ) -> Result<ComponentDefinitionPtr, ComponentDefinitionRegistryError> {
        let mut state = self.state.lock();
        let name = state.aliases.canonical_name(name);

        let definition = state
            .definitions
            .remove(&name)
            .ok_or_else(|| ComponentDefinitionRegistryError::NoSuchDefinition(name.clone()))?;

        state.names.retain(|registered| *registered != name);
        state.in_use.remove(&name);
        state.aliases.remove_target(&name);

        debug!("Removed component definition: {name}");
        Ok(definition)
    }

    fn names(&self) -> Vec<String> {
        self.state.lock().names.clone()
    }

    fn names_for_type(&self, type_id: TypeId) -> Vec<String> {
        let state = self.state.lock();
        state
            .names
            .iter()
            .filter(|name| {
                state
                    .definitions
                    .get(*name)
                    .map(|definition| definition.type_info.id == type_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn register_alias(
        &self,
        name: &str,
        alias: &str,
    ) -> Result<(), ComponentDefinitionRegistryError> {
        let mut state = self.state.lock();

        if alias != name && state.definitions.contains_key(alias) {
            return Err(ComponentDefinitionRegistryError::DuplicateComponentName(
                alias.to_string(),
            ));
        }

        state
            .aliases
            .register(name, alias, self.allow_definition_overriding)
    }

    fn remove_alias(&self, alias: &str) -> Result<(), ComponentDefinitionRegistryError> {
        self.state.lock().aliases.remove(alias)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        self.state.lock().aliases.aliases(name)
    }

    fn canonical_name(&self, name: &str) -> String {
        self.state.lock().aliases.canonical_name(name)
    }

    fn mark_in_use(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let name = state.aliases.canonical_name(name);
        state.in_use.insert(name)
    }

    fn unmark_in_use(&self, name: &str) {
        let mut state = self.state.lock();
        let name = state.aliases.canonical_name(name);
        state.in_use.remove(&name);
    }
}

mod alias {
    use crate::error::ComponentDefinitionRegistryError;
    use fxhash::FxHashMap;
    use tracing::debug;

    /// Map from alias to the name it points at, which might be another alias.
    #[derive(Default, Clone, Debug)]
    pub(super) struct AliasMap {
        aliases: FxHashMap<String, String>,
    }

    impl AliasMap {
        pub(super) fn register(
            &mut self,
            name: &str,
            alias: &str,
            allow_overriding: bool,
        ) -> Result<(), ComponentDefinitionRegistryError> {
            if alias == name {
                self.aliases.remove(alias);
                debug!(alias, "Alias ignored since it points to the same name.");
                return Ok(());
            }

            if let Some(registered_name) = self.aliases.get(alias) {
                if registered_name == name {
                    return Ok(());
                }

                if !allow_overriding {
                    return Err(ComponentDefinitionRegistryError::DuplicateAlias {
                        alias: alias.to_string(),
                        name: name.to_string(),
                        registered_name: registered_name.clone(),
                    });
                }

                debug!("Overriding alias '{alias}' for '{registered_name}' with new target '{name}'.");
            }

            if self.has_alias(alias, name) {
                return Err(ComponentDefinitionRegistryError::CircularAlias {
                    alias: alias.to_string(),
                    name: name.to_string(),
                });
            }

            self.aliases.insert(alias.to_string(), name.to_string());
            Ok(())
        }

        pub(super) fn remove(&mut self, alias: &str) -> Result<(), ComponentDefinitionRegistryError> {
            self.aliases
                .remove(alias)
                .map(|_| ())
                .ok_or_else(|| ComponentDefinitionRegistryError::NoSuchAlias(alias.to_string()))
        }

        /// Removes all aliases, which resolve to given name.
        pub(super) fn remove_target(&mut self, name: &str) {
            for alias in self.aliases(name) {
                self.aliases.remove(&alias);
            }
        }

        #[inline]
        pub(super) fn is_alias(&self, name: &str) -> bool {
            self.aliases.contains_key(name)
        }

        /// Checks if `alias` is registered as a direct or transitive alias for `name`.
        pub(super) fn has_alias(&self, name: &str, alias: &str) -> bool {
            self.aliases.iter().any(|(registered_alias, registered_name)| {
                registered_name == name
                    && (registered_alias == alias || self.has_alias(registered_alias, alias))
            })
        }

        pub(super) fn aliases(&self, name: &str) -> Vec<String> {
            let mut result = vec![];
            self.retrieve_aliases(name, &mut result);
            result
        }

        fn retrieve_aliases(&self, name: &str, result: &mut Vec<String>) {
            for (alias, registered_name) in &self.aliases {
                if registered_name == name {
                    result.push(alias.clone());
                    self.retrieve_aliases(alias, result);
                }
            }
        }

        pub(super) fn canonical_name(&self, name: &str) -> String {
            let mut canonical_name = name;
            while let Some(resolved) = self.aliases.get(canonical_name) {
                canonical_name = resolved;
            }

            canonical_name.to_string()
        }
    }

}
