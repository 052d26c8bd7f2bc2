//! Core functionality for creating component instances.
//!
//! [ComponentFactory] turns [ComponentDefinition]s into instances:
//!
//! 1. declared `depends_on` components are created first,
//! 2. constructor or factory method arguments are resolved and the raw instance is created,
//! 3. property values are bound,
//! 4. the [LifecycleEngine] runs post-processors and initialization callbacks,
//! 5. singletons are stored for reuse, while prototypes are handed over to the caller.
//!
//! Every dependency discovered along the way, declared or implicit, is registered in the
//! [DependencyGraph] before the dependency gets created, so cycles are reported regardless of how
//! they are formed. Failed creation never leaves a singleton behind.

use crate::component::{Arguments, Parameter, Value};
use crate::component_registry::{
    ArgumentTarget, ComponentDefinition, ComponentDefinitionPtr, ComponentDefinitionRegistry,
    ComponentDefinitionRegistryError, DefaultComponentDefinitionRegistry, Instantiation,
    ValueSource,
};
use crate::dependency_graph::DependencyGraph;
use crate::error::{DefinitionError, DestructionError};
use crate::instance_provider::{
    ComponentInstanceAnyPtr, ComponentInstanceProvider, ComponentInstanceProviderError,
    ErrorPtr, RawInstance, TypeInfo,
};
use crate::lifecycle::{LifecycleEngine, LifecycleState};
use crate::post_processor::ComponentPostProcessorPtr;
use crate::scope::SingletonScope;
use itertools::Itertools;
use std::sync::Arc;
use tracing::debug;

pub type ComponentDefinitionRegistryPtr = Box<dyn ComponentDefinitionRegistry + Send + Sync>;

/// Builder for [ComponentFactory] with sensible defaults, for easy construction.
pub struct ComponentFactoryBuilder {
    definition_registry: ComponentDefinitionRegistryPtr,
    post_processors: Vec<ComponentPostProcessorPtr>,
}

impl Default for ComponentFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentFactoryBuilder {
    /// Creates a new builder with a default configuration.
    pub fn new() -> Self {
        Self {
            definition_registry: Box::<DefaultComponentDefinitionRegistry>::default(),
            post_processors: vec![],
        }
    }

    /// Sets new [ComponentDefinitionRegistry].
    pub fn with_definition_registry(
        mut self,
        definition_registry: ComponentDefinitionRegistryPtr,
    ) -> Self {
        self.definition_registry = definition_registry;
        self
    }

    /// Adds a new component post-processor.
    pub fn with_post_processor(mut self, post_processor: ComponentPostProcessorPtr) -> Self {
        self.post_processors.push(post_processor);
        self
    }

    /// Builds resulting [ComponentFactory].
    pub fn build(self) -> ComponentFactory {
        let factory = ComponentFactory::new(self.definition_registry);
        for post_processor in self.post_processors {
            factory.add_post_processor(post_processor);
        }

        factory
    }
}

/// Generic factory for component instances. Uses definitions from the
/// [ComponentDefinitionRegistry] to create instances, and owns everything needed to manage them:
/// the dependency graph, the singleton store and the lifecycle engine. All operations take `&self`
/// and are safe to call concurrently.
pub struct ComponentFactory {
    definition_registry: ComponentDefinitionRegistryPtr,
    dependency_graph: DependencyGraph,
    singletons: SingletonScope,
    lifecycle: LifecycleEngine,
}

impl ComponentFactory {
    pub fn new(definition_registry: ComponentDefinitionRegistryPtr) -> Self {
        Self {
            definition_registry,
            dependency_graph: Default::default(),
            singletons: Default::default(),
            lifecycle: Default::default(),
        }
    }

    #[inline]
    pub fn definition_registry(&self) -> &(dyn ComponentDefinitionRegistry + Send + Sync) {
        self.definition_registry.as_ref()
    }

    #[inline]
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dependency_graph
    }

    /// Shortcut for registering a definition in the underlying registry.
    pub fn register_definition(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ComponentDefinitionRegistryError> {
        self.definition_registry.register(name, definition)
    }

    /// Adds a post-processor applied to all components created from now on.
    pub fn add_post_processor(&self, post_processor: ComponentPostProcessorPtr) {
        self.lifecycle.add_post_processor(post_processor);
    }

    /// Returns an instance of the component with given name or alias. Singletons are created at
    /// most once, while prototypes are created on each call.
    pub fn create_instance(
        &self,
        name: &str,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        let name = self.definition_registry.canonical_name(name);

        if let Some(instance) = self.singletons.instance(&name) {
            return Ok(instance);
        }

        let definition = self.definition(&name)?;
        if definition.is_singleton() {
            self.singletons.get_or_create(&name, || {
                self.do_create_instance(&name, &definition)
                    .map_err(|error| {
                        self.lifecycle.clear_state(&name);
                        error
                    })
            })
        } else {
            self.do_create_instance(&name, &definition)
        }
    }

    /// Freezes the definition for the duration of creation. A definition which was not in use
    /// before gets unfrozen again if creation fails, since no instance of it exists.
    fn do_create_instance(
        &self,
        name: &str,
        definition: &ComponentDefinition,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        let newly_marked = self.definition_registry.mark_in_use(name);

        self.build_instance(name, definition).map_err(|error| {
            if newly_marked {
                self.definition_registry.unmark_in_use(name);
            }

            error
        })
    }

    /// Creates all singletons which are not marked as lazy, in registration order.
    pub fn pre_instantiate_singletons(&self) -> Result<(), ComponentInstanceProviderError> {
        debug!("Pre-instantiating singletons...");

        for name in self.definition_registry.names() {
            let definition = self.definition(&name)?;
            if definition.is_singleton() && !definition.lazy_init {
                self.create_instance(&name)?;
            }
        }

        Ok(())
    }

    /// Stores an externally created instance as a fully initialized singleton. Its lifecycle is
    /// not managed, so no initialization or destruction callbacks are run for it.
    pub fn register_singleton(
        &self,
        name: &str,
        instance: ComponentInstanceAnyPtr,
    ) -> Result<(), ComponentInstanceProviderError> {
        self.singletons.register(name, instance)?;
        self.lifecycle
            .record_state(name, None, LifecycleState::Initialized);

        debug!("Registered singleton: {name}");
        Ok(())
    }

    /// Checks if a singleton with given name or alias currently exists.
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons
            .contains(&self.definition_registry.canonical_name(name))
    }

    /// Returns the lifecycle state of a singleton with given name or alias.
    pub fn lifecycle_state(&self, name: &str) -> Option<LifecycleState> {
        self.lifecycle
            .state(&self.definition_registry.canonical_name(name))
    }

    /// Destroys a singleton with all singletons depending on it. Destruction errors are logged and
    /// returned.
    pub fn destroy_singleton(&self, name: &str) -> Vec<DestructionError> {
        let name = self.definition_registry.canonical_name(name);
        self.lifecycle.destroy_with_dependents(
            &name,
            &self.singletons,
            &self.dependency_graph,
            self.definition_registry.as_ref(),
        )
    }

    /// Destroys all singletons in reverse dependency order. Destruction errors are logged and
    /// returned. Creating singletons is not allowed until this call finishes.
    pub fn destroy_singletons(&self) -> Vec<DestructionError> {
        self.lifecycle.destroy_all(
            &self.singletons,
            &self.dependency_graph,
            self.definition_registry.as_ref(),
        )
    }

    /// Runs destruction callbacks for an instance obtained from this factory, usually a
    /// prototype, whose lifetime is managed by the caller.
    pub fn destroy_instance(
        &self,
        name: &str,
        instance: &ComponentInstanceAnyPtr,
    ) -> Result<Vec<DestructionError>, ComponentInstanceProviderError> {
        let name = self.definition_registry.canonical_name(name);
        let definition = self.definition(&name)?;

        Ok(self
            .lifecycle
            .destroy(&name, Some(definition.as_ref()), instance))
    }

    /// Removes a definition, destroying its singleton (and singletons depending on it) first.
    pub fn remove_definition(
        &self,
        name: &str,
    ) -> Result<Vec<DestructionError>, ComponentInstanceProviderError> {
        let name = self.definition_registry.canonical_name(name);
        let errors = self.destroy_singleton(&name);

        self.definition_registry.remove(&name)?;
        self.dependency_graph.remove_component(&name);
        self.lifecycle.clear_state(&name);

        Ok(errors)
    }

    fn definition(
        &self,
        name: &str,
    ) -> Result<ComponentDefinitionPtr, ComponentInstanceProviderError> {
        self.definition_registry
            .definition(name)
            .map_err(|error| match error {
                ComponentDefinitionRegistryError::NoSuchDefinition(name) => {
                    ComponentInstanceProviderError::NoSuchDefinition(name)
                }
                error => error.into(),
            })
    }

    fn build_instance(
        &self,
        name: &str,
        definition: &ComponentDefinition,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        debug!(
            "Creating {:?} component '{name}' of type: {}",
            definition.scope, definition.type_info.name
        );

        for dependency in &definition.depends_on {
            self.dependency(name, dependency)?;
        }

        let arguments = self.resolve_arguments(name, definition)?;

        let mut raw = self.instantiate(name, definition, &arguments)?;
        self.lifecycle
            .record_state(name, Some(definition), LifecycleState::Raw);

        self.bind_properties(name, definition, &mut raw)?;
        self.lifecycle
            .record_state(name, Some(definition), LifecycleState::PropertiesSet);

        self.lifecycle
            .initialize(name, definition, ComponentInstanceAnyPtr::from(raw))
    }

    /// Registers `component -> dependency` edge and returns the dependency instance.
    fn dependency(
        &self,
        component: &str,
        dependency: &str,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        let dependency = self.definition_registry.canonical_name(dependency);

        self.dependency_graph
            .register_dependency_checked(&dependency, component)?;

        self.create_instance(&dependency)
            .map_err(|error| ComponentInstanceProviderError::DependencyFailed {
                component: component.to_string(),
                dependency: dependency.clone(),
                source: Box::new(error),
            })
    }

    fn instantiate(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        arguments: &Arguments,
    ) -> Result<RawInstance, ComponentInstanceProviderError> {
        let to_instantiation_error = |source: ErrorPtr| ComponentInstanceProviderError::Instantiation {
            name: name.to_string(),
            source,
        };

        match &definition.recipe.instantiation {
            Instantiation::Constructor(constructor) => {
                constructor(arguments).map_err(to_instantiation_error)
            }
            Instantiation::FactoryMethod {
                factory_component,
                method,
            } => {
                let factory = self.dependency(name, factory_component)?;
                method(&factory, arguments).map_err(to_instantiation_error)
            }
        }
    }

    fn resolve_arguments(
        &self,
        name: &str,
        definition: &ComponentDefinition,
    ) -> Result<Arguments, ComponentInstanceProviderError> {
        definition
            .recipe
            .parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                self.resolve_argument(name, definition, index, parameter)
                    .map(|instance| Value::new(parameter.name.clone(), instance))
            })
            .try_collect()
            .map(Arguments::new)
    }

    /// Explicit arguments are matched by index, then by type, then by name. Parameters without an
    /// explicit argument are autowired by type, falling back to a component with the same name as
    /// the parameter.
    fn resolve_argument(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        index: usize,
        parameter: &Parameter,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        let arguments = &definition.recipe.arguments;
        let explicit = arguments
            .iter()
            .find(|argument| argument.target == ArgumentTarget::Index(index))
            .or_else(|| {
                arguments
                    .iter()
                    .find(|argument| argument.target == ArgumentTarget::Type(parameter.type_info))
            })
            .or_else(|| {
                arguments.iter().find(|argument| {
                    matches!(&argument.target, ArgumentTarget::Name(target) if *target == parameter.name)
                })
            });

        if let Some(argument) = explicit {
            return self.resolve_value(name, &argument.value);
        }

        let candidates = self
            .definition_registry
            .names_for_type(parameter.type_info.id)
            .into_iter()
            .filter(|candidate| candidate != name)
            .collect_vec();

        match candidates.len() {
            0 if self.definition_registry.contains(&parameter.name)
                || self.singletons.contains(&parameter.name) =>
            {
                self.dependency(name, &parameter.name)
            }
            0 => Err(ComponentInstanceProviderError::UnsatisfiedDependency {
                component: name.to_string(),
                parameter: parameter.name.clone(),
                type_name: parameter.type_info.name.to_string(),
            }),
            1 => self.dependency(name, &candidates[0]),
            _ => {
                let candidate = self
                    .primary_candidate(&candidates)?
                    .or_else(|| candidates.iter().find(|candidate| **candidate == parameter.name))
                    .ok_or_else(|| ComponentInstanceProviderError::AmbiguousDependency {
                        component: name.to_string(),
                        type_name: parameter.type_info.name.to_string(),
                        candidates: candidates.clone(),
                    })?;

                self.dependency(name, candidate)
            }
        }
    }

    fn resolve_value(
        &self,
        name: &str,
        value: &ValueSource,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        match value {
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::Reference(reference) => self.dependency(name, reference),
        }
    }

    /// Returns the single primary candidate, if there is one.
    fn primary_candidate<'a>(
        &self,
        candidates: &'a [String],
    ) -> Result<Option<&'a String>, ComponentInstanceProviderError> {
        let mut primary = vec![];
        for candidate in candidates {
            if self.definition(candidate)?.is_primary {
                primary.push(candidate);
            }
        }

        Ok(if primary.len() == 1 {
            Some(primary[0])
        } else {
            None
        })
    }

    fn bind_properties(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        raw: &mut RawInstance,
    ) -> Result<(), ComponentInstanceProviderError> {
        if definition.property_values.is_empty() {
            return Ok(());
        }

        let to_instantiation_error = |source: ErrorPtr| ComponentInstanceProviderError::Instantiation {
            name: name.to_string(),
            source,
        };

        let binder = definition
            .property_binder
            .as_ref()
            .ok_or_else(|| to_instantiation_error(Arc::new(DefinitionError::NoPropertyBinder) as ErrorPtr))?;

        for (property, value) in definition
            .property_values
            .iter()
            .sorted_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs))
        {
            let value = Value::new(property.clone(), self.resolve_value(name, value)?);
            binder(&mut **raw, property, &value).map_err(to_instantiation_error)?;
        }

        Ok(())
    }
}

impl ComponentInstanceProvider for ComponentFactory {
    fn instance_by_name(
        &self,
        name: &str,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        self.create_instance(name)
    }

    fn primary_instance(
        &self,
        type_info: TypeInfo,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        let candidates = self.definition_registry.names_for_type(type_info.id);

        let name = match candidates.len() {
            0 => {
                return Err(ComponentInstanceProviderError::NoSuchDefinition(
                    type_info.name.to_string(),
                ))
            }
            1 => &candidates[0],
            _ => self.primary_candidate(&candidates)?.ok_or_else(|| {
                ComponentInstanceProviderError::AmbiguousDependency {
                    component: type_info.name.to_string(),
                    type_name: type_info.name.to_string(),
                    candidates: candidates.clone(),
                }
            })?,
        };

        self.create_instance(name)
    }

    fn instances(
        &self,
        type_info: TypeInfo,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, ComponentInstanceProviderError> {
        self.definition_registry
            .names_for_type(type_info.id)
            .iter()
            .map(|name| self.create_instance(name))
            .try_collect()
    }
}
