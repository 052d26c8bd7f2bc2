//! Core application framework functionality.

use crate::config::{ApplicationConfig, APPLICATION_CONFIG};
use crate::post_processor::DefinitionPostProcessorPtr;
use config::ConfigError;
use itertools::Itertools;
use parking_lot::Mutex;
use sprout_di::component_registry::{
    ComponentDefinition, ComponentDefinitionRegistryError, DefaultComponentDefinitionRegistry,
};
use sprout_di::factory::{ComponentFactory, ComponentFactoryBuilder};
use sprout_di::instance_provider::{
    ComponentInstanceAnyPtr, ComponentInstanceProvider, ComponentInstanceProviderError,
    ComponentInstancePtr, ErrorPtr, TypeInfo,
};
use sprout_di::post_processor::ComponentPostProcessorPtr;
use sprout_di::DestructionError;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error reading configuration: {0}")]
    ConfigError(#[source] ConfigError),
    #[error("Error post-processing definitions: {0}")]
    DefinitionPostProcessingError(ErrorPtr),
    #[error("Error creating singletons: {0}")]
    SingletonCreationError(#[source] ComponentInstanceProviderError),
}

/// Explicit handle for a container. Owns the [ComponentFactory] along with its configuration, and
/// drives its startup with [refresh](Self::refresh) and its shutdown with [close](Self::close).
///
/// Multiple contexts can exist in a single process, and never share instances.
pub struct ApplicationContext {
    config: ApplicationConfig,
    factory: ComponentFactory,
    definition_post_processors: Mutex<Vec<DefinitionPostProcessorPtr>>,
    active: AtomicBool,
}

impl ApplicationContext {
    pub fn new(config: ApplicationConfig) -> Self {
        let factory = ComponentFactoryBuilder::new()
            .with_definition_registry(Box::new(DefaultComponentDefinitionRegistry::new(
                config.allow_definition_overriding,
            )))
            .build();

        if let Err(error) = factory.register_singleton(
            APPLICATION_CONFIG,
            ComponentInstancePtr::new(config.clone()) as ComponentInstanceAnyPtr,
        ) {
            // a new factory has no singletons, so this is only reachable through a logic error
            warn!("Cannot register application config: {error}");
        }

        Self {
            config,
            factory,
            definition_post_processors: Default::default(),
            active: AtomicBool::new(false),
        }
    }

    /// Creates a context configured from the environment. See [crate::config] for details.
    pub fn from_environment() -> Result<Self, ApplicationError> {
        ApplicationConfig::init_from_environment()
            .map(Self::new)
            .map_err(ApplicationError::ConfigError)
    }

    #[inline]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    #[inline]
    pub fn factory(&self) -> &ComponentFactory {
        &self.factory
    }

    /// Shortcut for registering a definition in the underlying registry.
    pub fn register_definition(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ComponentDefinitionRegistryError> {
        self.factory.register_definition(name, definition)
    }

    pub fn add_definition_post_processor(&self, post_processor: DefinitionPostProcessorPtr) {
        self.definition_post_processors.lock().push(post_processor);
    }

    pub fn add_component_post_processor(&self, post_processor: ComponentPostProcessorPtr) {
        self.factory.add_post_processor(post_processor);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts the context: installs logging, runs definition post-processors in their order and
    /// creates all non-lazy singletons, if configured to do so.
    pub fn refresh(&self) -> Result<(), ApplicationError> {
        if self.config.install_tracing_logger {
            // another subscriber might be installed already, which is fine
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .try_init();
        }

        info!("Refreshing application context...");

        let post_processors = self
            .definition_post_processors
            .lock()
            .iter()
            .cloned()
            .sorted_by_key(|post_processor| post_processor.order())
            .collect_vec();

        for post_processor in post_processors {
            post_processor
                .post_process(self.factory.definition_registry())
                .map_err(ApplicationError::DefinitionPostProcessingError)?;
        }

        if self.config.pre_instantiate_singletons {
            if let Err(error) = self.factory.pre_instantiate_singletons() {
                warn!("Error creating singletons, destroying already created ones: {error}");

                for destruction_error in self.factory.destroy_singletons() {
                    warn!("{destruction_error}");
                }

                return Err(ApplicationError::SingletonCreationError(error));
            }
        }

        self.active.store(true, Ordering::SeqCst);

        info!("Application context started.");
        Ok(())
    }

    /// Destroys all singletons in reverse dependency order. Destruction is best-effort, so all
    /// errors are returned after every singleton had a chance to be destroyed.
    pub fn close(&self) -> Vec<DestructionError> {
        info!("Closing application context...");

        let errors = self.factory.destroy_singletons();
        self.active.store(false, Ordering::SeqCst);

        info!(
            "Application context closed with {} destruction error(s).",
            errors.len()
        );
        errors
    }
}

impl Drop for ApplicationContext {
    fn drop(&mut self) {
        if self.is_active() {
            self.close();
        }
    }
}

impl ComponentInstanceProvider for ApplicationContext {
    #[inline]
    fn instance_by_name(
        &self,
        name: &str,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        self.factory.instance_by_name(name)
    }

    #[inline]
    fn primary_instance(
        &self,
        type_info: TypeInfo,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        self.factory.primary_instance(type_info)
    }

    #[inline]
    fn instances(
        &self,
        type_info: TypeInfo,
    ) -> Result<Vec<ComponentInstanceAnyPtr>, ComponentInstanceProviderError> {
        self.factory.instances(type_info)
    }
}
