//! Registration of messaging components in an application context.

use crate::broker::{BrokerMessageHandler, SubscriptionRegistryPtr};
use crate::config::{MessagingConfig, MESSAGING_CONFIG};
use crate::subscription_registry::DefaultSubscriptionRegistry;
use crate::user_destination::{DefaultUserRegistry, UserDestinationResolver, UserRegistryPtr};
use sprout::post_processor::{ComponentDefinitionRegistry, DefinitionPostProcessor, ErrorPtr};
use sprout_di::component::Arguments;
use sprout_di::component_registry::{ComponentDefinition, ComponentDefinitionRegistryError};
use std::sync::Arc;
use tracing::debug;

pub const SUBSCRIPTION_REGISTRY: &str = "subscriptionRegistry";
pub const USER_REGISTRY: &str = "userRegistry";
pub const USER_DESTINATION_RESOLVER: &str = "userDestinationResolver";
pub const BROKER_MESSAGE_HANDLER: &str = "brokerMessageHandler";

/// Registers definitions for all messaging components. Components already registered under the
/// same names are kept, so applications can provide their own.
///
/// Registries are registered as trait objects: an application replacing one must provide a
/// [SubscriptionRegistryPtr] or a [UserRegistryPtr] under the matching name.
pub fn register_messaging_components(
    registry: &dyn ComponentDefinitionRegistry,
    config: MessagingConfig,
) -> Result<(), ComponentDefinitionRegistryError> {
    register_default(
        registry,
        MESSAGING_CONFIG,
        ComponentDefinition::builder(move |_| Ok(config.clone())).build(),
    )?;

    register_default(
        registry,
        SUBSCRIPTION_REGISTRY,
        ComponentDefinition::builder(|_| {
            Ok(Arc::new(DefaultSubscriptionRegistry::new()) as SubscriptionRegistryPtr)
        })
        .build(),
    )?;

    register_default(
        registry,
        USER_REGISTRY,
        ComponentDefinition::builder(|_| {
            Ok(Arc::new(DefaultUserRegistry::new()) as UserRegistryPtr)
        })
        .build(),
    )?;

    register_default(
        registry,
        USER_DESTINATION_RESOLVER,
        ComponentDefinition::builder(|arguments: &Arguments| {
            let config = arguments.get::<MessagingConfig>(1)?;
            Ok(UserDestinationResolver::new(
                arguments.cloned::<UserRegistryPtr>(0)?,
                &config,
            ))
        })
        .parameter::<UserRegistryPtr>(USER_REGISTRY)
        .parameter::<MessagingConfig>(MESSAGING_CONFIG)
        .build(),
    )?;

    register_default(
        registry,
        BROKER_MESSAGE_HANDLER,
        ComponentDefinition::builder(|arguments: &Arguments| {
            Ok(BrokerMessageHandler::new(
                arguments.cloned::<SubscriptionRegistryPtr>(0)?,
                arguments.cloned::<UserRegistryPtr>(1)?,
                arguments.get::<UserDestinationResolver>(2)?,
            ))
        })
        .parameter::<SubscriptionRegistryPtr>(SUBSCRIPTION_REGISTRY)
        .parameter::<UserRegistryPtr>(USER_REGISTRY)
        .parameter::<UserDestinationResolver>(USER_DESTINATION_RESOLVER)
        .build(),
    )
}

fn register_default(
    registry: &dyn ComponentDefinitionRegistry,
    name: &str,
    definition: ComponentDefinition,
) -> Result<(), ComponentDefinitionRegistryError> {
    if registry.contains(name) {
        debug!("Keeping existing definition for: {name}");
        return Ok(());
    }

    registry.register(name, definition)
}

/// [DefinitionPostProcessor] registering messaging components when the context gets refreshed.
/// Runs late, after application post-processors had a chance to register their own components.
pub struct MessagingComponentsRegistrar {
    config: MessagingConfig,
}

impl MessagingComponentsRegistrar {
    pub fn new(config: MessagingConfig) -> Self {
        Self { config }
    }
}

impl DefinitionPostProcessor for MessagingComponentsRegistrar {
    fn post_process(&self, registry: &dyn ComponentDefinitionRegistry) -> Result<(), ErrorPtr> {
        register_messaging_components(registry, self.config.clone())
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }

    fn order(&self) -> i32 {
        128
    }
}
