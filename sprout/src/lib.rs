//! Application context built on [sprout_di] dependency injection.
//!
//! A bare [ComponentFactory](sprout_di::factory::ComponentFactory) creates components on demand,
//! but something still needs to decide when the container starts and when it shuts down. This crate
//! provides that in the form of [ApplicationContext](application::ApplicationContext), which also
//! configures supporting infrastructure, e.g. logging.
//!
//! The typical flow is:
//!
//! 1. Create the context, either with explicit [ApplicationConfig](config::ApplicationConfig) or
//!    from the environment.
//! 2. Register component definitions and post-processors.
//! 3. Call `refresh()`, which lets
//!    [DefinitionPostProcessors](post_processor::DefinitionPostProcessor) adjust definitions and
//!    then eagerly creates all non-lazy singletons.
//! 4. Call `close()` (or drop the context), which destroys singletons in reverse dependency order.
//!
//! ```
//! use sprout::application::ApplicationContext;
//! use sprout::config::ApplicationConfig;
//! use sprout_di::component_registry::ComponentDefinition;
//! use sprout_di::instance_provider::TypedComponentInstanceProvider;
//!
//! struct Greeter;
//!
//! let context = ApplicationContext::new(ApplicationConfig::default());
//! context
//!     .register_definition("greeter", ComponentDefinition::builder(|_| Ok(Greeter)).build())
//!     .unwrap();
//!
//! context.refresh().unwrap();
//! assert!(context.instance_by_name_typed::<Greeter>("greeter").is_ok());
//! assert!(context.close().is_empty());
//! ```

pub mod application;
pub mod config;
pub mod post_processor;
