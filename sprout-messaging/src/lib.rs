//! Broker-style messaging support for [sprout] applications.
//!
//! The core of this crate is the [SubscriptionRegistry](subscription_registry::SubscriptionRegistry),
//! which maps client subscriptions to destinations and answers which sessions should receive a
//! message sent to a given destination. On top of it, user destinations allow addressing all
//! sessions of a user by name (see [user_destination]).
//!
//! Transports (e.g. STOMP over WebSocket) are not part of this crate. They are expected to convert
//! their frames into [Message](message::Message)s and pass them to a
//! [BrokerMessageHandler](broker::BrokerMessageHandler).
//!
//! ### Registering components
//!
//! All messaging components can be registered in an
//! [ApplicationContext](sprout::application::ApplicationContext) with a single definition
//! post-processor:
//!
//! ```
//! use sprout::application::ApplicationContext;
//! use sprout::config::ApplicationConfig;
//! use sprout_di::instance_provider::TypedComponentInstanceProvider;
//! use sprout_messaging::broker::BrokerMessageHandler;
//! use sprout_messaging::config::MessagingConfig;
//! use sprout_messaging::registration::{MessagingComponentsRegistrar, BROKER_MESSAGE_HANDLER};
//! use std::sync::Arc;
//!
//! let context = ApplicationContext::new(ApplicationConfig::default());
//! context.add_definition_post_processor(Arc::new(MessagingComponentsRegistrar::new(
//!     MessagingConfig::default(),
//! )));
//! context.refresh().unwrap();
//!
//! assert!(context
//!     .instance_by_name_typed::<BrokerMessageHandler>(BROKER_MESSAGE_HANDLER)
//!     .is_ok());
//! ```

pub mod broker;
pub mod config;
mod error;
pub mod message;
pub mod registration;
pub mod subscription_registry;
pub mod user_destination;

pub use error::MessagingError;
