//! Message handling glue for a simple in-memory broker: keeps the [SubscriptionRegistry] in sync
//! with subscription messages and translates user destinations on the way.

use crate::error::MessagingError;
use crate::message::{Message, SimpMessageType};
use crate::subscription_registry::{SubscriptionMap, SubscriptionRegistry};
use crate::user_destination::{UserDestinationResolver, UserRegistryPtr};
use itertools::Itertools;
use sprout_di::instance_provider::ComponentInstancePtr;
use tracing::{debug, trace};

pub type SubscriptionRegistryPtr = ComponentInstancePtr<dyn SubscriptionRegistry + Send + Sync>;

/// A subscriber which should receive a message.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Delivery {
    pub session_id: String,
    pub subscription_id: String,
    pub destination: String,
}

pub struct BrokerMessageHandler {
    subscription_registry: SubscriptionRegistryPtr,
    user_registry: UserRegistryPtr,
    user_destination_resolver: ComponentInstancePtr<UserDestinationResolver>,
}

impl BrokerMessageHandler {
    pub fn new(
        subscription_registry: SubscriptionRegistryPtr,
        user_registry: UserRegistryPtr,
        user_destination_resolver: ComponentInstancePtr<UserDestinationResolver>,
    ) -> Self {
        Self {
            subscription_registry,
            user_registry,
            user_destination_resolver,
        }
    }

    /// Handles a message coming from a client session and returns the deliveries it results in.
    /// Only `MESSAGE` types produce deliveries. Session lifecycle messages are passed to the user
    /// registry as well.
    pub fn handle_message(&self, message: &Message) -> Result<Vec<Delivery>, MessagingError> {
        if matches!(
            message.message_type,
            SimpMessageType::Connect | SimpMessageType::Disconnect
        ) {
            self.user_registry.handle_message(message);
        }

        let message = self.resolve_user_destination(message);

        match message.message_type {
            SimpMessageType::Subscribe => self
                .subscription_registry
                .register_subscription_message(&message)
                .map(|_| vec![]),
            SimpMessageType::Unsubscribe => self
                .subscription_registry
                .unregister_subscription_message(&message)
                .map(|_| vec![]),
            SimpMessageType::Disconnect => {
                if let Some(session_id) = message.session_id() {
                    self.subscription_registry
                        .unregister_all_subscriptions(session_id);
                }
                Ok(vec![])
            }
            SimpMessageType::Message => self.deliveries(&message),
            _ => {
                trace!("Ignoring message: {message:?}");
                Ok(vec![])
            }
        }
    }

    fn deliveries(&self, message: &Message) -> Result<Vec<Delivery>, MessagingError> {
        let destination = message.destination().unwrap_or_default();
        let targets = match self.user_destination_resolver.resolve_destination(message) {
            Some(result) => result.target_destinations,
            None => vec![destination.to_string()],
        };

        let mut deliveries = vec![];
        for target in targets {
            let subscriptions = if target == destination {
                self.subscription_registry
                    .find_subscriptions_message(message)?
            } else {
                self.subscription_registry.find_subscriptions(&target)
            };

            deliveries.extend(to_deliveries(subscriptions, &target));
        }

        debug!(
            "Delivering message for {destination} to {} subscriber(s)",
            deliveries.len()
        );
        Ok(deliveries)
    }

    /// Subscriptions to user destinations are stored under the session-specific destination.
    fn resolve_user_destination(&self, message: &Message) -> Message {
        let mut message = message.clone();

        if matches!(
            message.message_type,
            SimpMessageType::Subscribe | SimpMessageType::Unsubscribe
        ) {
            if let Some(target) = self
                .user_destination_resolver
                .resolve_destination(&message)
                .and_then(|result| result.target_destinations.into_iter().next())
            {
                message.headers.destination = Some(target);
            }
        }

        message
    }
}

fn to_deliveries(subscriptions: SubscriptionMap, destination: &str) -> Vec<Delivery> {
    subscriptions
        .into_iter()
        .flat_map(|(session_id, subscription_ids)| {
            subscription_ids
                .into_iter()
                .map(move |subscription_id| Delivery {
                    session_id: session_id.clone(),
                    subscription_id,
                    destination: destination.to_string(),
                })
        })
        .sorted_by(|a, b| {
            (&a.session_id, &a.subscription_id).cmp(&(&b.session_id, &b.subscription_id))
        })
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use crate::broker::{BrokerMessageHandler, Delivery};
    use crate::config::MessagingConfig;
    use crate::message::{Message, SimpMessageType};
    use crate::subscription_registry::{DefaultSubscriptionRegistry, MockSubscriptionRegistry};
    use crate::user_destination::{
        DefaultUserRegistry, MockUserRegistry, UserDestinationResolver, UserRegistryPtr,
    };
    use mockall::predicate::eq;
    use std::sync::Arc;

    fn resolver(user_registry: UserRegistryPtr) -> Arc<UserDestinationResolver> {
        Arc::new(UserDestinationResolver::new(
            user_registry,
            &MessagingConfig::default(),
        ))
    }

    fn handler(subscription_registry: MockSubscriptionRegistry) -> BrokerMessageHandler {
        let user_registry: UserRegistryPtr = Arc::new(DefaultUserRegistry::new());
        BrokerMessageHandler::new(
            Arc::new(subscription_registry),
            user_registry.clone(),
            resolver(user_registry),
        )
    }

    #[test]
    fn should_unregister_all_on_disconnect() {
        let mut registry = MockSubscriptionRegistry::new();
        registry
            .expect_unregister_all_subscriptions()
            .with(eq("s1"))
            .times(1)
            .return_const(());

        let handler = handler(registry);
        let deliveries = handler
            .handle_message(
                &Message::builder(SimpMessageType::Disconnect)
                    .session_id("s1")
                    .build(),
            )
            .unwrap();

        assert!(deliveries.is_empty());
    }

    #[test]
    fn should_store_user_subscriptions_under_session_destination() {
        let mut registry = MockSubscriptionRegistry::new();
        registry
            .expect_register_subscription_message()
            .withf(|message| message.destination() == Some("/queue/reply-users1"))
            .times(1)
            .returning(|_| Ok(()));

        handler(registry)
            .handle_message(
                &Message::builder(SimpMessageType::Subscribe)
                    .session_id("s1")
                    .subscription_id("1")
                    .destination("/user/queue/reply")
                    .build(),
            )
            .unwrap();
    }

    #[test]
    fn should_deliver_to_subscribers() {
        let user_registry: UserRegistryPtr = Arc::new(DefaultUserRegistry::new());
        let handler = BrokerMessageHandler::new(
            Arc::new(DefaultSubscriptionRegistry::new()),
            user_registry.clone(),
            resolver(user_registry),
        );

        for (session, subscription) in [("s2", "1"), ("s1", "1")] {
            handler
                .handle_message(
                    &Message::builder(SimpMessageType::Subscribe)
                        .session_id(session)
                        .subscription_id(subscription)
                        .destination("/topic/a")
                        .build(),
                )
                .unwrap();
        }

        let deliveries = handler
            .handle_message(
                &Message::builder(SimpMessageType::Message)
                    .destination("/topic/a")
                    .payload("hello")
                    .build(),
            )
            .unwrap();

        assert_eq!(
            deliveries,
            vec![
                Delivery {
                    session_id: "s1".to_string(),
                    subscription_id: "1".to_string(),
                    destination: "/topic/a".to_string(),
                },
                Delivery {
                    session_id: "s2".to_string(),
                    subscription_id: "1".to_string(),
                    destination: "/topic/a".to_string(),
                },
            ]
        );
    }

    #[test]
    fn should_pass_session_lifecycle_to_user_registry() {
        let mut user_registry = MockUserRegistry::new();
        user_registry
            .expect_handle_message()
            .withf(|message| message.message_type == SimpMessageType::Connect)
            .times(1)
            .return_const(());
        user_registry
            .expect_handle_message()
            .withf(|message| message.message_type == SimpMessageType::Disconnect)
            .times(1)
            .return_const(());

        let mut subscription_registry = MockSubscriptionRegistry::new();
        subscription_registry
            .expect_unregister_all_subscriptions()
            .return_const(());

        let user_registry: UserRegistryPtr = Arc::new(user_registry);
        let handler = BrokerMessageHandler::new(
            Arc::new(subscription_registry),
            user_registry.clone(),
            resolver(user_registry),
        );

        for message_type in [SimpMessageType::Connect, SimpMessageType::Disconnect] {
            handler
                .handle_message(
                    &Message::builder(message_type)
                        .session_id("s1")
                        .user("alice")
                        .build(),
                )
                .unwrap();
        }
    }
}
