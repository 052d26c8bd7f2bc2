//! Registry of client subscriptions, used by a broker to find the sessions interested in messages
//! sent to a destination.
//!
//! Destinations are matched literally. Pattern matching, if needed, belongs to the layer calling
//! the registry, which should resolve patterns into concrete destinations first.

use crate::error::MessagingError;
use crate::message::{Message, SimpMessageType};
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use tracing::{debug, error};

/// Subscribers of a destination: session id to subscription ids, in subscription order.
pub type SubscriptionMap = FxHashMap<String, Vec<String>>;

/// Stores subscriptions keyed by session and subscription id, with a reverse index by destination.
#[cfg_attr(test, automock)]
pub trait SubscriptionRegistry {
    /// Adds a subscription. Registering the same triple again has no effect, while registering an
    /// existing session and subscription id with a new destination moves the subscription.
    fn register_subscription(&self, session_id: &str, subscription_id: &str, destination: &str);

    /// Removes a subscription. Does nothing if the subscription doesn't exist, since
    /// unsubscribing races with session teardown.
    fn unregister_subscription(&self, session_id: &str, subscription_id: &str);

    /// Removes all subscriptions of a given session.
    fn unregister_all_subscriptions(&self, session_id: &str);

    /// Returns a snapshot of all subscribers to the exact destination.
    fn find_subscriptions(&self, destination: &str) -> SubscriptionMap;

    /// Registers a subscription described by a `SUBSCRIBE` message. Messages with missing headers
    /// are logged and ignored.
    fn register_subscription_message(&self, message: &Message) -> Result<(), MessagingError> {
        check_message_type(message, SimpMessageType::Subscribe)?;

        let Some(session_id) = required_header(message, message.session_id(), "session id") else {
            return Ok(());
        };
        let Some(subscription_id) =
            required_header(message, message.subscription_id(), "subscription id")
        else {
            return Ok(());
        };
        let Some(destination) = required_header(message, message.destination(), "destination")
        else {
            return Ok(());
        };

        self.register_subscription(session_id, subscription_id, destination);
        Ok(())
    }

    /// Removes a subscription described by an `UNSUBSCRIBE` message. Messages with missing headers
    /// are logged and ignored.
    fn unregister_subscription_message(&self, message: &Message) -> Result<(), MessagingError> {
        check_message_type(message, SimpMessageType::Unsubscribe)?;

        let Some(session_id) = required_header(message, message.session_id(), "session id") else {
            return Ok(());
        };
        let Some(subscription_id) =
            required_header(message, message.subscription_id(), "subscription id")
        else {
            return Ok(());
        };

        self.unregister_subscription(session_id, subscription_id);
        Ok(())
    }

    /// Finds subscribers for the destination of a `MESSAGE`. A message without a destination has
    /// no subscribers.
    fn find_subscriptions_message(
        &self,
        message: &Message,
    ) -> Result<SubscriptionMap, MessagingError> {
        check_message_type(message, SimpMessageType::Message)?;

        Ok(
            match required_header(message, message.destination(), "destination") {
                Some(destination) => self.find_subscriptions(destination),
                None => SubscriptionMap::default(),
            },
        )
    }
}

fn check_message_type(message: &Message, expected: SimpMessageType) -> Result<(), MessagingError> {
    if message.message_type == expected {
        Ok(())
    } else {
        Err(MessagingError::UnexpectedMessageType {
            expected,
            actual: message.message_type,
        })
    }
}

fn required_header<'a>(message: &Message, value: Option<&'a str>, header: &str) -> Option<&'a str> {
    if value.is_none() {
        error!("No {header} in {message:?}");
    }

    value
}

#[derive(Default)]
struct Subscriptions {
    // session -> subscription -> destination
    by_session: FxHashMap<String, FxHashMap<String, String>>,
    // destination -> session -> subscriptions
    by_destination: FxHashMap<String, SubscriptionMap>,
}

impl Subscriptions {
    fn add_to_destination(&mut self, destination: &str, session_id: &str, subscription_id: &str) {
        let subscriptions = self
            .by_destination
            .entry(destination.to_string())
            .or_default()
            .entry(session_id.to_string())
            .or_default();

        if !subscriptions.iter().any(|id| id == subscription_id) {
            subscriptions.push(subscription_id.to_string());
        }
    }

    fn remove_from_destination(&mut self, destination: &str, session_id: &str, subscription_id: &str) {
        let Some(sessions) = self.by_destination.get_mut(destination) else {
            return;
        };

        if let Some(subscriptions) = sessions.get_mut(session_id) {
            subscriptions.retain(|id| id != subscription_id);
            if subscriptions.is_empty() {
                sessions.remove(session_id);
            }
        }

        if sessions.is_empty() {
            self.by_destination.remove(destination);
        }
    }
}

/// In-memory [SubscriptionRegistry]. Both indices live under a single lock, so readers never see
/// a subscription present in one of them but not the other.
#[derive(Default)]
pub struct DefaultSubscriptionRegistry {
    subscriptions: RwLock<Subscriptions>,
}

impl DefaultSubscriptionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of sessions with at least one subscription.
    pub fn session_count(&self) -> usize {
        self.subscriptions.read().by_session.len()
    }

    /// Returns a snapshot of all destinations with at least one subscriber.
    pub fn destinations(&self) -> Vec<String> {
        self.subscriptions
            .read()
            .by_destination
            .keys()
            .cloned()
            .collect()
    }
}

impl SubscriptionRegistry for DefaultSubscriptionRegistry {
    fn register_subscription(&self, session_id: &str, subscription_id: &str, destination: &str) {
        let mut subscriptions = self.subscriptions.write();

        let previous = subscriptions
            .by_session
            .entry(session_id.to_string())
            .or_default()
            .insert(subscription_id.to_string(), destination.to_string());

        match previous {
            Some(previous) if previous == destination => return,
            Some(previous) => {
                subscriptions.remove_from_destination(&previous, session_id, subscription_id)
            }
            None => {}
        }

        subscriptions.add_to_destination(destination, session_id, subscription_id);

        debug!("Subscribed {session_id}/{subscription_id} to: {destination}");
    }

    fn unregister_subscription(&self, session_id: &str, subscription_id: &str) {
        let mut subscriptions = self.subscriptions.write();

        let Some(session) = subscriptions.by_session.get_mut(session_id) else {
            return;
        };
        let Some(destination) = session.remove(subscription_id) else {
            return;
        };

        if session.is_empty() {
            subscriptions.by_session.remove(session_id);
        }

        subscriptions.remove_from_destination(&destination, session_id, subscription_id);

        debug!("Unsubscribed {session_id}/{subscription_id} from: {destination}");
    }

    fn unregister_all_subscriptions(&self, session_id: &str) {
        let mut subscriptions = self.subscriptions.write();

        let Some(session) = subscriptions.by_session.remove(session_id) else {
            return;
        };

        for (subscription_id, destination) in &session {
            subscriptions.remove_from_destination(destination, session_id, subscription_id);
        }

        debug!(
            "Removed {} subscription(s) of session: {session_id}",
            session.len()
        );
    }

    fn find_subscriptions(&self, destination: &str) -> SubscriptionMap {
        self.subscriptions
            .read()
            .by_destination
            .get(destination)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MessagingError;
    use crate::message::{Message, SimpMessageType};
    use crate::subscription_registry::{
        DefaultSubscriptionRegistry, SubscriptionMap, SubscriptionRegistry,
    };

    fn subscribers(entries: &[(&str, &[&str])]) -> SubscriptionMap {
        entries
            .iter()
            .map(|(session, subscriptions)| {
                (
                    session.to_string(),
                    subscriptions.iter().map(|id| id.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn should_find_subscriptions_by_destination() {
        let registry = DefaultSubscriptionRegistry::new();
        registry.register_subscription("s1", "1", "/topic/a");
        registry.register_subscription("s1", "2", "/topic/b");
        registry.register_subscription("s2", "1", "/topic/a");
        registry.register_subscription("s1", "3", "/topic/a");

        assert_eq!(
            registry.find_subscriptions("/topic/a"),
            subscribers(&[("s1", &["1", "3"]), ("s2", &["1"])])
        );
        assert!(registry.find_subscriptions("/topic/c").is_empty());
    }

    #[test]
    fn should_register_idempotently() {
        let registry = DefaultSubscriptionRegistry::new();
        registry.register_subscription("s1", "1", "/topic/a");
        registry.register_subscription("s1", "1", "/topic/a");

        assert_eq!(
            registry.find_subscriptions("/topic/a"),
            subscribers(&[("s1", &["1"])])
        );
    }

    #[test]
    fn should_move_subscription_to_new_destination() {
        let registry = DefaultSubscriptionRegistry::new();
        registry.register_subscription("s1", "1", "/topic/a");
        registry.register_subscription("s1", "1", "/topic/b");

        assert!(registry.find_subscriptions("/topic/a").is_empty());
        assert_eq!(
            registry.find_subscriptions("/topic/b"),
            subscribers(&[("s1", &["1"])])
        );
        assert_eq!(registry.destinations(), vec!["/topic/b".to_string()]);
    }

    #[test]
    fn should_ignore_unregistering_unknown_subscription() {
        let registry = DefaultSubscriptionRegistry::new();
        registry.register_subscription("s1", "1", "/topic/a");

        registry.unregister_subscription("s1", "2");
        registry.unregister_subscription("s2", "1");
        registry.unregister_all_subscriptions("s2");

        assert_eq!(
            registry.find_subscriptions("/topic/a"),
            subscribers(&[("s1", &["1"])])
        );
    }

    #[test]
    fn should_clean_up_empty_entries() {
        let registry = DefaultSubscriptionRegistry::new();
        registry.register_subscription("s1", "1", "/topic/a");
        registry.unregister_subscription("s1", "1");

        assert_eq!(registry.session_count(), 0);
        assert!(registry.destinations().is_empty());
    }

    #[test]
    fn should_return_snapshot() {
        let registry = DefaultSubscriptionRegistry::new();
        registry.register_subscription("s1", "1", "/topic/a");

        let snapshot = registry.find_subscriptions("/topic/a");
        registry.unregister_all_subscriptions("s1");

        assert_eq!(snapshot, subscribers(&[("s1", &["1"])]));
    }

    #[test]
    fn should_reject_unexpected_message_type() {
        let registry = DefaultSubscriptionRegistry::new();
        let message = Message::builder(SimpMessageType::Message)
            .session_id("s1")
            .subscription_id("1")
            .destination("/topic/a")
            .build();

        assert_eq!(
            registry.register_subscription_message(&message).unwrap_err(),
            MessagingError::UnexpectedMessageType {
                expected: SimpMessageType::Subscribe,
                actual: SimpMessageType::Message,
            }
        );
        assert!(registry.unregister_subscription_message(&message).is_err());
        assert!(registry.find_subscriptions_message(&message).is_ok());
    }

    #[test]
    fn should_ignore_messages_without_headers() {
        let registry = DefaultSubscriptionRegistry::new();

        registry
            .register_subscription_message(
                &Message::builder(SimpMessageType::Subscribe)
                    .session_id("s1")
                    .destination("/topic/a")
                    .build(),
            )
            .unwrap();
        assert_eq!(registry.session_count(), 0);

        registry.register_subscription("s1", "1", "/topic/a");
        registry
            .unregister_subscription_message(
                &Message::builder(SimpMessageType::Unsubscribe)
                    .subscription_id("1")
                    .build(),
            )
            .unwrap();
        assert_eq!(registry.session_count(), 1);

        assert!(registry
            .find_subscriptions_message(&Message::builder(SimpMessageType::Message).build())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn should_delegate_message_entry_points() {
        let registry = DefaultSubscriptionRegistry::new();

        registry
            .register_subscription_message(
                &Message::builder(SimpMessageType::Subscribe)
                    .session_id("s1")
                    .subscription_id("1")
                    .destination("/topic/a")
                    .build(),
            )
            .unwrap();

        let found = registry
            .find_subscriptions_message(
                &Message::builder(SimpMessageType::Message)
                    .destination("/topic/a")
                    .build(),
            )
            .unwrap();
        assert_eq!(found, subscribers(&[("s1", &["1"])]));

        registry
            .unregister_subscription_message(
                &Message::builder(SimpMessageType::Unsubscribe)
                    .session_id("s1")
                    .subscription_id("1")
                    .build(),
            )
            .unwrap();
        assert!(registry.find_subscriptions("/topic/a").is_empty());
    }
}
