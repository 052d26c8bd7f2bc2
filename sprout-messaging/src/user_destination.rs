//! User destinations let clients subscribe to a destination unique to their session, without
//! knowing the session id, and let applications send messages to a user by name.
//!
//! With the default `/user/` prefix:
//!
//! * a session `s1` subscribing to `/user/queue/reply` is actually subscribed to
//!   `/queue/reply-users1`,
//! * a message sent to `/user/alice/queue/reply` is delivered to `/queue/reply-user{sessionId}`
//!   for every session of `alice`.

use crate::config::MessagingConfig;
use crate::message::{Message, SimpMessageType};
use fxhash::FxHashMap;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use sprout_di::instance_provider::ComponentInstancePtr;
use tracing::{debug, error, trace};

pub type UserRegistryPtr = ComponentInstancePtr<dyn UserRegistry + Send + Sync>;

/// Source of user sessions.
#[cfg_attr(test, automock)]
pub trait UserRegistry {
    /// Returns ids of all sessions of given user.
    fn sessions(&self, user: &str) -> Vec<String>;

    /// Returns the number of connected users.
    fn user_count(&self) -> usize;

    /// Updates the registry from session lifecycle messages, such as `CONNECT` or `DISCONNECT`.
    fn handle_message(&self, message: &Message);
}

#[derive(Default)]
struct Users {
    // user -> sessions, in connection order
    sessions: FxHashMap<String, Vec<String>>,
    // session -> user
    users: FxHashMap<String, String>,
}

/// [UserRegistry] kept up to date with connect and disconnect events.
#[derive(Default)]
pub struct DefaultUserRegistry {
    users: RwLock<Users>,
}

impl DefaultUserRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Tracks a session of a user. Connecting the same session again moves it to the new user.
    pub fn connect(&self, user: &str, session_id: &str) {
        let mut users = self.users.write();

        if let Some(previous) = users
            .users
            .insert(session_id.to_string(), user.to_string())
        {
            remove_session(&mut users.sessions, &previous, session_id);
        }

        users
            .sessions
            .entry(user.to_string())
            .or_default()
            .push(session_id.to_string());

        debug!("Connected session {session_id} of user: {user}");
    }

    /// Stops tracking a session. Unknown sessions are ignored.
    pub fn disconnect(&self, session_id: &str) {
        let mut users = self.users.write();

        if let Some(user) = users.users.remove(session_id) {
            remove_session(&mut users.sessions, &user, session_id);
            debug!("Disconnected session {session_id} of user: {user}");
        }
    }
}

fn remove_session(sessions: &mut FxHashMap<String, Vec<String>>, user: &str, session_id: &str) {
    if let Some(user_sessions) = sessions.get_mut(user) {
        user_sessions.retain(|id| id != session_id);
        if user_sessions.is_empty() {
            sessions.remove(user);
        }
    }
}

impl UserRegistry for DefaultUserRegistry {
    fn sessions(&self, user: &str) -> Vec<String> {
        self.users
            .read()
            .sessions
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    fn user_count(&self) -> usize {
        self.users.read().sessions.len()
    }

    /// Tracks sessions from `CONNECT` and `DISCONNECT` messages. Other messages are ignored.
    fn handle_message(&self, message: &Message) {
        match (message.message_type, message.session_id()) {
            (SimpMessageType::Connect, Some(session_id)) => {
                if let Some(user) = message.user() {
                    self.connect(user, session_id);
                }
            }
            (SimpMessageType::Disconnect, Some(session_id)) => self.disconnect(session_id),
            _ => {}
        }
    }
}

/// Outcome of resolving a user destination.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserDestinationResult {
    /// Destination the message was sent to.
    pub source_destination: String,
    /// Session-specific destinations the message should be delivered to.
    pub target_destinations: Vec<String>,
    /// User destination as seen by subscribers, e.g. `/user/queue/reply`.
    pub subscribe_destination: String,
    /// Target user, if known.
    pub user: Option<String>,
}

/// Translates user destinations into session-specific ones.
pub struct UserDestinationResolver {
    user_registry: UserRegistryPtr,
    prefix: String,
}

impl UserDestinationResolver {
    pub fn new(user_registry: UserRegistryPtr, config: &MessagingConfig) -> Self {
        let mut prefix = config.user_destination_prefix.clone();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        Self {
            user_registry,
            prefix,
        }
    }

    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolves the destination of a message. Returns `None` for messages which don't target a
    /// user destination, or lack what's needed to resolve it.
    pub fn resolve_destination(&self, message: &Message) -> Option<UserDestinationResult> {
        let destination = message.destination()?;
        if !destination.starts_with(&self.prefix) {
            return None;
        }

        let result = match message.message_type {
            SimpMessageType::Subscribe | SimpMessageType::Unsubscribe => {
                self.resolve_subscription(message, destination)
            }
            SimpMessageType::Message => self.resolve_message(message, destination),
            _ => None,
        };

        if let Some(result) = &result {
            trace!(
                "Resolved {destination} to: {}",
                result.target_destinations.iter().join(", ")
            );
        }

        result
    }

    fn resolve_subscription(
        &self,
        message: &Message,
        destination: &str,
    ) -> Option<UserDestinationResult> {
        let Some(session_id) = message.session_id() else {
            error!("No session id in user destination subscription: {message:?}");
            return None;
        };

        // keep the leading slash: /user/queue/x -> /queue/x
        let actual_destination = &destination[self.prefix.len() - 1..];

        Some(UserDestinationResult {
            source_destination: destination.to_string(),
            target_destinations: vec![session_destination(actual_destination, session_id)],
            subscribe_destination: destination.to_string(),
            user: message.user().map(str::to_string),
        })
    }

    fn resolve_message(&self, message: &Message, destination: &str) -> Option<UserDestinationResult> {
        let user_and_destination = &destination[self.prefix.len()..];

        let Some(separator) = user_and_destination.find('/') else {
            debug!("No target user in destination: {destination}");
            return None;
        };

        let user = user_and_destination[..separator].replace("%2F", "/");
        let actual_destination = &user_and_destination[separator..];

        let sessions = match (message.user(), message.session_id()) {
            (Some(sender), Some(session_id)) if sender == user => vec![session_id.to_string()],
            _ => self.user_registry.sessions(&user),
        };

        Some(UserDestinationResult {
            source_destination: destination.to_string(),
            target_destinations: sessions
                .iter()
                .map(|session_id| session_destination(actual_destination, session_id))
                .collect_vec(),
            subscribe_destination: format!("{}{}", self.prefix, &actual_destination[1..]),
            user: Some(user),
        })
    }
}

fn session_destination(destination: &str, session_id: &str) -> String {
    format!("{destination}-user{session_id}")
}

#[cfg(test)]
mod tests {
    use crate::config::MessagingConfig;
    use crate::message::{Message, SimpMessageType};
    use crate::user_destination::{
        DefaultUserRegistry, MockUserRegistry, UserDestinationResolver, UserDestinationResult,
        UserRegistry,
    };
    use mockall::predicate::eq;
    use std::sync::Arc;

    fn resolver(registry: MockUserRegistry) -> UserDestinationResolver {
        UserDestinationResolver::new(Arc::new(registry), &MessagingConfig::default())
    }

    #[test]
    fn should_track_user_sessions() {
        let registry = DefaultUserRegistry::new();
        registry.connect("alice", "s1");
        registry.connect("alice", "s2");
        registry.connect("bob", "s3");

        assert_eq!(registry.sessions("alice"), vec!["s1", "s2"]);
        assert_eq!(registry.user_count(), 2);

        registry.disconnect("s1");
        registry.disconnect("s3");
        registry.disconnect("unknown");

        assert_eq!(registry.sessions("alice"), vec!["s2"]);
        assert!(registry.sessions("bob").is_empty());
        assert_eq!(registry.user_count(), 1);
    }

    #[test]
    fn should_move_reconnected_session() {
        let registry = DefaultUserRegistry::new();
        registry.connect("alice", "s1");
        registry.connect("bob", "s1");

        assert!(registry.sessions("alice").is_empty());
        assert_eq!(registry.sessions("bob"), vec!["s1"]);
    }

    #[test]
    fn should_handle_connection_messages() {
        let registry = DefaultUserRegistry::new();

        registry.handle_message(
            &Message::builder(SimpMessageType::Connect)
                .session_id("s1")
                .user("alice")
                .build(),
        );
        registry.handle_message(
            &Message::builder(SimpMessageType::Connect)
                .session_id("s2")
                .build(),
        );
        assert_eq!(registry.sessions("alice"), vec!["s1"]);

        registry.handle_message(
            &Message::builder(SimpMessageType::Disconnect)
                .session_id("s1")
                .build(),
        );
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn should_resolve_subscription() {
        let mut registry = MockUserRegistry::new();
        registry.expect_sessions().never();

        let result = resolver(registry).resolve_destination(
            &Message::builder(SimpMessageType::Subscribe)
                .session_id("s1")
                .subscription_id("1")
                .destination("/user/queue/reply")
                .build(),
        );

        assert_eq!(
            result,
            Some(UserDestinationResult {
                source_destination: "/user/queue/reply".to_string(),
                target_destinations: vec!["/queue/reply-users1".to_string()],
                subscribe_destination: "/user/queue/reply".to_string(),
                user: None,
            })
        );
    }

    #[test]
    fn should_resolve_message_to_all_user_sessions() {
        let mut registry = MockUserRegistry::new();
        registry
            .expect_sessions()
            .with(eq("alice"))
            .times(1)
            .returning(|_| vec!["s1".to_string(), "s2".to_string()]);

        let result = resolver(registry)
            .resolve_destination(
                &Message::builder(SimpMessageType::Message)
                    .destination("/user/alice/queue/reply")
                    .build(),
            )
            .unwrap();

        assert_eq!(
            result.target_destinations,
            vec!["/queue/reply-users1", "/queue/reply-users2"]
        );
        assert_eq!(result.subscribe_destination, "/user/queue/reply");
        assert_eq!(result.user.as_deref(), Some("alice"));
    }

    #[test]
    fn should_prefer_sending_session_for_own_user() {
        let mut registry = MockUserRegistry::new();
        registry.expect_sessions().never();

        let result = resolver(registry)
            .resolve_destination(
                &Message::builder(SimpMessageType::Message)
                    .destination("/user/alice/queue/reply")
                    .session_id("s2")
                    .user("alice")
                    .build(),
            )
            .unwrap();

        assert_eq!(result.target_destinations, vec!["/queue/reply-users2"]);
    }

    #[test]
    fn should_decode_user_names() {
        let mut registry = MockUserRegistry::new();
        registry
            .expect_sessions()
            .with(eq("dept/alice"))
            .returning(|_| vec!["s1".to_string()]);

        let result = resolver(registry)
            .resolve_destination(
                &Message::builder(SimpMessageType::Message)
                    .destination("/user/dept%2Falice/queue/reply")
                    .build(),
            )
            .unwrap();

        assert_eq!(result.target_destinations, vec!["/queue/reply-users1"]);
    }

    #[test]
    fn should_ignore_other_destinations() {
        let resolver = resolver(MockUserRegistry::new());

        for message in [
            Message::builder(SimpMessageType::Message)
                .destination("/topic/a")
                .build(),
            Message::builder(SimpMessageType::Message)
                .destination("/user/alice")
                .build(),
            Message::builder(SimpMessageType::Subscribe)
                .destination("/user/queue/reply")
                .build(),
            Message::builder(SimpMessageType::Heartbeat)
                .destination("/user/queue/reply")
                .build(),
            Message::builder(SimpMessageType::Message).build(),
        ] {
            assert_eq!(resolver.resolve_destination(&message), None);
        }
    }

    #[test]
    fn should_normalize_prefix() {
        let resolver = UserDestinationResolver::new(
            Arc::new(DefaultUserRegistry::new()),
            &MessagingConfig::default().with_user_destination_prefix("/private"),
        );

        assert_eq!(resolver.prefix(), "/private/");
    }
}
