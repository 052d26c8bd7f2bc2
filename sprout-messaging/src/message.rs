//! Minimal message model carrying the headers needed for subscription handling and destination
//! resolution. Payloads are opaque bytes, since conversion is left to the transport layer.

use derive_more::Display;

/// Type of a simple messaging protocol message.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash)]
pub enum SimpMessageType {
    #[display(fmt = "CONNECT")]
    Connect,
    #[display(fmt = "CONNECT_ACK")]
    ConnectAck,
    #[display(fmt = "MESSAGE")]
    Message,
    #[display(fmt = "SUBSCRIBE")]
    Subscribe,
    #[display(fmt = "UNSUBSCRIBE")]
    Unsubscribe,
    #[display(fmt = "HEARTBEAT")]
    Heartbeat,
    #[display(fmt = "DISCONNECT")]
    Disconnect,
    #[display(fmt = "DISCONNECT_ACK")]
    DisconnectAck,
    #[display(fmt = "OTHER")]
    Other,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageHeaders {
    pub session_id: Option<String>,
    pub subscription_id: Option<String>,
    pub destination: Option<String>,
    /// Name of the authenticated user owning the session, if any.
    pub user: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub message_type: SimpMessageType,
    pub headers: MessageHeaders,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn builder(message_type: SimpMessageType) -> MessageBuilder {
        MessageBuilder {
            message: Message {
                message_type,
                headers: Default::default(),
                payload: vec![],
            },
        }
    }

    #[inline]
    pub fn session_id(&self) -> Option<&str> {
        self.headers.session_id.as_deref()
    }

    #[inline]
    pub fn subscription_id(&self) -> Option<&str> {
        self.headers.subscription_id.as_deref()
    }

    #[inline]
    pub fn destination(&self) -> Option<&str> {
        self.headers.destination.as_deref()
    }

    #[inline]
    pub fn user(&self) -> Option<&str> {
        self.headers.user.as_deref()
    }
}

pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.message.headers.session_id = Some(session_id.into());
        self
    }

    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.message.headers.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.message.headers.destination = Some(destination.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.message.headers.user = Some(user.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.message.payload = payload.into();
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}
