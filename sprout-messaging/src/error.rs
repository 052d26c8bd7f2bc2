use crate::message::SimpMessageType;
use thiserror::Error;

#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum MessagingError {
    #[error("Expected {expected} message, got: {actual}")]
    UnexpectedMessageType {
        expected: SimpMessageType,
        actual: SimpMessageType,
    },
}
