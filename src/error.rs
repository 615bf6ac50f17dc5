use crate::instance_lock::InstanceLockError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum NotifierError {
    #[error("Option '{0}' not found")]
    MissingOption(&'static str),

    #[error("Failed to connect to Home Assistant: {0}")]
    ConnectionFailed(String),

    #[error("Authentication rejected: {0}")]
    AuthenticationFailed(String),

    #[error("Unexpected message from Home Assistant: {0}")]
    Protocol(String),

    #[error("Service call {domain}.{service} failed: {message}")]
    ServiceCallFailed {
        domain: String,
        service: String,
        message: String,
    },

    #[error("Command failed ({code}): {message}")]
    CommandFailed { code: String, message: String },

    #[error("Connection to Home Assistant closed")]
    ConnectionClosed,

    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),

    #[error(transparent)]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
