//! Error types used throughout the relay

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for relaybox
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RelayError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Payload was empty or whitespace-only; nothing was stored.
    #[error("Payload must not be empty")]
    EmptyPayload,

    /// The dispatch loop is gone and can no longer be woken.
    #[error("Dispatcher is not running")]
    DispatcherStopped,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the error was caused by caller input rather than the relay.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyPayload | Self::InvalidInput(_))
    }
}

/// Result type alias for relaybox operations
pub type Result<T> = std::result::Result<T, RelayError>;
