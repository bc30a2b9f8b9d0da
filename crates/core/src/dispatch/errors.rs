//! Delivery error types
//!
//! Every variant is transient from the queue's point of view: the request
//! stays stored and the next trigger retries it. The category only labels
//! log records and metrics.

use std::time::Duration;

use relaybox_domain::RelayError;
use thiserror::Error;

/// Categories of delivery errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorCategory {
    /// Endpoint answered with something other than the success status
    Rejected,
    /// Connection or transport failure
    Network,
    Timeout,
    /// The relay is shutting down
    Cancelled,
    /// Request could not be built (bad URL, bad header value)
    Config,
}

impl DispatchErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
        }
    }
}

/// A failed delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Endpoint rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Delivery cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// Get the error category for this error
    pub const fn category(&self) -> DispatchErrorCategory {
        match self {
            Self::Rejected { .. } => DispatchErrorCategory::Rejected,
            Self::Network(_) => DispatchErrorCategory::Network,
            Self::Timeout(_) => DispatchErrorCategory::Timeout,
            Self::Cancelled => DispatchErrorCategory::Cancelled,
            Self::Config(_) => DispatchErrorCategory::Config,
        }
    }

    /// Status code of a rejected response, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convert from RelayError to DispatchError
impl From<RelayError> for DispatchError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Network(message) | RelayError::Auth(message) => Self::Network(message),
            RelayError::DispatcherStopped => Self::Cancelled,
            other => Self::Config(other.to_string()),
        }
    }
}
