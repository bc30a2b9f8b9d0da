//! Port interfaces for dispatch

use async_trait::async_trait;
use relaybox_domain::QueuedRequest;

use super::errors::DispatchError;

/// Delivers one queued request downstream.
#[async_trait]
pub trait PayloadDispatcher: Send + Sync {
    /// Send `request` authorized with `token`. Any outcome other than the
    /// configured success status is an error.
    async fn dispatch(&self, request: &QueuedRequest, token: &str) -> Result<(), DispatchError>;
}

/// Wait-free access to the current bearer token.
pub trait TokenSource: Send + Sync {
    /// Current token value. Must not block on network I/O.
    fn current_token(&self) -> String;
}
