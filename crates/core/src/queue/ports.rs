//! Port interfaces for the request queue

use async_trait::async_trait;
use relaybox_domain::{NewRequest, QueuedRequest, Result};

/// Durable, ordered store of queued payloads.
///
/// Implementations must be safe to share between the enqueue path and the
/// dispatch loop; every call is atomic with respect to the row it touches.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persist a request and return it with its store-assigned id.
    async fn insert(&self, request: &NewRequest) -> Result<QueuedRequest>;

    /// All pending requests, oldest `created_on` first, ties in insertion
    /// order. Empty when nothing is queued.
    async fn load_pending(&self) -> Result<Vec<QueuedRequest>>;

    /// Remove a request. Returns `Ok(false)` when no such row exists.
    async fn delete_by_id(&self, id: i64) -> Result<bool>;

    /// Number of pending requests
    async fn pending_count(&self) -> Result<u64>;
}
