//! Enqueue service - validation, persistence and the dispatch wake hand-off

use std::sync::Arc;

use relaybox_domain::{NewRequest, QueuedRequest, RelayError, Result};
use tracing::{debug, instrument, warn};

use super::ports::RequestStore;
use crate::dispatch::{DispatchSignal, WakeOutcome};

/// Accepts payloads from the ingress side.
///
/// A call returns once the payload is stored and the dispatch loop has been
/// told about it; it never waits for delivery.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn RequestStore>,
    signal: DispatchSignal,
}

impl QueueService {
    pub fn new(store: Arc<dyn RequestStore>, signal: DispatchSignal) -> Self {
        Self { store, signal }
    }

    /// Queue `payload` stamped with the current time.
    ///
    /// # Errors
    /// See [`QueueService::enqueue`].
    pub async fn queue_request(&self, payload: impl Into<String> + Send) -> Result<QueuedRequest> {
        self.enqueue(NewRequest::now(payload)).await
    }

    /// Validate, persist and signal.
    ///
    /// # Errors
    /// - `RelayError::EmptyPayload` for blank payloads; the store is not
    ///   touched.
    /// - Store errors from the insert.
    /// - `RelayError::DispatcherStopped` when the dispatch loop is gone. The
    ///   request is already persisted at that point and will be picked up by
    ///   the next running loop.
    #[instrument(skip(self, request), fields(payload_len = request.payload.len()))]
    pub async fn enqueue(&self, request: NewRequest) -> Result<QueuedRequest> {
        if request.is_blank() {
            return Err(RelayError::EmptyPayload);
        }

        let stored = self.store.insert(&request).await?;

        match self.signal.notify() {
            Ok(WakeOutcome::Delivered) => {
                debug!(request_id = stored.id, "Queued request, dispatch loop woken");
            }
            Ok(WakeOutcome::Coalesced) => {
                debug!(request_id = stored.id, "Queued request, wake already pending");
            }
            Err(err) => {
                warn!(request_id = stored.id, error = %err, "Queued request but dispatcher is stopped");
                return Err(err);
            }
        }

        Ok(stored)
    }

    /// Number of requests still waiting for delivery
    pub async fn pending_count(&self) -> Result<u64> {
        self.store.pending_count().await
    }
}
