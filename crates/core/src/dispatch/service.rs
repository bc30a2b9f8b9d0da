//! Drain pass - ordered delivery of everything currently queued

use std::fmt;
use std::sync::Arc;

use relaybox_domain::{FailurePolicy, QueuedRequest};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use super::errors::DispatchError;
use super::ports::{PayloadDispatcher, TokenSource};
use crate::queue::RequestStore;

/// What woke the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainTrigger {
    Timer,
    Signal,
}

impl DrainTrigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Signal => "signal",
        }
    }
}

impl fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a drain pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every loaded request was attempted.
    Completed,
    /// Stop-on-error abandoned the pass at this request.
    Halted { request_id: i64 },
    /// Cancellation fired before the pass finished.
    Cancelled,
    /// The pending requests could not be loaded.
    LoadFailed,
}

/// Summary of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests loaded from the store
    pub loaded: usize,
    /// Requests the endpoint accepted, including those whose delete failed
    pub delivered: usize,
    /// Delivery attempts that failed
    pub failed: usize,
    /// Accepted requests that could not be removed from the store
    pub delete_failures: usize,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    const fn empty() -> Self {
        Self {
            loaded: 0,
            delivered: 0,
            failed: 0,
            delete_failures: 0,
            outcome: DrainOutcome::Completed,
        }
    }

    /// Requests left unattempted by an early exit.
    pub const fn skipped(&self) -> usize {
        self.loaded.saturating_sub(self.delivered).saturating_sub(self.failed)
    }
}

/// Runs drain passes: load, deliver in order, delete on success.
///
/// Only the dispatch loop may call [`DispatchService::drain`]; running two
/// passes concurrently would break ordering.
pub struct DispatchService {
    store: Arc<dyn RequestStore>,
    dispatcher: Arc<dyn PayloadDispatcher>,
    tokens: Arc<dyn TokenSource>,
    policy: FailurePolicy,
}

impl DispatchService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        dispatcher: Arc<dyn PayloadDispatcher>,
        tokens: Arc<dyn TokenSource>,
        policy: FailurePolicy,
    ) -> Self {
        Self { store, dispatcher, tokens, policy }
    }

    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Perform one drain pass.
    ///
    /// Requests are attempted strictly in `created_on` order. A failed
    /// request is left untouched in the store; with stop-on-error the pass
    /// ends there, with continue-on-error it moves on.
    ///
    /// A request the endpoint accepted but that could not be deleted stays
    /// queued and is delivered again on a later pass. Delivery is
    /// at-least-once.
    ///
    /// `cancel` is checked before each request and raced against the
    /// in-flight delivery; a cancelled delivery leaves its request queued.
    #[instrument(skip(self, cancel), fields(policy = %self.policy))]
    pub async fn drain(&self, cancel: &CancellationToken) -> DrainReport {
        let mut report = DrainReport::empty();

        let pending = match self.store.load_pending().await {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "Failed to load pending requests");
                report.outcome = DrainOutcome::LoadFailed;
                return report;
            }
        };

        report.loaded = pending.len();
        if pending.is_empty() {
            debug!("No pending requests");
            return report;
        }

        debug!(count = pending.len(), "Draining pending requests");

        for request in &pending {
            if cancel.is_cancelled() {
                report.outcome = DrainOutcome::Cancelled;
                break;
            }

            match self.deliver(request, cancel).await {
                Ok(()) => {
                    report.delivered += 1;
                    self.remove_delivered(request, &mut report).await;
                }
                Err(DispatchError::Cancelled) => {
                    debug!(request_id = request.id, "Delivery abandoned on shutdown");
                    report.outcome = DrainOutcome::Cancelled;
                    break;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        request_id = request.id,
                        category = err.category().as_str(),
                        error = %err,
                        "Delivery failed"
                    );
                    if self.policy == FailurePolicy::StopOnError {
                        report.outcome = DrainOutcome::Halted { request_id: request.id };
                        break;
                    }
                }
            }
        }

        report
    }

    async fn deliver(
        &self,
        request: &QueuedRequest,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let token = self.tokens.current_token();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = self.dispatcher.dispatch(request, &token) => result,
        }
    }

    async fn remove_delivered(&self, request: &QueuedRequest, report: &mut DrainReport) {
        match self.store.delete_by_id(request.id).await {
            Ok(true) => debug!(request_id = request.id, "Delivered request removed"),
            Ok(false) => debug!(request_id = request.id, "Delivered request was already gone"),
            Err(err) => {
                report.delete_failures += 1;
                error!(
                    request_id = request.id,
                    error = %err,
                    "Delivered request could not be removed and will be redelivered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::test_support::{MemoryStore, RecordingDispatcher, StaticToken};

    fn service(
        store: &Arc<MemoryStore>,
        dispatcher: &Arc<RecordingDispatcher>,
        tokens: &Arc<StaticToken>,
        policy: FailurePolicy,
    ) -> DispatchService {
        DispatchService::new(store.clone(), dispatcher.clone(), tokens.clone(), policy)
    }

    #[tokio::test]
    async fn test_delivers_in_created_order() {
        let store = MemoryStore::new();
        store.seed(&["FOO", "BAR", "BAZ"]).await;
        let dispatcher = RecordingDispatcher::new();
        let tokens = StaticToken::new("tok");

        let report = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError)
            .drain(&CancellationToken::new())
            .await;

        assert_eq!(dispatcher.attempts(), vec!["FOO", "BAR", "BAZ"]);
        assert_eq!(report.loaded, 3);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.outcome, DrainOutcome::Completed);
        assert!(store.payloads().await.is_empty());
    }

    #[tokio::test]
    async fn test_ties_broken_by_insertion_order() {
        let store = MemoryStore::new();
        let created_on = crate::test_support::at(10);
        for payload in ["first", "second", "third"] {
            store
                .insert(&relaybox_domain::NewRequest { payload: payload.into(), created_on })
                .await
                .unwrap();
        }
        let dispatcher = RecordingDispatcher::new();
        let tokens = StaticToken::new("tok");

        service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError)
            .drain(&CancellationToken::new())
            .await;

        assert_eq!(dispatcher.attempts(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_empty_queue_is_not_an_error() {
        let store = MemoryStore::new();
        let dispatcher = RecordingDispatcher::new();
        let tokens = StaticToken::new("tok");

        let report = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError)
            .drain(&CancellationToken::new())
            .await;

        assert_eq!(report.loaded, 0);
        assert_eq!(report.outcome, DrainOutcome::Completed);
        assert!(dispatcher.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_stop_on_error_blocks_later_items() {
        let store = MemoryStore::new();
        store.seed(&["A", "B", "C"]).await;
        let dispatcher = RecordingDispatcher::new();
        dispatcher.fail_all(true);
        let tokens = StaticToken::new("tok");
        let svc = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError);

        let report = svc.drain(&CancellationToken::new()).await;

        assert_eq!(dispatcher.attempts(), vec!["A"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped(), 2);
        assert!(matches!(report.outcome, DrainOutcome::Halted { .. }));
        assert_eq!(store.payloads().await, vec!["A", "B", "C"]);

        dispatcher.fail_all(false);
        let report = svc.drain(&CancellationToken::new()).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(dispatcher.attempts(), vec!["A", "A", "B", "C"]);
        assert!(store.payloads().await.is_empty());
    }

    #[tokio::test]
    async fn test_continue_on_error_skips_past_failures() {
        let store = MemoryStore::new();
        store.seed(&["A", "B"]).await;
        let dispatcher = RecordingDispatcher::new();
        dispatcher.fail_payload("A");
        let tokens = StaticToken::new("tok");

        let report = service(&store, &dispatcher, &tokens, FailurePolicy::ContinueOnError)
            .drain(&CancellationToken::new())
            .await;

        assert_eq!(dispatcher.attempts(), vec!["A", "B"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.outcome, DrainOutcome::Completed);
        assert_eq!(store.payloads().await, vec!["A"]);
    }

    #[tokio::test]
    async fn test_failed_then_succeeding_request_removed_once() {
        let store = MemoryStore::new();
        store.seed(&["only"]).await;
        let dispatcher = RecordingDispatcher::new();
        dispatcher.script(Err(DispatchError::Network("connection reset".into())));
        let tokens = StaticToken::new("tok");
        let svc = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError);

        let first = svc.drain(&CancellationToken::new()).await;
        assert_eq!(first.failed, 1);
        assert_eq!(store.pending_count().await.unwrap(), 1);

        let second = svc.drain(&CancellationToken::new()).await;
        assert_eq!(second.delivered, 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);

        let third = svc.drain(&CancellationToken::new()).await;
        assert_eq!(third.loaded, 0);
        assert_eq!(dispatcher.attempts(), vec!["only", "only"]);
    }

    #[tokio::test]
    async fn test_uses_latest_token_per_pass() {
        let store = MemoryStore::new();
        store.seed(&["A"]).await;
        let dispatcher = RecordingDispatcher::new();
        dispatcher.fail_all(true);
        let tokens = StaticToken::new("first");
        let svc = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError);

        svc.drain(&CancellationToken::new()).await;
        tokens.set("refreshed");
        dispatcher.fail_all(false);
        svc.drain(&CancellationToken::new()).await;

        assert_eq!(dispatcher.tokens(), vec!["first", "refreshed"]);
    }

    #[tokio::test]
    async fn test_load_failure_ends_pass() {
        let store = MemoryStore::new();
        store.seed(&["A"]).await;
        store.fail_load.store(true, Ordering::SeqCst);
        let dispatcher = RecordingDispatcher::new();
        let tokens = StaticToken::new("tok");

        let report = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError)
            .drain(&CancellationToken::new())
            .await;

        assert_eq!(report.outcome, DrainOutcome::LoadFailed);
        assert!(dispatcher.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_counts_and_continues() {
        let store = MemoryStore::new();
        store.seed(&["A", "B"]).await;
        store.fail_delete.store(true, Ordering::SeqCst);
        let dispatcher = RecordingDispatcher::new();
        let tokens = StaticToken::new("tok");

        let report = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError)
            .drain(&CancellationToken::new())
            .await;

        assert_eq!(dispatcher.attempts(), vec!["A", "B"]);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.delete_failures, 2);
        assert_eq!(report.outcome, DrainOutcome::Completed);

        store.fail_delete.store(false, Ordering::SeqCst);
        assert_eq!(store.payloads().await, vec!["A", "B"], "undeleted requests are redelivered later");
    }

    #[tokio::test]
    async fn test_cancelled_before_pass_leaves_queue_untouched() {
        let store = MemoryStore::new();
        store.seed(&["A", "B"]).await;
        let dispatcher = RecordingDispatcher::new();
        let tokens = StaticToken::new("tok");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = service(&store, &dispatcher, &tokens, FailurePolicy::StopOnError)
            .drain(&cancel)
            .await;

        assert_eq!(report.outcome, DrainOutcome::Cancelled);
        assert!(dispatcher.attempts().is_empty());
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }

    struct HangingDispatcher;

    #[async_trait]
    impl PayloadDispatcher for HangingDispatcher {
        async fn dispatch(&self, _: &QueuedRequest, _: &str) -> Result<(), DispatchError> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_delivery() {
        let store = MemoryStore::new();
        store.seed(&["A"]).await;
        let tokens = StaticToken::new("tok");
        let svc = DispatchService::new(
            store.clone(),
            Arc::new(HangingDispatcher),
            tokens,
            FailurePolicy::StopOnError,
        );
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(2), svc.drain(&cancel))
            .await
            .expect("drain should observe cancellation");

        assert_eq!(report.outcome, DrainOutcome::Cancelled);
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }
}
