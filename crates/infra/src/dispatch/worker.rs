//! Dispatch scheduler loop with explicit lifecycle management.
//!
//! The worker is the only caller of [`DispatchService::drain`]. It wakes on
//! the poll timer or on a "dispatch now" signal from the enqueue path and
//! runs one pass per wake, so at most one pass is ever active. Wakes raised
//! during a pass stay pending in the channel and trigger one more pass.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use relaybox_core::{DispatchService, DispatchWakeups};
//! # use relaybox_infra::dispatch::{DispatchWorker, DispatchWorkerConfig};
//! # use relaybox_infra::observability::DispatchMetrics;
//! # use tokio_util::sync::CancellationToken;
//! # async fn example(service: Arc<DispatchService>, wakeups: DispatchWakeups) -> relaybox_domain::Result<()> {
//! let root = CancellationToken::new();
//! let mut worker = DispatchWorker::new(
//!     service,
//!     wakeups,
//!     DispatchWorkerConfig::default(),
//!     Arc::new(DispatchMetrics::new()),
//! );
//! worker.start(&root)?;
//! // ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use relaybox_core::{DispatchService, DispatchWakeups, DrainOutcome, DrainReport, DrainTrigger};
use relaybox_domain::constants::{DEFAULT_POLL_INTERVAL, WORKER_JOIN_TIMEOUT};
use relaybox_domain::{DispatchConfig, RelayError, Result};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::observability::{DispatchMetrics, MetricsResult};

/// Dispatch worker configuration
#[derive(Debug, Clone)]
pub struct DispatchWorkerConfig {
    /// Interval between timer-driven drain passes
    pub poll_interval: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for DispatchWorkerConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL, join_timeout: WORKER_JOIN_TIMEOUT }
    }
}

impl From<&DispatchConfig> for DispatchWorkerConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self { poll_interval: config.poll_interval, ..Self::default() }
    }
}

/// Owns the dispatch loop task.
///
/// A worker runs at most once: the wake receiver moves into the task on
/// `start` and is dropped when the task ends, after which enqueue callers get
/// `RelayError::DispatcherStopped`.
pub struct DispatchWorker {
    service: Arc<DispatchService>,
    wakeups: Option<DispatchWakeups>,
    config: DispatchWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    metrics: Arc<DispatchMetrics>,
}

impl DispatchWorker {
    pub fn new(
        service: Arc<DispatchService>,
        wakeups: DispatchWakeups,
        config: DispatchWorkerConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            service,
            wakeups: Some(wakeups),
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
            metrics,
        }
    }

    /// Spawn the dispatch loop under a child of `parent`.
    ///
    /// # Errors
    /// - `RelayError::Config` for a zero poll interval.
    /// - `RelayError::Internal` when the worker is running or has already run.
    #[instrument(skip(self, parent))]
    pub fn start(&mut self, parent: &CancellationToken) -> Result<()> {
        if self.config.poll_interval.is_zero() {
            return Err(RelayError::Config("dispatch poll interval must be greater than zero".into()));
        }
        if self.is_running() {
            return Err(RelayError::Internal("dispatch worker already running".into()));
        }
        let wakeups = self
            .wakeups
            .take()
            .ok_or_else(|| RelayError::Internal("dispatch worker cannot be restarted".into()))?;

        self.cancellation = parent.child_token();

        let service = Arc::clone(&self.service);
        let poll_interval = self.config.poll_interval;
        let cancel = self.cancellation.clone();
        let metrics = Arc::clone(&self.metrics);

        let handle = tokio::spawn(async move {
            Self::run_loop(service, wakeups, poll_interval, cancel, metrics).await;
        });

        self.task_handle = Some(handle);
        info!(poll_interval = ?poll_interval, policy = %self.service.policy(), "Dispatch worker started");
        log_metric(self.metrics.record_worker_start(), "dispatch.worker_start");

        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    ///
    /// # Errors
    /// `RelayError::Internal` when the worker is not running, the task
    /// panicked, or it did not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(RelayError::Internal("dispatch worker not running".into()));
        };

        info!("Stopping dispatch worker");
        self.cancellation.cancel();

        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Dispatch worker task panicked: {}", e);
                return Err(RelayError::Internal("dispatch worker task panicked".into()));
            }
            Err(_) => {
                warn!("Dispatch worker did not complete within timeout");
                return Err(RelayError::Internal("dispatch worker join timed out".into()));
            }
        }

        info!("Dispatch worker stopped");
        Ok(())
    }

    /// Returns true while a loop task is owned by this worker.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn run_loop(
        service: Arc<DispatchService>,
        mut wakeups: DispatchWakeups,
        poll_interval: Duration,
        cancel: CancellationToken,
        metrics: Arc<DispatchMetrics>,
    ) {
        let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut signals_open = true;

        loop {
            let trigger = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                woke = wakeups.recv(), if signals_open => match woke {
                    Some(()) => DrainTrigger::Signal,
                    None => {
                        debug!("All dispatch signals dropped; continuing on timer only");
                        signals_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => DrainTrigger::Timer,
            };

            let started = Instant::now();
            let report = service.drain(&cancel).await;
            let elapsed = started.elapsed();

            log_report(trigger, &report, elapsed);
            log_metric(metrics.record_pass(trigger, &report, elapsed), "dispatch.pass");
        }

        debug!("Dispatch loop cancelled");
    }
}

fn log_report(trigger: DrainTrigger, report: &DrainReport, elapsed: Duration) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match report.outcome {
        DrainOutcome::Completed if report.loaded == 0 => {}
        DrainOutcome::Completed => info!(
            %trigger,
            loaded = report.loaded,
            delivered = report.delivered,
            failed = report.failed,
            delete_failures = report.delete_failures,
            elapsed_ms,
            "Drain pass completed"
        ),
        DrainOutcome::Halted { request_id } => warn!(
            %trigger,
            request_id,
            delivered = report.delivered,
            skipped = report.skipped(),
            elapsed_ms,
            "Drain pass halted on failed delivery"
        ),
        DrainOutcome::Cancelled => debug!(%trigger, delivered = report.delivered, "Drain pass cancelled"),
        DrainOutcome::LoadFailed => warn!(%trigger, "Drain pass skipped; pending requests unavailable"),
    }
}

fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        warn!(metric = metric, error = ?err, "Failed to record dispatch metric");
    }
}

impl Drop for DispatchWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("DispatchWorker dropped while running; cancelling loop");
            self.cancellation.cancel();
        }
    }
}
