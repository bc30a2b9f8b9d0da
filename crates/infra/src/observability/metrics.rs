//! Dispatch metrics
//!
//! Lock-free counters fed by the dispatch worker after every drain pass.
//! Relaxed ordering throughout: counters are independent and only read for
//! reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use relaybox_core::{DrainOutcome, DrainReport, DrainTrigger};
use serde::Serialize;

use super::{MetricsError, MetricsResult};

/// Counters describing dispatch activity since start-up.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    worker_starts: AtomicU64,
    timer_passes: AtomicU64,
    signal_passes: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    delete_failures: AtomicU64,
    load_failures: AtomicU64,
    halted_passes: AtomicU64,
    cancelled_passes: AtomicU64,
    last_pass_micros: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchMetricsSnapshot {
    pub worker_starts: u64,
    pub timer_passes: u64,
    pub signal_passes: u64,
    pub delivered: u64,
    pub failed: u64,
    pub delete_failures: u64,
    pub load_failures: u64,
    pub halted_passes: u64,
    pub cancelled_passes: u64,
    pub last_pass_ms: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_worker_start(&self) -> MetricsResult<()> {
        add(&self.worker_starts, 1, "dispatch.worker_starts")
    }

    /// Record one finished drain pass.
    pub fn record_pass(
        &self,
        trigger: DrainTrigger,
        report: &DrainReport,
        elapsed: Duration,
    ) -> MetricsResult<()> {
        match trigger {
            DrainTrigger::Timer => add(&self.timer_passes, 1, "dispatch.timer_passes")?,
            DrainTrigger::Signal => add(&self.signal_passes, 1, "dispatch.signal_passes")?,
        }

        add(&self.delivered, report.delivered as u64, "dispatch.delivered")?;
        add(&self.failed, report.failed as u64, "dispatch.failed")?;
        add(&self.delete_failures, report.delete_failures as u64, "dispatch.delete_failures")?;

        match report.outcome {
            DrainOutcome::Completed => {}
            DrainOutcome::Halted { .. } => add(&self.halted_passes, 1, "dispatch.halted_passes")?,
            DrainOutcome::Cancelled => {
                add(&self.cancelled_passes, 1, "dispatch.cancelled_passes")?;
            }
            DrainOutcome::LoadFailed => add(&self.load_failures, 1, "dispatch.load_failures")?,
        }

        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_pass_micros.store(micros, Ordering::Relaxed);
        Ok(())
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            worker_starts: self.worker_starts.load(Ordering::Relaxed),
            timer_passes: self.timer_passes.load(Ordering::Relaxed),
            signal_passes: self.signal_passes.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            halted_passes: self.halted_passes.load(Ordering::Relaxed),
            cancelled_passes: self.cancelled_passes.load(Ordering::Relaxed),
            last_pass_ms: self.last_pass_micros.load(Ordering::Relaxed) / 1_000,
        }
    }
}

fn add(counter: &AtomicU64, amount: u64, metric: &'static str) -> MetricsResult<()> {
    if amount == 0 {
        return Ok(());
    }
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| current.checked_add(amount))
        .map(|_| ())
        .map_err(|_| MetricsError::Overflow { metric })
}
