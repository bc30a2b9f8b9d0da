//! Observability infrastructure: logging setup and dispatch metrics
//!
//! Metrics are lock-free atomic counters. Every record method returns
//! `MetricsResult<()>`; callers log a failed record and carry on, a metric
//! never blocks dispatch.
//!
//! ```rust
//! use relaybox_infra::observability::DispatchMetrics;
//!
//! let metrics = DispatchMetrics::new();
//! if let Err(e) = metrics.record_worker_start() {
//!     tracing::warn!("Failed to record metric: {}", e);
//! }
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A counter reached `u64::MAX`; the increment was dropped.
    #[error("Counter overflow for metric '{metric}'")]
    Overflow {
        /// Metric name
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
