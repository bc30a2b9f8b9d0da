//! Structured logging setup using tracing.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.

use relaybox_domain::{LogFormat, LoggingConfig, RelayError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// # Errors
/// Returns `RelayError::Config` for an unparsable level, or when a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .try_init(),
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init()
        }
    };

    installed.map_err(|e| RelayError::Config(format!("Failed to install log subscriber: {e}")))?;

    tracing::info!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| RelayError::Config(format!("Invalid log level '{level}': {e}")))
}
