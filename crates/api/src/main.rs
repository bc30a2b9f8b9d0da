//! Relaybox - durable store-and-forward relay
//!
//! Startup order: `.env` (dev only), configuration, logging, store, initial
//! login, background loops, ingress. `Ctrl-C` or `SIGTERM` drains the ingress
//! server first, then stops the loops. A signal during the initial login
//! ends the process without starting anything.

use std::sync::Arc;

use anyhow::Context;
use relaybox_api::{router, serve, AppContext, RelayRuntime};
use relaybox_infra::config;
use relaybox_infra::observability::init_logging;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = config::load_dotenv();
    let config = config::load().context("failed to load configuration")?;
    init_logging(&config.logging).context("failed to initialise logging")?;

    if let Some(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        policy = %config.dispatch.strategy,
        "Relaybox starting"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let http_addr = config.server.http_addr;
    let (context, worker) = match AppContext::new(config, &shutdown).await {
        Ok(wired) => wired,
        Err(_) if shutdown.is_cancelled() => {
            info!("Startup interrupted before the relay came up");
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to initialise relay"),
    };
    let context = Arc::new(context);

    let runtime =
        RelayRuntime::start(&context.credentials, worker).context("failed to start background loops")?;

    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind ingress on {http_addr}"))?;

    let drained = shutdown.clone();
    let served = serve(listener, router(Arc::clone(&context)), async move { drained.cancelled().await }).await;
    if let Err(err) = &served {
        error!(error = %err, "Ingress server stopped with error");
    }

    runtime.shutdown().await.context("background loops did not stop cleanly")?;
    served.context("ingress server failed")?;

    info!("Relaybox stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
