//! Ingress HTTP server
//!
//! - `GET /status` liveness
//! - `GET /status/queue` pending count and dispatch metrics
//! - `POST /?token=<secret>` queue the raw body for delivery

mod auth;
mod error;
mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use relaybox_domain::{RelayError, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use auth::IngressSecret;
pub use error::ApiError;

use crate::context::AppContext;

/// Build the ingress router.
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(handlers::ingest))
        .route("/status", get(handlers::status))
        .route("/status/queue", get(handlers::queue_status))
        .with_state(context)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// # Errors
/// `RelayError::Network` if the server fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Ingress listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RelayError::Network(format!("ingress server error: {e}")))
}
