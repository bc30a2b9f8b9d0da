//! Ingress handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::context::AppContext;

#[derive(Debug, Deserialize)]
pub(super) struct IngestQuery {
    token: Option<String>,
}

/// `GET /status`
pub(super) async fn status() -> &'static str {
    "OK"
}

/// `GET /status/queue`
pub(super) async fn queue_status(State(context): State<Arc<AppContext>>) -> impl IntoResponse {
    match context.queue.pending_count().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(json!({ "pending": pending, "metrics": context.metrics.snapshot() })),
        ),
        Err(err) => {
            warn!(error = %err, "Queue status unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "store unavailable" })))
        }
    }
}

/// `POST /?token=<secret>`
///
/// Returns once the payload is stored and the dispatch loop notified.
pub(super) async fn ingest(
    State(context): State<Arc<AppContext>>,
    Query(query): Query<IngestQuery>,
    body: String,
) -> Result<&'static str, ApiError> {
    let authorized = query.token.as_deref().is_some_and(|token| context.ingress_secret.verify(token));
    if !authorized {
        warn!(token_present = query.token.is_some(), "Rejected ingress request with bad token");
        return Err(ApiError::Unauthorized);
    }

    let stored = context.queue.queue_request(body).await?;
    debug!(request_id = stored.id, "Ingress request queued");
    Ok("OK")
}
