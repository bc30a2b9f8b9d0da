//! Mapping of relay errors onto ingress responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relaybox_domain::RelayError;
use tracing::error;

/// Error returned by ingress handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or wrong `token` query parameter
    Unauthorized,
    Relay(RelayError),
}

impl From<RelayError> for ApiError {
    fn from(value: RelayError) -> Self {
        Self::Relay(value)
    }
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Relay(err) if err.is_validation() => StatusCode::BAD_REQUEST,
            Self::Relay(RelayError::DispatcherStopped) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::Relay(err) if status.is_server_error() => {
                error!(error = %err, "Ingress request failed");
                status.canonical_reason().unwrap_or("Error").to_string()
            }
            Self::Relay(err) => err.to_string(),
        };
        (status, body).into_response()
    }
}
