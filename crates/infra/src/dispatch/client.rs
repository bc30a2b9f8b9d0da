//! HTTP delivery of queued payloads to the downstream endpoint.

use async_trait::async_trait;
use relaybox_core::{DispatchError, PayloadDispatcher};
use relaybox_domain::constants::MAX_FAILURE_BODY_CHARS;
use relaybox_domain::{DispatchConfig, QueuedRequest, RelayError, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tracing::{debug, instrument};

use crate::errors::HTTP_TIMEOUT_MESSAGE;
use crate::http::{HttpClient, RetryPolicy};

/// Delivers one payload per call with a single attempt.
///
/// Retrying is left to the next drain pass.
#[derive(Clone)]
pub struct HttpPayloadDispatcher {
    http: HttpClient,
    url: String,
    success_status: u16,
}

impl HttpPayloadDispatcher {
    /// # Errors
    /// Returns `RelayError::Config` if the HTTP client cannot be built.
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let http = HttpClient::builder().timeout(config.timeout).retry(RetryPolicy::single()).build()?;
        Ok(Self::with_http(http, config))
    }

    pub fn with_http(http: HttpClient, config: &DispatchConfig) -> Self {
        Self { http, url: config.url.clone(), success_status: config.success_status }
    }

    fn map_error(&self, err: RelayError) -> DispatchError {
        match err {
            RelayError::Network(message) if message == HTTP_TIMEOUT_MESSAGE => {
                DispatchError::Timeout(self.http.timeout())
            }
            other => DispatchError::from(other),
        }
    }
}

#[async_trait]
impl PayloadDispatcher for HttpPayloadDispatcher {
    #[instrument(skip(self, request, token), fields(request_id = request.id))]
    async fn dispatch(&self, request: &QueuedRequest, token: &str) -> std::result::Result<(), DispatchError> {
        let builder = self
            .http
            .request(Method::POST, &self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(request.payload.clone());

        let response = self.http.send(builder).await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();

        if status != self.success_status {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected { status, body: truncate_body(&body) });
        }

        debug!(status, "Payload accepted");
        Ok(())
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_FAILURE_BODY_CHARS {
        return body.to_string();
    }

    let mut truncated = body.chars().take(MAX_FAILURE_BODY_CHARS.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
