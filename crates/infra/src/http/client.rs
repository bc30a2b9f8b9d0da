//! Outbound HTTP client shared by the login exchange and the dispatcher.
//!
//! Every request carries the relaybox user agent plus any default headers
//! the owner configured. Whether a failed attempt is repeated is decided by
//! a [`RetryPolicy`]; the dispatcher uses a single attempt, the login
//! exchange may retry.

use std::time::Duration;

use relaybox_domain::RelayError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("relaybox/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF_DOUBLINGS: u32 = 8;

/// Attempt budget for one logical request.
///
/// Only transport failures and 5xx responses are retried. The wait before
/// attempt `n` is `base_backoff * 2^(n - 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub const fn single() -> Self {
        Self { max_attempts: 1, base_backoff: DEFAULT_RETRY_BACKOFF }
    }

    /// Up to `max_attempts` attempts (at least one) with the default backoff.
    pub fn attempts(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::single() }
    }

    fn permits_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(2).min(MAX_BACKOFF_DOUBLINGS);
        self.base_backoff.saturating_mul(1 << doublings)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

/// reqwest client plus the relay's timeout and retry rules.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Per-request timeout
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send `builder`, repeating it as the retry policy allows.
    ///
    /// Any response that is not retried is returned as is, whatever its
    /// status; status handling belongs to the caller.
    ///
    /// # Errors
    /// - `RelayError::Network` for transport failures once retries run out.
    /// - `RelayError::Internal` if the request cannot be rebuilt for a retry.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, RelayError> {
        let mut attempt = 1;

        loop {
            let request = rebuild(&builder)?;
            let method = request.method().clone();
            let url = request.url().clone();

            let outcome = self.client.execute(request).await;
            let transient = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(err) => is_transient(err),
            };

            if !transient || !self.retry.permits_after(attempt) {
                return outcome.map_err(|err| RelayError::from(InfraError::from(err)));
            }

            match &outcome {
                Ok(response) => {
                    debug!(attempt, %method, %url, status = %response.status(), "Retrying after server error");
                }
                Err(err) => debug!(attempt, %method, %url, error = %err, "Retrying after transport error"),
            }

            attempt += 1;
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn rebuild(builder: &RequestBuilder) -> Result<Request, RelayError> {
    builder
        .try_clone()
        .ok_or_else(|| RelayError::Internal("streaming request bodies cannot be retried".into()))?
        .build()
        .map_err(|err| RelayError::from(InfraError::from(err)))
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    retry: RetryPolicy,
    headers: HeaderMap,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, retry: RetryPolicy::single(), headers: HeaderMap::new() }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add a header sent with every request.
    ///
    /// # Errors
    /// `RelayError::Config` if `value` is not a valid header value.
    pub fn default_header(mut self, name: HeaderName, value: &str) -> Result<Self, RelayError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| RelayError::Config(format!("invalid value for header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// # Errors
    /// `RelayError::Config` if the TLS backend cannot be initialised.
    pub fn build(self) -> Result<HttpClient, RelayError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(self.headers)
            .no_proxy()
            .build()
            .map_err(|err| RelayError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, timeout: self.timeout, retry: self.retry })
    }
}
