//! Login exchange against the downstream service.
//!
//! `POST <login url>` with `{"username", "password"}` and, when configured,
//! an `x-app` header. A 200 response carries the bearer token either as
//! `result.token` or as a top-level `token`.

use relaybox_domain::constants::LOGIN_APP_HEADER;
use relaybox_domain::{LoginConfig, RelayError, Result, SecretString};
use reqwest::header::HeaderName;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::{HttpClient, RetryPolicy};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    result: Option<LoginResult>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct LoginResult {
    #[serde(default)]
    token: Option<String>,
}

impl LoginResponse {
    fn into_token(self) -> Option<String> {
        self.result
            .and_then(|result| result.token)
            .or(self.token)
            .filter(|token| !token.trim().is_empty())
    }
}

/// Performs the credential exchange.
#[derive(Clone)]
pub struct LoginClient {
    http: HttpClient,
    url: String,
    username: String,
    password: SecretString,
}

impl LoginClient {
    /// Build a client from configuration.
    ///
    /// The `x-app` value, when configured, becomes a default header of the
    /// underlying HTTP client.
    ///
    /// # Errors
    /// Returns `RelayError::Config` if the `x-app` value is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(config: &LoginConfig) -> Result<Self> {
        let mut builder = HttpClient::builder()
            .timeout(config.timeout)
            .retry(RetryPolicy::attempts(config.max_attempts));
        if let Some(app) = &config.app {
            builder = builder.default_header(HeaderName::from_static(LOGIN_APP_HEADER), app)?;
        }

        Ok(Self::with_http(builder.build()?, config))
    }

    /// Build a client around an existing HTTP client.
    pub fn with_http(http: HttpClient, config: &LoginConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    /// Exchange the configured credentials for a bearer token.
    ///
    /// # Errors
    /// - `RelayError::Network` on transport failure.
    /// - `RelayError::Auth` on any status other than 200, an unreadable body,
    ///   or a missing or empty token.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn login(&self) -> Result<String> {
        let body = LoginRequest { username: &self.username, password: self.password.expose() };

        let request = self.http.request(Method::POST, &self.url).json(&body);
        let response = self.http.send(request).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelayError::Auth(format!("login rejected with status {}", status.as_u16())));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Auth(format!("unreadable login response: {e}")))?;

        let token = parsed
            .into_token()
            .ok_or_else(|| RelayError::Auth("login response did not contain a token".into()))?;

        debug!("Login exchange succeeded");
        Ok(token)
    }
}
