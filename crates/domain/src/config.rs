//! Configuration management
//!
//! Plain data only. Loading from the environment or a file, and validation of
//! URLs, lives in `relaybox-infra`.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_POOL_SIZE, DEFAULT_DISPATCH_TIMEOUT, DEFAULT_ENVIRONMENT, DEFAULT_LOGIN_INTERVAL,
    DEFAULT_LOGIN_MAX_ATTEMPTS, DEFAULT_LOGIN_TIMEOUT, DEFAULT_LOG_LEVEL, DEFAULT_POLL_INTERVAL,
    DEFAULT_SUCCESS_STATUS,
};
use crate::errors::RelayError;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_environment")]
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub login: LoginConfig,
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ingress server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    #[serde(skip_serializing)]
    pub ingress_secret: SecretString,
}

/// Request store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Login exchange and refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    pub url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: SecretString,
    /// Value for the optional `x-app` header.
    #[serde(default)]
    pub app: Option<String>,
    #[serde(with = "humantime_serde", default = "default_login_interval")]
    pub interval: Duration,
    #[serde(with = "humantime_serde", default = "default_login_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_login_max_attempts")]
    pub max_attempts: u32,
}

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub url: String,
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(default)]
    pub strategy: FailurePolicy,
    #[serde(with = "humantime_serde", default = "default_dispatch_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_success_status")]
    pub success_status: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::default() }
    }
}

/// What a drain pass does after a failed delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abandon the rest of the pass; the failed item and everything after it
    /// stay queued.
    #[default]
    #[serde(alias = "stop", alias = "break")]
    StopOnError,
    /// Leave the failed item queued and move on to the next one.
    #[serde(alias = "continue")]
    ContinueOnError,
}

impl FailurePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopOnError => "stop-on-error",
            Self::ContinueOnError => "continue-on-error",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop-on-error" | "stop" | "break" => Ok(Self::StopOnError),
            "continue-on-error" | "continue" => Ok(Self::ContinueOnError),
            other => Err(RelayError::Config(format!("Unknown dispatch strategy: {other}"))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(RelayError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

/// A string that never shows up in `Debug` output or serialized config.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

const fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

const fn default_login_interval() -> Duration {
    DEFAULT_LOGIN_INTERVAL
}

const fn default_login_timeout() -> Duration {
    DEFAULT_LOGIN_TIMEOUT
}

const fn default_login_max_attempts() -> u32 {
    DEFAULT_LOGIN_MAX_ATTEMPTS
}

const fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

const fn default_dispatch_timeout() -> Duration {
    DEFAULT_DISPATCH_TIMEOUT
}

const fn default_success_status() -> u16 {
    DEFAULT_SUCCESS_STATUS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
