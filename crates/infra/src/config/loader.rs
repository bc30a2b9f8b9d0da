//! Configuration loader
//!
//! Loads relay configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If a required variable is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Both sources go through [`validate`] before a `Config` is returned.
//!
//! ## Environment Variables
//! Required:
//! - `RELAYBOX_INGRESS_SECRET`: Shared secret for `POST /?token=`
//! - `RELAYBOX_DB_PATH`: Database file path (`:memory:` for a throwaway store)
//! - `RELAYBOX_LOGIN_URL`, `RELAYBOX_LOGIN_USERNAME`, `RELAYBOX_LOGIN_PASSWORD`
//! - `RELAYBOX_DISPATCH_URL`: Downstream endpoint
//!
//! Optional:
//! - `RELAYBOX_ENV` (`dev`), `RELAYBOX_HTTP_ADDR` (`0.0.0.0:3000`)
//! - `RELAYBOX_DB_POOL_SIZE` (4)
//! - `RELAYBOX_LOGIN_APP`, `RELAYBOX_LOGIN_INTERVAL` (`30m`),
//!   `RELAYBOX_LOGIN_TIMEOUT` (`30s`), `RELAYBOX_LOGIN_MAX_ATTEMPTS` (1)
//! - `RELAYBOX_POLL_INTERVAL` (`1s`), `RELAYBOX_DISPATCH_STRATEGY`
//!   (`stop-on-error`), `RELAYBOX_DISPATCH_TIMEOUT` (`30s`),
//!   `RELAYBOX_DISPATCH_SUCCESS_STATUS` (200)
//! - `RELAYBOX_LOG_LEVEL` (`info`), `RELAYBOX_LOG_FORMAT` (`pretty`)
//!
//! Durations take humantime strings such as `500ms`, `1s` or `30m`.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./relaybox.{json,toml}` then `./config.{json,toml}`
//! 2. The same names one and two directories up
//! 3. The same names next to the executable

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use relaybox_domain::constants::{
    DEFAULT_DB_POOL_SIZE, DEFAULT_DISPATCH_TIMEOUT, DEFAULT_ENVIRONMENT, DEFAULT_HTTP_ADDR,
    DEFAULT_LOGIN_INTERVAL, DEFAULT_LOGIN_MAX_ATTEMPTS, DEFAULT_LOGIN_TIMEOUT, DEFAULT_LOG_LEVEL,
    DEFAULT_POLL_INTERVAL, DEFAULT_SUCCESS_STATUS,
};
use relaybox_domain::{
    Config, DatabaseConfig, DispatchConfig, FailurePolicy, LogFormat, LoggingConfig, LoginConfig,
    RelayError, Result, SecretString, ServerConfig,
};
use url::Url;

const CONFIG_FILE_NAMES: [&str; 4] = ["relaybox.json", "relaybox.toml", "config.json", "config.toml"];

/// Variables without which the environment cannot describe a relay.
const REQUIRED_ENV: [&str; 6] = [
    "RELAYBOX_INGRESS_SECRET",
    "RELAYBOX_DB_PATH",
    "RELAYBOX_LOGIN_URL",
    "RELAYBOX_LOGIN_USERNAME",
    "RELAYBOX_LOGIN_PASSWORD",
    "RELAYBOX_DISPATCH_URL",
];

/// Load configuration with automatic fallback strategy
///
/// Loads from environment variables when every required variable is set.
/// Only when one of them is missing does it fall back to a config file; a
/// malformed or invalid environment value is returned as is.
///
/// # Errors
/// Returns `RelayError::Config` if:
/// - An environment value cannot be parsed or fails validation
/// - Required variables are missing and no usable config file exists
/// - File format is invalid
pub fn load() -> Result<Config> {
    if let Some(missing) = missing_required_env() {
        tracing::debug!(variable = missing, "Required environment variable missing, trying file");
        return load_from_file(None);
    }

    let config = load_from_env()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

fn missing_required_env() -> Option<&'static str> {
    REQUIRED_ENV.into_iter().find(|key| env_opt(key).is_none())
}

/// Read `.env` into the process environment when running in `dev`.
///
/// Returns the path that was loaded, if any. Variables already set in the
/// environment are not overridden.
pub fn load_dotenv() -> Option<PathBuf> {
    let environment = std::env::var("RELAYBOX_ENV").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
    if environment != DEFAULT_ENVIRONMENT {
        return None;
    }

    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read .env file");
            None
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `RelayError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let config = Config {
        environment: env_or("RELAYBOX_ENV", DEFAULT_ENVIRONMENT),
        server: ServerConfig {
            http_addr: env_parse("RELAYBOX_HTTP_ADDR", || DEFAULT_HTTP_ADDR.parse::<SocketAddr>())?,
            ingress_secret: SecretString::new(env_var("RELAYBOX_INGRESS_SECRET")?),
        },
        database: DatabaseConfig {
            path: env_var("RELAYBOX_DB_PATH")?,
            pool_size: env_parse("RELAYBOX_DB_POOL_SIZE", || Ok::<_, RelayError>(DEFAULT_DB_POOL_SIZE))?,
        },
        login: LoginConfig {
            url: env_var("RELAYBOX_LOGIN_URL")?,
            username: env_var("RELAYBOX_LOGIN_USERNAME")?,
            password: SecretString::new(env_var("RELAYBOX_LOGIN_PASSWORD")?),
            app: env_opt("RELAYBOX_LOGIN_APP"),
            interval: env_duration("RELAYBOX_LOGIN_INTERVAL", DEFAULT_LOGIN_INTERVAL)?,
            timeout: env_duration("RELAYBOX_LOGIN_TIMEOUT", DEFAULT_LOGIN_TIMEOUT)?,
            max_attempts: env_parse("RELAYBOX_LOGIN_MAX_ATTEMPTS", || {
                Ok::<_, RelayError>(DEFAULT_LOGIN_MAX_ATTEMPTS)
            })?,
        },
        dispatch: DispatchConfig {
            url: env_var("RELAYBOX_DISPATCH_URL")?,
            poll_interval: env_duration("RELAYBOX_POLL_INTERVAL", DEFAULT_POLL_INTERVAL)?,
            strategy: env_opt("RELAYBOX_DISPATCH_STRATEGY")
                .map(|raw| raw.parse::<FailurePolicy>())
                .transpose()?
                .unwrap_or_default(),
            timeout: env_duration("RELAYBOX_DISPATCH_TIMEOUT", DEFAULT_DISPATCH_TIMEOUT)?,
            success_status: env_parse("RELAYBOX_DISPATCH_SUCCESS_STATUS", || {
                Ok::<_, RelayError>(DEFAULT_SUCCESS_STATUS)
            })?,
        },
        logging: LoggingConfig {
            level: env_or("RELAYBOX_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            format: env_opt("RELAYBOX_LOG_FORMAT")
                .map(|raw| raw.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
        },
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RelayError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RelayError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RelayError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RelayError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Check values serde cannot: URL schemes, non-zero durations, status range,
/// pool size and required secrets.
///
/// # Errors
/// The first violation found, as `RelayError::Config`.
pub fn validate(config: &Config) -> Result<()> {
    validate_url("login.url", &config.login.url)?;
    validate_url("dispatch.url", &config.dispatch.url)?;

    for (name, value) in [
        ("login.interval", config.login.interval),
        ("login.timeout", config.login.timeout),
        ("dispatch.poll_interval", config.dispatch.poll_interval),
        ("dispatch.timeout", config.dispatch.timeout),
    ] {
        if value.is_zero() {
            return Err(RelayError::Config(format!("{name} must be greater than zero")));
        }
    }

    if !(100..=599).contains(&config.dispatch.success_status) {
        return Err(RelayError::Config(format!(
            "dispatch.success_status {} is not a valid HTTP status",
            config.dispatch.success_status
        )));
    }
    if config.database.pool_size == 0 {
        return Err(RelayError::Config("database.pool_size must be at least 1".into()));
    }
    if config.database.path.trim().is_empty() {
        return Err(RelayError::Config("database.path must not be empty".into()));
    }
    if config.login.max_attempts == 0 {
        return Err(RelayError::Config("login.max_attempts must be at least 1".into()));
    }
    if config.login.username.trim().is_empty() {
        return Err(RelayError::Config("login.username must not be empty".into()));
    }
    if config.login.password.is_empty() {
        return Err(RelayError::Config("login.password must not be empty".into()));
    }
    if config.server.ingress_secret.is_empty() {
        return Err(RelayError::Config("server.ingress_secret must not be empty".into()));
    }

    Ok(())
}

fn validate_url(name: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|e| RelayError::Config(format!("Invalid {name} '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(RelayError::Config(format!("{name} must use http or https, got '{other}'"))),
    }
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `RelayError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => {
            toml::from_str(contents).map_err(|e| RelayError::Config(format!("Invalid TOML format: {e}")))
        }
        "json" => serde_json::from_str(contents)
            .map_err(|e| RelayError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RelayError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `RelayError::Config` if the variable is unset or blank.
fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| RelayError::Config(format!("Missing required environment variable: {key}")))
}

/// Non-blank environment variable, trimmed.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T, E, F>(key: &str, default: F) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    E: std::fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    match env_opt(key) {
        Some(raw) => {
            raw.parse::<T>().map_err(|e| RelayError::Config(format!("Invalid value for {key}: {e}")))
        }
        None => default().map_err(|e| RelayError::Config(format!("Invalid default for {key}: {e}"))),
    }
}

fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    match env_opt(key) {
        Some(raw) => humantime::parse_duration(&raw)
            .map_err(|e| RelayError::Config(format!("Invalid duration for {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}
