//! Relay constants
//!
//! Centralized defaults shared by the config loader, the services and the
//! binary.

use std::time::Duration;

// Environment
pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

// Store
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
pub const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Credential refresh
pub const DEFAULT_LOGIN_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 1;
pub const LOGIN_APP_HEADER: &str = "x-app";

// Dispatch
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SUCCESS_STATUS: u16 = 200;
pub const MAX_FAILURE_BODY_CHARS: usize = 256;

// Background loops
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
