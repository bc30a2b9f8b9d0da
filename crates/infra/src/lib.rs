//! # Relaybox Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - The SQLite request store
//! - HTTP client, login exchange and bearer credential refresh
//! - HTTP payload delivery and the dispatch scheduler loop
//! - Configuration loading, logging setup and dispatch metrics
//!
//! ## Architecture
//! - Implements traits defined in `relaybox-core`
//! - Contains all "impure" code (I/O, timers, environment)

pub mod auth;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use auth::{CredentialManager, LoginClient};
pub use database::{DbManager, SqliteRequestRepository};
pub use dispatch::{DispatchWorker, DispatchWorkerConfig, HttpPayloadDispatcher};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, RetryPolicy};
pub use observability::{DispatchMetrics, DispatchMetricsSnapshot};
