//! # Relaybox API
//!
//! Process bootstrap and the ingress HTTP server.
//!
//! This crate contains:
//! - Application context (dependency wiring)
//! - Background loop lifecycle (`RelayRuntime`)
//! - The axum ingress router
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires the store, credential manager and dispatch worker together

pub mod context;
pub mod runtime;
pub mod server;

pub use context::AppContext;
pub use runtime::RelayRuntime;
pub use server::{router, serve, ApiError, IngressSecret};
