//! Outbound delivery and the dispatch scheduler loop

pub mod client;
pub mod worker;

pub use client::HttpPayloadDispatcher;
pub use worker::{DispatchWorker, DispatchWorkerConfig};
