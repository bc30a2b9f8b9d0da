//! # relaybox Core
//!
//! Pure relay logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the request store, the downstream
//!   dispatcher and the credential source
//! - The enqueue service and the drain-pass service
//! - The wake-up channel between the enqueue path and the dispatch loop
//!
//! ## Architecture Principles
//! - Only depends on `relaybox-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod dispatch;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::{
    wake_channel, DispatchError, DispatchErrorCategory, DispatchService, DispatchSignal,
    DispatchWakeups, DrainOutcome, DrainReport, DrainTrigger, PayloadDispatcher, TokenSource,
    WakeOutcome,
};
pub use queue::{QueueService, RequestStore};
