//! # relaybox Domain
//!
//! Domain types shared by every relaybox crate.
//!
//! This crate contains:
//! - Queue record types (`NewRequest`, `QueuedRequest`)
//! - The relay error type and `Result` alias
//! - Configuration structures
//! - Default values and other constants
//!
//! ## Architecture
//! - No dependencies on other relaybox crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
