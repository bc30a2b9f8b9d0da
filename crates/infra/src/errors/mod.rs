//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{InfraError, HTTP_TIMEOUT_MESSAGE};
