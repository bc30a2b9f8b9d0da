//! Database implementations

pub mod manager;
pub mod request_repository;

pub use manager::*;
pub use request_repository::*;
