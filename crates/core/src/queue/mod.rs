//! Durable FIFO request queue

pub mod ports;
pub mod service;

pub use ports::RequestStore;
pub use service::QueueService;
