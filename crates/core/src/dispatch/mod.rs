//! Dispatch scheduling primitives and the drain pass

pub mod errors;
pub mod ports;
pub mod service;
pub mod signal;

pub use errors::{DispatchError, DispatchErrorCategory};
pub use ports::{PayloadDispatcher, TokenSource};
pub use service::{DispatchService, DrainOutcome, DrainReport, DrainTrigger};
pub use signal::{wake_channel, DispatchSignal, DispatchWakeups, WakeOutcome};
