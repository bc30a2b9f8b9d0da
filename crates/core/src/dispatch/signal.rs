//! "Dispatch now" hand-off between the enqueue path and the dispatch loop.
//!
//! The channel holds at most one pending wake. A wake raised while another is
//! already pending is folded into it, so any number of enqueues during a
//! drain pass cost exactly one extra pass.

use relaybox_domain::{RelayError, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

const WAKE_CAPACITY: usize = 1;

/// Create a connected signal/wakeups pair.
pub fn wake_channel() -> (DispatchSignal, DispatchWakeups) {
    let (tx, rx) = mpsc::channel(WAKE_CAPACITY);
    (DispatchSignal { tx }, DispatchWakeups { rx })
}

/// How a wake hand-off was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The loop will observe a new wake.
    Delivered,
    /// A wake was already pending; this one was merged into it.
    Coalesced,
}

/// Sending half, cloned into every enqueue path.
#[derive(Debug, Clone)]
pub struct DispatchSignal {
    tx: mpsc::Sender<()>,
}

impl DispatchSignal {
    /// Ask the dispatch loop for a drain pass. Never blocks.
    ///
    /// # Errors
    /// Returns `RelayError::DispatcherStopped` when the loop owning the
    /// receiving half is gone.
    pub fn notify(&self) -> Result<WakeOutcome> {
        match self.tx.try_send(()) {
            Ok(()) => Ok(WakeOutcome::Delivered),
            Err(TrySendError::Full(())) => Ok(WakeOutcome::Coalesced),
            Err(TrySendError::Closed(())) => Err(RelayError::DispatcherStopped),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, owned by the dispatch loop.
#[derive(Debug)]
pub struct DispatchWakeups {
    rx: mpsc::Receiver<()>,
}

impl DispatchWakeups {
    /// Wait for the next wake. `None` once every signal has been dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Consume a pending wake without waiting.
    pub fn take_pending(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
