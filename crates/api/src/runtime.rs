//! Background loop lifecycle
//!
//! One root cancellation token covers the credential refresh loop and the
//! dispatch worker. Shutdown cancels it and waits for both loops.

use std::sync::Arc;
use std::time::Duration;

use relaybox_domain::constants::WORKER_JOIN_TIMEOUT;
use relaybox_domain::{RelayError, Result};
use relaybox_infra::auth::CredentialManager;
use relaybox_infra::dispatch::DispatchWorker;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Running background loops.
pub struct RelayRuntime {
    root: CancellationToken,
    refresh: Option<JoinHandle<()>>,
    worker: DispatchWorker,
    join_timeout: Duration,
}

impl RelayRuntime {
    /// Start the credential refresh loop and the dispatch worker.
    ///
    /// # Errors
    /// Returns the worker's start error; the refresh loop is cancelled again
    /// in that case.
    pub fn start(credentials: &Arc<CredentialManager>, mut worker: DispatchWorker) -> Result<Self> {
        let root = CancellationToken::new();
        let refresh = credentials.spawn_refresh(root.child_token());

        if let Err(err) = worker.start(&root) {
            root.cancel();
            return Err(err);
        }

        info!("Relay background loops started");
        Ok(Self { root, refresh: Some(refresh), worker, join_timeout: WORKER_JOIN_TIMEOUT })
    }

    /// Token whose cancellation stops every loop.
    pub fn cancellation(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.root.is_cancelled() && self.worker.is_running()
    }

    /// Cancel both loops and wait for them to finish.
    ///
    /// # Errors
    /// `RelayError::Internal` if either loop panicked or missed the join
    /// timeout. Both loops are always awaited.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down relay background loops");
        self.root.cancel();

        let worker_result = self.worker.stop().await;

        let refresh_result = match self.refresh.take() {
            Some(handle) => match tokio::time::timeout(self.join_timeout, handle).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    warn!("Credential refresh task panicked: {}", e);
                    Err(RelayError::Internal("credential refresh task panicked".into()))
                }
                Err(_) => {
                    warn!("Credential refresh task did not complete within timeout");
                    Err(RelayError::Internal("credential refresh join timed out".into()))
                }
            },
            None => Ok(()),
        };

        worker_result.and(refresh_result)?;
        info!("Relay background loops stopped");
        Ok(())
    }
}

impl Drop for RelayRuntime {
    fn drop(&mut self) {
        if !self.root.is_cancelled() {
            warn!("RelayRuntime dropped without shutdown; cancelling loops");
            self.root.cancel();
        }
    }
}
