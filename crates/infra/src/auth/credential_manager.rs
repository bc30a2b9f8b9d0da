//! Bearer credential manager with fixed-interval refresh
//!
//! Holds the current token behind a reader/writer lock. The login exchange
//! always runs outside the lock; only the swap of the new value takes the
//! write side, so readers never wait on network I/O.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use relaybox_core::TokenSource;
use relaybox_domain::{RelayError, Result};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::login_client::LoginClient;

/// Owns the current bearer token.
pub struct CredentialManager {
    login: LoginClient,
    token: RwLock<String>,
    interval: Duration,
}

impl CredentialManager {
    /// Perform the initial login and create the manager.
    ///
    /// The login, retries included, is abandoned when `cancel` fires.
    ///
    /// # Errors
    /// - `RelayError::Config` for a zero refresh interval.
    /// - `RelayError::Internal` when cancelled before a token arrived.
    /// - Any login failure. The relay must not start without a token.
    #[instrument(skip(login, cancel))]
    pub async fn connect(
        login: LoginClient,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(RelayError::Config("credential refresh interval must be greater than zero".into()));
        }

        let token = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RelayError::Internal("initial login cancelled".into()));
            }
            token = login.login() => token?,
        };

        info!("Initial login succeeded");
        Ok(Self { login, token: RwLock::new(token), interval })
    }

    /// Current token
    pub fn token(&self) -> String {
        self.token.read().clone()
    }

    /// Repeat the login exchange and swap in the new token.
    ///
    /// On failure the previous token stays in place. Returns whether the
    /// token was replaced.
    pub async fn refresh(&self) -> bool {
        match self.login.login().await {
            Ok(token) => {
                *self.token.write() = token;
                debug!("Bearer token refreshed");
                true
            }
            Err(err) => {
                error!(error = %err, "Token refresh failed; keeping previous token");
                false
            }
        }
    }

    /// Refresh on every interval tick until `cancel` fires.
    ///
    /// The first refresh happens one interval after the call. An in-flight
    /// login is abandoned on cancellation.
    pub async fn wait_and_refresh(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, "Credential refresh loop started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        _ = self.refresh() => {}
                    }
                }
            }
        }

        info!("Credential refresh loop stopped");
    }

    /// Spawn [`CredentialManager::wait_and_refresh`] on the runtime.
    pub fn spawn_refresh(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).wait_and_refresh(cancel))
    }
}

impl TokenSource for CredentialManager {
    fn current_token(&self) -> String {
        self.token()
    }
}
