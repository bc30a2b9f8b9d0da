//! Application context - dependency wiring for the relay

use std::sync::Arc;

use relaybox_core::{wake_channel, DispatchService, QueueService};
use relaybox_domain::{Config, RelayError, Result};
use relaybox_infra::auth::{CredentialManager, LoginClient};
use relaybox_infra::database::{DbManager, SqliteRequestRepository};
use relaybox_infra::dispatch::{DispatchWorker, DispatchWorkerConfig, HttpPayloadDispatcher};
use relaybox_infra::observability::DispatchMetrics;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::server::IngressSecret;

/// Shared state handed to the ingress handlers.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub queue: QueueService,
    pub credentials: Arc<CredentialManager>,
    pub metrics: Arc<DispatchMetrics>,
    pub ingress_secret: IngressSecret,
}

impl AppContext {
    /// Open the store, perform the initial login and wire the dispatch path.
    ///
    /// Returns the context together with the not yet started dispatch worker.
    /// Cancelling `startup` abandons the initial login.
    ///
    /// # Errors
    /// - `RelayError::Database` if the store cannot be opened or migrated.
    /// - Any initial login failure; the relay must not start without a token.
    pub async fn new(config: Config, startup: &CancellationToken) -> Result<(Self, DispatchWorker)> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        run_migrations(Arc::clone(&db)).await?;
        info!(path = %db.path().display(), "Request store ready");

        let login = LoginClient::new(&config.login)?;
        let credentials = Arc::new(CredentialManager::connect(login, config.login.interval, startup).await?);

        let store = Arc::new(SqliteRequestRepository::new(Arc::clone(&db)));
        let dispatcher = Arc::new(HttpPayloadDispatcher::new(&config.dispatch)?);
        let service = Arc::new(DispatchService::new(
            store.clone(),
            dispatcher,
            credentials.clone(),
            config.dispatch.strategy,
        ));

        let (signal, wakeups) = wake_channel();
        let metrics = Arc::new(DispatchMetrics::new());
        let worker = DispatchWorker::new(
            service,
            wakeups,
            DispatchWorkerConfig::from(&config.dispatch),
            metrics.clone(),
        );

        let context = Self {
            ingress_secret: IngressSecret::new(config.server.ingress_secret.expose()),
            queue: QueueService::new(store, signal),
            config,
            db,
            credentials,
            metrics,
        };

        Ok((context, worker))
    }

    /// Check the store answers queries.
    pub async fn check_database(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.health_check())
            .await
            .map_err(|e| RelayError::Internal(format!("database health task failed: {e}")))?
    }
}

async fn run_migrations(db: Arc<DbManager>) -> Result<()> {
    tokio::task::spawn_blocking(move || db.run_migrations())
        .await
        .map_err(|e| RelayError::Internal(format!("migration task failed: {e}")))?
}
