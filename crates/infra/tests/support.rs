use std::sync::Arc;
use std::time::Duration;

use relaybox_core::{wake_channel, DispatchService, QueueService};
use relaybox_domain::{DispatchConfig, FailurePolicy, LoginConfig, SecretString};
use relaybox_infra::auth::{CredentialManager, LoginClient};
use relaybox_infra::database::{DbManager, SqliteRequestRepository};
use relaybox_infra::dispatch::{DispatchWorker, DispatchWorkerConfig, HttpPayloadDispatcher};
use relaybox_infra::observability::DispatchMetrics;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const INGEST_PATH: &str = "/ingest";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    pub temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new migrated database in a fresh temp dir.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = Self::open(&temp_dir);
        Self { manager, temp_dir }
    }

    /// Open (or reopen) the database file inside `dir`.
    pub fn open(dir: &TempDir) -> Arc<DbManager> {
        let manager =
            DbManager::new(dir.path().join("relay.db"), 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");
        Arc::new(manager)
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Mount a login endpoint that always hands out `token`.
pub async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": { "token": token } })))
        .mount(server)
        .await;
}

pub fn login_config(server: &MockServer) -> LoginConfig {
    LoginConfig {
        url: format!("{}/login", server.uri()),
        username: "relay-bot".into(),
        password: SecretString::new("hunter2"),
        app: None,
        interval: Duration::from_secs(3600),
        timeout: Duration::from_secs(5),
        max_attempts: 1,
    }
}

pub fn dispatch_config(server: &MockServer, policy: FailurePolicy, poll: Duration) -> DispatchConfig {
    DispatchConfig {
        url: format!("{}{INGEST_PATH}", server.uri()),
        poll_interval: poll,
        strategy: policy,
        timeout: Duration::from_secs(5),
        success_status: 200,
    }
}

/// A fully wired relay against wiremock endpoints.
pub struct Relay {
    pub queue: QueueService,
    pub worker: DispatchWorker,
    pub credentials: Arc<CredentialManager>,
    pub store: Arc<SqliteRequestRepository>,
    pub metrics: Arc<DispatchMetrics>,
    pub root: CancellationToken,
    pub db: TestDatabase,
}

impl Relay {
    /// Wire the relay. The worker is not started.
    pub async fn build(login: &MockServer, sink: &MockServer, policy: FailurePolicy, poll: Duration) -> Self {
        let db = TestDatabase::new();
        let store = Arc::new(SqliteRequestRepository::new(db.manager.clone()));

        let login_client = LoginClient::new(&login_config(login)).expect("login client");
        let credentials = Arc::new(
            CredentialManager::connect(login_client, Duration::from_secs(3600), &CancellationToken::new())
                .await
                .expect("initial login should succeed"),
        );

        let config = dispatch_config(sink, policy, poll);
        let dispatcher = Arc::new(HttpPayloadDispatcher::new(&config).expect("dispatcher"));
        let service =
            Arc::new(DispatchService::new(store.clone(), dispatcher, credentials.clone(), policy));

        let (signal, wakeups) = wake_channel();
        let metrics = Arc::new(DispatchMetrics::new());
        let worker = DispatchWorker::new(
            service,
            wakeups,
            DispatchWorkerConfig { poll_interval: poll, join_timeout: Duration::from_secs(2) },
            metrics.clone(),
        );

        Self {
            queue: QueueService::new(store.clone(), signal),
            worker,
            credentials,
            store,
            metrics,
            root: CancellationToken::new(),
            db,
        }
    }

    pub fn start(&mut self) {
        self.worker.start(&self.root).expect("worker should start");
    }

    pub async fn stop(&mut self) {
        self.worker.stop().await.expect("worker should stop");
    }

    pub async fn pending(&self) -> u64 {
        self.queue.pending_count().await.expect("count should succeed")
    }
}

/// Bodies the sink received, in arrival order.
pub async fn received_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|req| req.url.path() == INGEST_PATH)
        .map(|req| String::from_utf8_lossy(&req.body).into_owned())
        .collect()
}

/// Wait until the sink has received at least `count` payloads.
pub async fn wait_for_deliveries(server: &MockServer, count: usize, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if received_bodies(server).await.len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait until the sink has received `body`.
pub async fn wait_for_body(server: &MockServer, body: &str, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if received_bodies(server).await.iter().any(|received| received == body) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait until nothing is left in the store.
pub async fn wait_for_empty_queue(relay: &Relay, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if relay.pending().await == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
