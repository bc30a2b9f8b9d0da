use std::sync::Arc;
use std::time::Duration;

use relaybox_api::AppContext;
use relaybox_domain::{
    Config, DatabaseConfig, DispatchConfig, FailurePolicy, LoggingConfig, LoginConfig, SecretString,
    ServerConfig,
};
use relaybox_infra::dispatch::DispatchWorker;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const INGRESS_SECRET: &str = "ingress-s3cret";

/// Context plus everything that must outlive it during a test.
pub struct TestApp {
    pub context: Arc<AppContext>,
    pub worker: Option<DispatchWorker>,
    pub login: MockServer,
    pub sink: MockServer,
    _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir, login: &MockServer, sink: &MockServer) -> Config {
    Config {
        environment: "test".into(),
        server: ServerConfig {
            http_addr: "127.0.0.1:0".parse().expect("valid addr"),
            ingress_secret: SecretString::new(INGRESS_SECRET),
        },
        database: DatabaseConfig {
            path: temp_dir.path().join("relay.db").to_string_lossy().into_owned(),
            pool_size: 2,
        },
        login: LoginConfig {
            url: format!("{}/login", login.uri()),
            username: "relay-bot".into(),
            password: SecretString::new("hunter2"),
            app: Some("relaybox-tests".into()),
            interval: Duration::from_secs(3600),
            timeout: Duration::from_secs(5),
            max_attempts: 1,
        },
        dispatch: DispatchConfig {
            url: format!("{}/ingest", sink.uri()),
            poll_interval: Duration::from_secs(60),
            strategy: FailurePolicy::StopOnError,
            timeout: Duration::from_secs(5),
            success_status: 200,
        },
        logging: LoggingConfig::default(),
    }
}

pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": { "token": "tok-1" } })))
        .mount(server)
        .await;
}

pub async fn mount_sink(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Build a context against fresh wiremock endpoints. The worker is returned
/// unstarted.
pub async fn test_app() -> TestApp {
    let login = MockServer::start().await;
    let sink = MockServer::start().await;
    mount_login(&login).await;
    mount_sink(&sink, 200).await;

    let temp_dir = TempDir::new().expect("temp dir should be created");
    let (context, worker) = AppContext::new(test_config(&temp_dir, &login, &sink), &CancellationToken::new())
        .await
        .expect("context should build");

    TestApp { context: Arc::new(context), worker: Some(worker), login, sink, _temp_dir: temp_dir }
}
