//! Integration tests for the ingress router.

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use relaybox_api::router;
use relaybox_core::RequestStore;
use relaybox_infra::database::SqliteRequestRepository;
use serde_json::Value;
use support::{test_app, INGRESS_SECRET};
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::from(body.to_string())).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn status_is_ok() {
    let app = test_app().await;

    let (status, body) =
        send(router(app.context.clone()), Request::builder().uri("/status").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_or_missing_token_is_unauthorized() {
    let app = test_app().await;

    for uri in ["/", "/?token=", "/?token=guess"] {
        let (status, body) = send(router(app.context.clone()), post(uri, r#"{"a":1}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body, "Unauthorized");
    }
    assert_eq!(app.context.queue.pending_count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_body_is_bad_request() {
    let app = test_app().await;
    let uri = format!("/?token={INGRESS_SECRET}");

    let (status, _) = send(router(app.context.clone()), post(&uri, "  \n")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.context.queue.pending_count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn accepted_payload_is_persisted_verbatim() {
    let mut app = test_app().await;
    // Keep the wake receiver alive without delivering anything.
    let _worker = app.worker.take();
    let uri = format!("/?token={INGRESS_SECRET}");

    let (status, body) = send(router(app.context.clone()), post(&uri, r#"{"order":42}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let store = SqliteRequestRepository::new(app.context.db.clone());
    let pending = store.load_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload, r#"{"order":42}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn stopped_dispatcher_is_service_unavailable() {
    let mut app = test_app().await;
    drop(app.worker.take());
    let uri = format!("/?token={INGRESS_SECRET}");

    let (status, _) = send(router(app.context.clone()), post(&uri, "payload")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.context.queue.pending_count().await.unwrap(), 1, "record is kept for the next run");
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_status_reports_pending_and_metrics() {
    let mut app = test_app().await;
    let _worker = app.worker.take();
    app.context.queue.queue_request("one").await.unwrap();
    app.context.queue.queue_request("two").await.unwrap();

    let (status, body) = send(
        router(app.context.clone()),
        Request::builder().uri("/status/queue").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["pending"], 2);
    assert_eq!(json["metrics"]["delivered"], 0);
}
