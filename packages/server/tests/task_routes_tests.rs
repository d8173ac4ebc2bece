//! Task endpoints exercised through the router.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bridge_core::domains::responses::ResponseStatus;
use bridge_core::kernel::test_dependencies::{MockSilo, MockWebmentionSender};
use bridge_core::kernel::{Clock, TestDependencies};
use bridge_core::server::{build_app, AppState};
use chrono::Duration;
use tower::ServiceExt;

use crate::common::*;

fn app(test: &TestDependencies) -> Router {
    build_app(AppState::new(None, Arc::new(test.deps())))
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn poll_endpoint_runs_the_poll() {
    let test = TestDependencies::new().mock_silo(MockSilo::new().with_activities(vec![
        activity_with_reply("tag:fa.ke,2013:a1", "http://my.blog/post", "tag:fa.ke,2013:c1"),
    ]));
    test.store.put_source(test_source("s1")).await;

    let response = app(&test)
        .oneshot(form_post(
            "/_ah/queue/poll",
            "source_key=s1&last_polled=1970-01-01-00-00-00",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test.task_queue.propagates().len(), 2);
    assert_eq!(test.task_queue.polls().len(), 1);
}

#[tokio::test]
async fn poll_endpoint_rejects_bad_fence() {
    let test = TestDependencies::new();

    let response = app(&test)
        .oneshot(form_post(
            "/_ah/queue/poll",
            "source_key=s1&last_polled=yesterday",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn poll_endpoint_rejects_missing_params() {
    let test = TestDependencies::new();

    let response = app(&test)
        .oneshot(form_post("/_ah/queue/poll", "source_key=s1"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn poll_endpoint_reports_silo_failure() {
    let test = TestDependencies::new().mock_silo(MockSilo::new().failing("timeout"));
    test.store.put_source(test_source("s1")).await;

    let response = app(&test)
        .oneshot(form_post(
            "/_ah/queue/poll",
            "source_key=s1&last_polled=1970-01-01-00-00-00",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn propagate_endpoint_status_codes() {
    let test = TestDependencies::new()
        .mock_webmention(MockWebmentionSender::new().with_exception("http://boom.example/", "reset"));
    test.store.put_source(test_source("s1")).await;
    test.store
        .put_response(test_response("ok", "s1", &["http://a.example/1"]))
        .await;
    test.store
        .put_response(test_response("boom", "s1", &["http://boom.example/"]))
        .await;
    let mut leased = test_response("leased", "s1", &["http://a.example/1"]);
    leased.status = ResponseStatus::Processing;
    leased.leased_until = Some(test.clock.now() + Duration::minutes(1));
    test.store.put_response(leased).await;

    let cases = [
        ("ok", StatusCode::OK),
        ("ok", StatusCode::OK),
        ("leased", StatusCode::NOT_MODIFIED),
        ("missing", StatusCode::NOT_MODIFIED),
        ("boom", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (key, expected) in cases {
        let response = app(&test)
            .oneshot(form_post(
                "/_ah/queue/propagate",
                &format!("response_key={}", key),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "response_key={}", key);
    }
}

#[tokio::test]
async fn health_without_database() {
    let test = TestDependencies::new();

    let response = app(&test)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"]["status"], "not configured");
}
