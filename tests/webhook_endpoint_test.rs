//! HTTP-layer tests driving the axum router with in-memory state.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use formflexi_backend::api;
use formflexi_backend::gateway::token::ReturnToken;
use formflexi_backend::gateway::types::ApiMode;
use formflexi_backend::reconcile::traits::CorrelationStore;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = test_harness();
    let app = api::router(harness.state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_mode"], "test");
    assert_eq!(body["gateway_configured"], true);
}

#[tokio::test]
async fn test_webhook_endpoint_processes_signed_event() {
    let harness = test_harness();
    harness
        .store
        .create(ApiMode::Test, 7, "flexi-7-init", 10_000)
        .await
        .unwrap();

    let payload = approved_payload("9001", ApiMode::Test, 10_000, 10_000, "R1", Some(7));
    let signature = sign(&payload, TEST_SECRET);

    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header("content-type", "application/json")
                .header("X-Payflexi-Signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "processed");
    assert_eq!(body["action"]["cumulative_amount_paid"], 10_000);
    assert_eq!(body["action"]["action_id"], "9001_transaction.approved");

    // Delivery is audited and marked processed.
    let entries = harness.event_log.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].processed);

    let record = harness.store.snapshot(ApiMode::Test, 7).unwrap();
    assert_eq!(record.amount_paid, 10_000);
}

#[tokio::test]
async fn test_webhook_endpoint_missing_signature_unauthorized() {
    let harness = test_harness();
    let payload = approved_payload("9001", ApiMode::Test, 10_000, 10_000, "R1", Some(7));

    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_endpoint_invalid_signature_unauthorized_and_inert() {
    let harness = test_harness();
    harness
        .store
        .create(ApiMode::Test, 7, "flexi-7-init", 10_000)
        .await
        .unwrap();

    let payload = approved_payload("9001", ApiMode::Test, 10_000, 10_000, "R1", Some(7));
    let signature = sign(&payload, "wrong_secret");

    let app = api::router(harness.state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header("content-type", "application/json")
                .header("X-Payflexi-Signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Nothing was credited, and the failure is on the audit trail.
    let record = harness.store.snapshot(ApiMode::Test, 7).unwrap();
    assert_eq!(record.amount_paid, 0);
    let entries = harness.event_log.entries();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].processed);
    assert_eq!(entries[0].attempts, 1);
}

#[tokio::test]
async fn test_webhook_endpoint_ignores_unrelated_events() {
    let harness = test_harness();

    let payload = serde_json::to_vec(&serde_json::json!({
        "event": "transaction.pending",
        "data": { "id": "9001", "domain": "test", "status": "pending" }
    }))
    .unwrap();
    let signature = sign(&payload, TEST_SECRET);

    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header("content-type", "application/json")
                .header("X-Payflexi-Signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn test_webhook_endpoint_unknown_submission_not_found() {
    let harness = test_harness();

    let payload = approved_payload("9001", ApiMode::Test, 10_000, 10_000, "nobody", None);
    let signature = sign(&payload, TEST_SECRET);

    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header("content-type", "application/json")
                .header("X-Payflexi-Signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_endpoint_rejects_garbage_body() {
    let harness = test_harness();

    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header("content-type", "application/json")
                .header("X-Payflexi-Signature", "whatever")
                .body(Body::from("not json at all"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_endpoint_missing_token_bad_request() {
    let harness = test_harness();

    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/payments/return")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_endpoint_tampered_token_bad_request() {
    let harness = test_harness();
    harness.host.insert(submission(7));

    let token = ReturnToken::new(7, 3, 5).encode("some-other-secret");
    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/payments/return?payflexi_return={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_endpoint_cancelled_redirects_to_source() {
    let harness = test_harness();
    harness.host.insert(submission(7));

    let token = ReturnToken::new(7, 3, 5).encode(RETURN_SECRET);
    let app = api::router(harness.state);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/payments/return?payflexi_return={}&pf_cancelled=1",
                    token
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://forms.example.com/view/7"
    );
}
