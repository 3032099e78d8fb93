//! HTTP surface tests driven through the router without a socket
//!
//! Run with: cargo test --test api_test

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::*;
use phishfinder::api::{create_router, AppState, RateLimiter};
use phishfinder::models::ServerConfig;
use phishfinder::{AppResult, InMemoryJobQueue};
use phishfinder::providers::TransportResponse;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_with_limit(script: Vec<AppResult<TransportResponse>>, rate_limit: u32) -> (Router, Harness) {
    let h = harness(script);
    let jobs = Arc::new(InMemoryJobQueue::new(2, 100));
    let limiter = Arc::new(RateLimiter::new(rate_limit));
    let state = Arc::new(AppState::new(h.pipeline.clone(), jobs, limiter));
    (create_router(state, &ServerConfig::default()), h)
}

fn app(script: Vec<AppResult<TransportResponse>>) -> (Router, Harness) {
    app_with_limit(script, 1000)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_lines(response: axum::response::Response) -> Vec<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================
// Input validation
// ============================================

#[tokio::test]
async fn test_missing_prompt_is_rejected() {
    let (app, h) = app(vec![]);

    let response = app.clone().oneshot(post_json("/api/check", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing input");

    let response = app.clone().oneshot(post_json("/api/check", json!({"prompt": "   "}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Not JSON at all
    let request = Request::builder()
        .method("POST")
        .uri("/api/start-check")
        .body(Body::from("prompt=paypa1-secure.com"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(h.transport.calls(), 0);
}

// ============================================
// Synchronous mode
// ============================================

#[tokio::test]
async fn test_sync_check_returns_report() {
    let (app, _h) = app(vec![gemini_ok(high_risk_verdict())]);

    let response = app
        .oneshot(post_json("/api/check", json!({"prompt": "test@scam-domain.xyz", "model": "flash"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["risk"]["level"], "High");
    assert_eq!(body["risk"]["class"], "high");
    assert_eq!(body["risk"]["score"], 92);
    assert_eq!(body["domainAge"], "2024-05-01");
    assert_eq!(body["mxRecords"], "Yes");
    assert_eq!(body["watchFor"].as_array().unwrap().len(), 2);
    assert_eq!(body["generated"]["securityAlert"], "Phishing campaign from scam-domain.xyz");
}

#[tokio::test]
async fn test_sync_upstream_failure_hides_detail() {
    let (app, _h) = app(vec![unavailable(), unavailable()]);

    let response = app
        .oneshot(post_json("/api/check", json!({"prompt": "paypa1-secure.com"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(!error.contains("overloaded"));
}

// ============================================
// Streaming mode
// ============================================

#[tokio::test]
async fn test_check_streams_when_accept_is_ndjson() {
    let (app, _h) = app(vec![gemini_ok(high_risk_verdict())]);

    let mut request = post_json("/api/check", json!({"prompt": "test@scam-domain.xyz"}));
    request
        .headers_mut()
        .insert(header::ACCEPT, "application/x-ndjson".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-ndjson");

    let lines = body_lines(response).await;
    let types: Vec<&str> = lines.iter().map(|l| l["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["domainAge", "mxRecords", "risk", "summary", "watchFor", "watchFor", "advice", "generated"]
    );
    assert_eq!(lines[2]["content"]["level"], "High");
}

#[tokio::test]
async fn test_check_stream_allow_listed() {
    let (app, h) = app(vec![]);

    let response = app
        .oneshot(post_json("/api/check-stream", json!({"prompt": "https://phishfinder.bot/page"})))
        .await
        .unwrap();

    let lines = body_lines(response).await;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["type"], "final");
    assert_eq!(lines[0]["content"]["risk"]["score"], 0);
    assert_eq!(h.transport.calls(), 0);
}

// ============================================
// Submit-and-poll mode
// ============================================

async fn poll_until_terminal(app: &Router, task_id: &str) -> Value {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/result/{}", task_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        if body["state"] == "SUCCESS" || body["state"] == "FAILURE" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {} never finished", task_id);
}

#[tokio::test]
async fn test_start_check_then_poll_success() {
    let (app, _h) = app(vec![gemini_ok(high_risk_verdict())]);

    let response = app
        .clone()
        .oneshot(post_json("/api/start-check", json!({"prompt": "test@scam-domain.xyz", "model": "pro"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let body = poll_until_terminal(&app, &task_id).await;
    assert_eq!(body["state"], "SUCCESS");
    assert_eq!(body["data"]["risk"]["level"], "High");
}

#[tokio::test]
async fn test_start_check_failure_is_idempotent() {
    let (app, _h) = app(vec![unavailable(), unavailable()]);

    let response = app
        .clone()
        .oneshot(post_json("/api/start-check", json!({"prompt": "paypa1-secure.com"})))
        .await
        .unwrap();
    let task_id = body_json(response).await["task_id"].as_str().unwrap().to_string();

    let first = poll_until_terminal(&app, &task_id).await;
    let second = poll_until_terminal(&app, &task_id).await;
    assert_eq!(first["state"], "FAILURE");
    assert_eq!(first, second);
    assert!(first.get("data").is_none());
}

#[tokio::test]
async fn test_unknown_task_id_is_not_found() {
    let (app, _h) = app(vec![]);

    let response = app.oneshot(get("/api/result/does-not-exist")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================
// Health and rate limiting
// ============================================

#[tokio::test]
async fn test_health() {
    let (app, _h) = app(vec![]);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let (app, _h) = app_with_limit(vec![], 1);

    let request = |ip: &str| {
        Request::builder()
            .uri("/api/result/anything")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request("10.0.0.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::NOT_FOUND);

    let second = app.clone().oneshot(request("10.0.0.1")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(header::RETRY_AFTER));

    // Other clients keep their own budget
    let other = app.clone().oneshot(request("10.0.0.2")).await.unwrap();
    assert_eq!(other.status(), StatusCode::NOT_FOUND);

    // Health is never limited
    let health = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
