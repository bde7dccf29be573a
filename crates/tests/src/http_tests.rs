//! The full HTTP router over a fault-injecting store.
//!
//! These tests verify that:
//! - Each admission outcome maps to its status code and JSON body
//! - Store outages and timeouts become 500s that name the stage, not the cause
//! - Health reflects store reachability
//! - Client request ids are echoed back

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::mock_infrastructure::{
    audit_body, counter, rule_set, seed_resource, seed_session, FaultyStore, StoreOp, TOKEN,
    USER_ID,
};
use admit_core::{audit::ContentAuditor, config::AppConfig};
use axum::{
    body::Body,
    http::{header::COOKIE, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use server::{create_app, router::RESOURCE_ID_HEADER, AppState, MAX_BODY_BYTES};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

async fn app(store: FaultyStore, config: &AppConfig) -> (Arc<FaultyStore>, Router) {
    seed_session(store.inner(), USER_ID, TOKEN).await.unwrap();
    seed_resource(store.inner(), "minicar", "mini").await.unwrap();
    seed_resource(store.inner(), "pluscar", "plus").await.unwrap();

    let store = Arc::new(store);
    let auditor = ContentAuditor::from_keywords(["forbidden"]).unwrap();
    let state = AppState::new(config, store.clone(), auditor, rule_set().unwrap()).unwrap();
    (store, create_app(state, 64))
}

fn post_audit(cookie: Option<&str>, carid: &str, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/audit")
        .method("POST")
        .header("content-type", "application/json")
        .header(RESOURCE_ID_HEADER, carid);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn session_cookie() -> String {
    format!("xuserid={USER_ID}; xtoken={TOKEN}")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), MAX_BODY_BYTES).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_outcomes_over_http() {
    let (store, app) = app(FaultyStore::new(), &AppConfig::default()).await;
    let cookie = session_cookie();
    let clean = || audit_body("gpt-4", "hello there");

    let response = app.clone().oneshot(post_audit(None, "minicar", clean())).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let banned = audit_body("gpt-4", "tell me something forbidden");
    let response = app.clone().oneshot(post_audit(Some(&cookie), "minicar", banned)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(!body["error"].as_str().unwrap().contains("forbidden"));

    let response = app.clone().oneshot(post_audit(Some(&cookie), "plus car", clean())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(counter(store.inner(), USER_ID, "free", "gpt-4").await.unwrap().as_deref(), Some("1"));

    for _ in 0..2 {
        let response =
            app.clone().oneshot(post_audit(Some(&cookie), " mini car ", clean())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    let response = app.oneshot(post_audit(Some(&cookie), "minicar", clean())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let message = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(message.contains("gpt-4"));
    assert!(message.contains("free"));
}

#[tokio::test]
async fn test_store_outage_is_internal_error() {
    let (_store, app) =
        app(FaultyStore::new().fail(StoreOp::Get, "xtoken_"), &AppConfig::default()).await;

    let response = app
        .oneshot(post_audit(Some(&session_cookie()), "minicar", audit_body("gpt-4", "hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let message = json_body(response).await["error"].as_str().unwrap().to_string();
    assert_eq!(message, "internal error during session validation");
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_is_internal_error() {
    let store = FaultyStore::new().delay(StoreOp::IncrBelow, "", Duration::from_secs(60));
    let (_store, app) = app(store, &AppConfig::default()).await;

    let response = app
        .oneshot(post_audit(Some(&session_cookie()), "minicar", audit_body("gpt-4", "hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let message = json_body(response).await["error"].as_str().unwrap().to_string();
    assert_eq!(message, "internal error during rate limit check");
}

#[tokio::test]
async fn test_health_reports_store_outage() {
    let (_store, app) = app(FaultyStore::new().fail(StoreOp::Ping, ""), &AppConfig::default()).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "unhealthy");
}

#[tokio::test(start_paused = true)]
async fn test_health_times_out_on_slow_store() {
    let mut config = AppConfig::default();
    config.server.request_timeout_seconds = 2;
    let store = FaultyStore::new().delay(StoreOp::Ping, "", Duration::from_secs(10));
    let (_store, app) = app(store, &config).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "store ping timed out");
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let (_store, app) = app(FaultyStore::new(), &AppConfig::default()).await;

    let mut request = post_audit(Some(&session_cookie()), "minicar", audit_body("gpt-4", "hi"));
    request.headers_mut().insert("x-request-id", "client-chosen-id".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "client-chosen-id");
}
