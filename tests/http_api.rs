//! End-to-end HTTP flow over the in-process store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use simple_bank::bank::Bank;
use simple_bank::config::TransferConfig;
use simple_bank::gateway::{router, state::AppState};
use simple_bank::ledger::MemoryStore;
use simple_bank::transfer::OverdraftPolicy;

fn app(store: &MemoryStore, overdraft: OverdraftPolicy) -> Router {
    let config = TransferConfig {
        overdraft,
        ..TransferConfig::default()
    };
    let bank = Bank::new("memory", Arc::new(store.clone()), config);
    router(Arc::new(AppState::new(Arc::new(bank))))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn open(app: &Router, owner: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/accounts",
        Some(json!({"owner": owner, "currency": "USD"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_round_trip_transfers() {
    let store = MemoryStore::new();
    let app = app(&store, OverdraftPolicy::Allow);
    let alice = open(&app, "alice").await;
    let bob = open(&app, "bob").await;

    for (from, to) in [(alice, bob), (bob, alice), (alice, bob)] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/transfers",
            Some(json!({"from_account_id": from, "to_account_id": to, "amount": 50, "currency": "USD"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["code"], 0);
    }

    let (_, body) = send(&app, "GET", &format!("/api/v1/accounts/{}", alice), None).await;
    assert_eq!(body["data"]["balance"], -50);
    let (_, body) = send(&app, "GET", &format!("/api/v1/accounts/{}", bob), None).await;
    assert_eq!(body["data"]["balance"], 50);

    assert_eq!(store.counts().transfers, 3);
    assert_eq!(store.counts().entries, 6);
}

#[tokio::test]
async fn test_overdraft_rejected_over_http() {
    let store = MemoryStore::new();
    let app = app(&store, OverdraftPolicy::Reject);
    let alice = open(&app, "alice").await;
    let bob = open(&app, "bob").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/transfers",
        Some(json!({"from_account_id": alice, "to_account_id": bob, "amount": 1, "currency": "USD"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 1002);
    assert_eq!(store.counts().transfers, 0);
}

#[tokio::test]
async fn test_unknown_transfer() {
    let store = MemoryStore::new();
    let app = app(&store, OverdraftPolicy::Allow);
    let (status, body) = send(&app, "GET", "/api/v1/transfers/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4004);
}
