use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use vaultledger_core::ledger::LedgerConfig;
use vaultledger_server::{api::app_router, build_state, config::Config, AppState};

async fn test_app() -> (Router, Arc<AppState>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        db_path: dir.path().join("ledger.db").to_string_lossy().to_string(),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(5),
        log_format: "text".to_string(),
        vaults: Vec::new(),
        ledger: LedgerConfig::default(),
        price_oracle_url: None,
    };
    let state = build_state(&config).await.unwrap();
    (app_router(state.clone(), &config), state, dir)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn new_goal(owner: &str) -> Value {
    json!({
        "ownerId": owner,
        "title": "Laptop",
        "token": { "address": "0xUSDC", "symbol": "USDC", "decimals": 6 },
        "targetAmount": "1000"
    })
}

#[tokio::test]
async fn health_endpoints_respond() {
    let (app, _state, _dir) = test_app().await;
    let (status, _) = send(&app, Method::GET, "/api/v1/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/v1/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn deposit_then_overdraw_goal() {
    let (app, _state, _dir) = test_app().await;

    let (status, created) = send(&app, Method::POST, "/api/v1/goals", Some(new_goal("alice"))).await;
    assert_eq!(status, StatusCode::OK);
    let goal_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["currentAmount"], "0");

    let (status, deposited) = send(
        &app,
        Method::POST,
        &format!("/api/v1/goals/{}/deposits", goal_id),
        Some(json!({ "amount": "250" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deposited["transaction"]["status"], "pending");

    let (status, loaded) = send(&app, Method::GET, &format!("/api/v1/goals/{}", goal_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["currentAmount"], "250");
    assert_eq!(loaded["progress"], "25");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/goals/{}/withdrawals", goal_id),
        Some(json!({ "amount": "300" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 422);

    let (status, txs) = send(
        &app,
        Method::GET,
        &format!("/api/v1/goals/{}/transactions", goal_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(txs.as_array().unwrap().len(), 1);

    let (status, listed) = send(&app, Method::GET, "/api/v1/goals?ownerId=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_goal_is_404() {
    let (app, _state, _dir) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/goals/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn unknown_vault_is_404() {
    let (app, _state, _dir) = test_app().await;
    let (status, vaults) = send(&app, Method::GET, "/api/v1/vaults", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(vaults.as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::POST, "/api/v1/vaults/base/0xabc/scan", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn group_goal_join_and_leave() {
    let (app, _state, _dir) = test_app().await;
    let (status, group) = send(
        &app,
        Method::POST,
        "/api/v1/group-goals",
        Some(json!({
            "ownerId": "alice",
            "title": "Trip",
            "token": { "address": "0xUSDC", "symbol": "USDC", "decimals": 6 },
            "targetAmount": "900"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", group);
    let group_id = group["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/group-goals/{}/join", group_id),
        Some(json!({ "userId": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = send(&app, Method::GET, "/api/v1/group-goals?userId=bob", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/group-goals/{}/leave", group_id),
        Some(json!({ "userId": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = send(&app, Method::GET, "/api/v1/group-goals?userId=bob", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed.as_array().unwrap().is_empty());
}
