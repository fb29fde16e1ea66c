//! Reporting and service metadata endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::Query;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use aegis_cli::api::{AuthMode, Credentials, ProtectApi, ServiceReply};
use aegis_cli::config::Config;

async fn token() -> Json<Value> {
    let expiry = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    Json(json!({ "token": "tok", "expiry": expiry }))
}

async fn account() -> Json<Value> {
    Json(json!({ "organization": "Acme", "user": "alice" }))
}

async fn statistics(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(q.get("start").map(String::as_str), Some("2026-01-01"));
    assert_eq!(q.get("end").map(String::as_str), Some("2026-02-01"));
    Json(json!({ "uploads": 7 }))
}

async fn sail_config(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(q.get("os").map(String::as_str), Some("android"));
    assert_eq!(q.get("version").map(String::as_str), Some("2.4"));
    Json(json!({ "sail": [] }))
}

async fn version() -> Json<Value> {
    Json(json!({ "version": "1.1.0" }))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/token", post(token))
        .route("/report/account", get(account))
        .route("/report/statistics", get(statistics))
        .route("/sail_config", get(sail_config))
        .route("/version", get(version));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app.into_make_service()).await.unwrap() });
    addr
}

async fn connect(addr: SocketAddr) -> ProtectApi {
    let cfg = Config {
        api_gateway_url: format!("http://{addr}"),
        access_token_url: format!("http://{addr}/token"),
        platform_access_token_url: format!("http://{addr}/platform-token"),
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
    };
    let creds = Credentials {
        client_id: "id".into(),
        client_secret: "secret".into(),
        mode: AuthMode::Standard,
        scope: "aps".into(),
    };
    ProtectApi::connect(cfg, creds).await.unwrap()
}

#[tokio::test]
async fn account_info_round_trips() {
    let addr = spawn_server().await;
    let mut api = connect(addr).await;
    let reply = api.get_account_info().await.unwrap();
    assert_eq!(reply.as_json().unwrap()["organization"], "Acme");
}

#[tokio::test]
async fn statistics_forwards_the_date_range() {
    let addr = spawn_server().await;
    let mut api = connect(addr).await;
    let reply = api.get_statistics("2026-01-01", Some("2026-02-01")).await.unwrap();
    assert_eq!(reply.as_json().unwrap()["uploads"], 7);
}

#[tokio::test]
async fn sail_config_forwards_os_and_version() {
    let addr = spawn_server().await;
    let mut api = connect(addr).await;
    let reply = api.get_sail_config("android", Some("2.4")).await.unwrap();
    assert!(matches!(reply, ServiceReply::Json(_)));
}

#[tokio::test]
async fn version_endpoint_round_trips() {
    let addr = spawn_server().await;
    let mut api = connect(addr).await;
    let reply = api.get_version().await.unwrap();
    assert_eq!(reply.as_json().unwrap()["version"], "1.1.0");
}
