//! Multipart upload engine against a mock backend: chunking, reassembly,
//! and the abort-on-failure contract.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use aegis_cli::api::upload::PART_SIZE;
use aegis_cli::api::{AuthMode, Credentials, ProtectApi};
use aegis_cli::config::Config;

#[derive(Default)]
struct Shared {
    parts: Mutex<Vec<(u64, Vec<u8>)>>,
    complete_bodies: Mutex<Vec<Value>>,
    abort_bodies: Mutex<Vec<Value>>,
    starts: AtomicUsize,
    fail_parts: AtomicBool,
    fail_start: AtomicBool,
    abort_with_service_error: AtomicBool,
    addr: Mutex<Option<SocketAddr>>,
}

type AppState = Arc<Shared>;

async fn token() -> Json<Value> {
    let expiry = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    Json(json!({ "token": "tok", "expiry": expiry }))
}

async fn start_upload(State(s): State<AppState>) -> impl IntoResponse {
    s.starts.fetch_add(1, Ordering::SeqCst);
    if s.fail_start.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response();
    }
    Json(json!({ "UploadId": "u-77" })).into_response()
}

async fn upload_url(State(s): State<AppState>, Query(q): Query<HashMap<String, String>>) -> String {
    let addr = s.addr.lock().unwrap().unwrap();
    let n = q.get("partNumber").cloned().unwrap_or_default();
    assert_eq!(q.get("uploadId").map(String::as_str), Some("u-77"));
    format!("http://{addr}/part/{n}")
}

async fn put_part(State(s): State<AppState>, Path(n): Path<u64>, body: Bytes) -> impl IntoResponse {
    if s.fail_parts.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, [(header::ETAG, String::new())], "").into_response();
    }
    s.parts.lock().unwrap().push((n, body.to_vec()));
    (StatusCode::OK, [(header::ETAG, format!("\"etag-{n}\""))], "").into_response()
}

async fn complete_upload(State(s): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    s.complete_bodies.lock().unwrap().push(body);
    Json(json!({ "ok": true }))
}

async fn abort_upload(State(s): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    s.abort_bodies.lock().unwrap().push(body);
    if s.abort_with_service_error.load(Ordering::SeqCst) {
        return Json(json!({ "errorMessage": "ABORT_PROTECTION_FAILED" }));
    }
    Json(json!({ "ok": true }))
}

async fn spawn_server(state: AppState) -> SocketAddr {
    let app = Router::new()
        .route("/token", post(token))
        .route("/uploads/:id/start-upload", get(start_upload))
        .route("/uploads/:id/get-upload-url", get(upload_url))
        .route("/uploads/:id/complete-upload", post(complete_upload))
        .route("/uploads/:id/abort-upload", post(abort_upload))
        .route("/part/:n", put(put_part))
        // Full-size parts exceed axum's default request body cap.
        .layer(axum::extract::DefaultBodyLimit::max(PART_SIZE + 1024))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    *state.addr.lock().unwrap() = Some(addr);
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn test_config(addr: SocketAddr) -> Config {
    Config {
        api_gateway_url: format!("http://{addr}"),
        access_token_url: format!("http://{addr}/token"),
        platform_access_token_url: format!("http://{addr}/platform-token"),
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
    }
}

fn creds() -> Credentials {
    Credentials {
        client_id: "id".into(),
        client_secret: "secret".into(),
        mode: AuthMode::Standard,
        scope: "aps".into(),
    }
}

#[tokio::test]
async fn chunks_reassemble_byte_for_byte() {
    let state = Arc::new(Shared::default());
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    let len = 2 * PART_SIZE + 1234;
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("demo.apk");
    std::fs::write(&file, &data).unwrap();

    assert!(api.multipart_upload("b-1", &file, None).await);

    let parts = state.parts.lock().unwrap();
    assert_eq!(parts.len(), 3);
    // Every part except the last is exactly the fixed size, numbered from 1.
    assert_eq!(parts[0].0, 1);
    assert_eq!(parts[0].1.len(), PART_SIZE);
    assert_eq!(parts[1].0, 2);
    assert_eq!(parts[1].1.len(), PART_SIZE);
    assert_eq!(parts[2].0, 3);
    assert_eq!(parts[2].1.len(), 1234);
    let reassembled: Vec<u8> = parts.iter().flat_map(|(_, d)| d.clone()).collect();
    assert_eq!(reassembled, data);

    let completes = state.complete_bodies.lock().unwrap();
    assert_eq!(completes.len(), 1);
    let listed = completes[0]["parts"].as_array().unwrap();
    assert_eq!(listed.len(), 3);
    for (i, part) in listed.iter().enumerate() {
        assert_eq!(part["PartNumber"], (i + 1) as u64);
        assert_eq!(part["ETag"], format!("\"etag-{}\"", i + 1));
    }
    assert_eq!(completes[0]["uploadId"], "u-77");
    assert!(state.abort_bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn part_failure_aborts_exactly_once_with_session_ids() {
    let state = Arc::new(Shared::default());
    state.fail_parts.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("demo.apk");
    std::fs::write(&file, b"payload").unwrap();

    assert!(!api.multipart_upload("b-2", &file, None).await);

    let aborts = state.abort_bodies.lock().unwrap();
    assert_eq!(aborts.len(), 1);
    assert_eq!(aborts[0]["uploadId"], "u-77");
    assert_eq!(aborts[0]["uploadName"], "demo.apk");
    assert!(state.complete_bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn start_failure_never_aborts() {
    let state = Arc::new(Shared::default());
    state.fail_start.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("demo.apk");
    std::fs::write(&file, b"payload").unwrap();

    assert!(!api.multipart_upload("b-3", &file, None).await);
    assert_eq!(state.starts.load(Ordering::SeqCst), 1);
    assert!(state.abort_bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn abort_is_idempotent_at_the_client_boundary() {
    let state = Arc::new(Shared::default());
    state.abort_with_service_error.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    // A rejected abort (already aborted server side) is reported Ok, so
    // repeating the call is harmless.
    api.upload_abort("b-4", "u-77", "demo.apk", None).await.unwrap();
    api.upload_abort("b-4", "u-77", "demo.apk", None).await.unwrap();
    assert_eq!(state.abort_bodies.lock().unwrap().len(), 2);
}
