//! Protection workflow scenarios against a mock backend: polling to the
//! terminal states, compensation on early failures, and the settle delay on
//! eventually consistent list calls.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use aegis_cli::api::{AuthMode, Credentials, ProtectApi};
use aegis_cli::config::Config;

#[derive(Default)]
struct Shared {
    status_calls: AtomicUsize,
    protect_starts: AtomicUsize,
    deletes: AtomicUsize,
    aborts: AtomicUsize,
    app_bodies: Mutex<Vec<Value>>,
    fail_protect_start: AtomicBool,
    fail_add_application: AtomicBool,
    fail_parts: AtomicBool,
    terminal_state: Mutex<String>,
    addr: Mutex<Option<SocketAddr>>,
}

type AppState = Arc<Shared>;

async fn token() -> Json<Value> {
    let expiry = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    Json(json!({ "token": "tok", "expiry": expiry }))
}

async fn create_build(State(_s): State<AppState>) -> Json<Value> {
    Json(json!({ "id": "b-9", "applicationPackageId": "com.example.app", "state": "added" }))
}

async fn build_by_id(
    State(s): State<AppState>,
    Path(_id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    if q.contains_key("cmd") {
        s.protect_starts.fetch_add(1, Ordering::SeqCst);
        if s.fail_protect_start.load(Ordering::SeqCst) {
            return Json(json!({ "errorMessage": "START_PROTECTION_FAILED" }));
        }
        return Json(json!({ "state": "protect_queue" }));
    }
    let n = s.status_calls.fetch_add(1, Ordering::SeqCst);
    let terminal = s.terminal_state.lock().unwrap().clone();
    match n {
        0 => Json(json!({ "state": "protect_queue" })),
        1 => Json(json!({ "state": "protect_in_progress", "progressData": { "progress": "42%" } })),
        _ => Json(json!({ "state": terminal })),
    }
}

async fn delete_build(State(s): State<AppState>, Path(_id): Path<String>) -> Json<Value> {
    s.deletes.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "ok": true }))
}

async fn list_builds() -> Json<Value> {
    Json(json!([]))
}

async fn set_metadata() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn attach() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn list_applications() -> Json<Value> {
    Json(json!([]))
}

async fn add_application(State(s): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    s.app_bodies.lock().unwrap().push(body);
    if s.fail_add_application.load(Ordering::SeqCst) {
        return Json(json!({ "errorMessage": "ERROR_APPLICATION_LIMIT_EXCEEDED" }));
    }
    Json(json!({ "id": "a-1", "applicationPackageId": "com.example.app", "os": "android" }))
}

async fn start_upload() -> Json<Value> {
    Json(json!({ "UploadId": "u-1" }))
}

async fn upload_url(State(s): State<AppState>, Query(q): Query<HashMap<String, String>>) -> String {
    let addr = s.addr.lock().unwrap().unwrap();
    format!("http://{addr}/part/{}", q.get("partNumber").cloned().unwrap_or_default())
}

async fn put_part(State(s): State<AppState>, Path(n): Path<u64>, _body: Bytes) -> impl IntoResponse {
    if s.fail_parts.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, [(header::ETAG, String::new())], "").into_response();
    }
    (StatusCode::OK, [(header::ETAG, format!("\"etag-{n}\""))], "").into_response()
}

async fn complete_upload() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn abort_upload(State(s): State<AppState>) -> Json<Value> {
    s.aborts.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "ok": true }))
}

async fn spawn_server(state: AppState) -> SocketAddr {
    let app = Router::new()
        .route("/token", post(token))
        .route("/builds", post(create_build).get(list_builds))
        .route("/builds/:id", get(build_by_id).patch(build_by_id).delete(delete_build))
        .route("/builds/:id/metadata", put(set_metadata))
        .route("/builds/:id/app", put(attach))
        .route("/applications", get(list_applications).post(add_application))
        .route("/uploads/:id/start-upload", get(start_upload))
        .route("/uploads/:id/get-upload-url", get(upload_url))
        .route("/uploads/:id/complete-upload", post(complete_upload))
        .route("/uploads/:id/abort-upload", post(abort_upload))
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

fn new_state(terminal: &str) -> AppState {
    let state = Arc::new(Shared::default());
    *state.terminal_state.lock().unwrap() = terminal.to_string();
    state
}

#[tokio::test]
async fn polling_runs_until_protect_done() {
    let state = new_state("protect_done");
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    assert!(api.protect_build("b-9").await.unwrap());
    // queue, in_progress, then the terminal read.
    assert_eq!(state.status_calls.load(Ordering::SeqCst), 3);
    assert_eq!(state.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_protect_start_deletes_the_build() {
    let state = new_state("protect_done");
    state.fail_protect_start.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    assert!(!api.protect_build("b-9").await.unwrap());
    assert_eq!(state.status_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_terminal_state_keeps_the_build() {
    let state = new_state("protect_failed");
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    assert!(!api.protect_build("b-9").await.unwrap());
    assert_eq!(state.status_calls.load(Ordering::SeqCst), 3);
    // Past protect-start nothing compensates; the build stays for inspection.
    assert_eq!(state.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_failure_compensates_and_stops() {
    let state = new_state("protect_done");
    state.fail_parts.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("demo.apk");
    write_apk(&file);

    assert!(!api.protect(&file, None, None, None).await.unwrap());
    assert_eq!(state.aborts.load(Ordering::SeqCst), 1);
    assert_eq!(state.deletes.load(Ordering::SeqCst), 1);
    // The workflow stops before ever requesting protection.
    assert_eq!(state.protect_starts.load(Ordering::SeqCst), 0);
    assert_eq!(state.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_application_create_compensates_the_build() {
    let state = new_state("protect_done");
    state.fail_add_application.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("demo.apk");
    write_apk(&file);

    assert!(!api.protect(&file, None, None, None).await.unwrap());
    // The build created in step one is cleaned up, nothing later runs.
    assert_eq!(state.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(state.protect_starts.load(Ordering::SeqCst), 0);
    assert_eq!(state.aborts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_application_is_created_with_permissive_defaults() {
    let state = new_state("protect_done");
    state.fail_parts.store(true, Ordering::SeqCst);
    let addr = spawn_server(state.clone()).await;
    let mut api = ProtectApi::connect(test_config(addr), creds()).await.unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("demo.apk");
    write_apk(&file);

    api.protect(&file, None, None, None).await.unwrap();

    let bodies = state.app_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let app = &bodies[0];
    assert_eq!(app["applicationName"], "com.example.app");
    assert_eq!(app["applicationPackageId"], "com.example.app");
    assert_eq!(app["os"], "android");
    assert_eq!(app["permissionPrivate"], false);
    assert_eq!(app["permissionUpload"], true);
    assert_eq!(app["permissionDelete"], true);
}

#[tokio::test]
async fn settle_delay_applies_only_to_list_queries() {
    let state = new_state("protect_done");
    let addr = spawn_server(state.clone()).await;
    let mut cfg = test_config(addr);
    cfg.settle_delay = Duration::from_millis(300);
    let mut api = ProtectApi::connect(cfg, creds()).await.unwrap();

    let started = Instant::now();
    api.list_builds(None, None, None).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));

    let started = Instant::now();
    api.list_builds(None, Some("b-9"), None).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(200));
}

fn write_apk(path: &std::path::Path) {
    use std::io::Write;
    let file = std::fs::File::create(path).unwrap();
    let mut zw = zip::ZipWriter::new(file);
    zw.start_file("AndroidManifest.xml", zip::write::FileOptions::default()).unwrap();
    zw.write_all(b"manifest").unwrap();
    zw.finish().unwrap();
}
