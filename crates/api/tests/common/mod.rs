//! Shared helpers for API integration tests.
//!
//! Mirrors the router construction in `main.rs` so integration tests
//! exercise the same middleware stack (CORS, request ID, timeout, panic
//! recovery) that production uses.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use snapgen_api::config::ServerConfig;
use snapgen_api::jobs::JobStore;
use snapgen_api::routes::build_router;
use snapgen_api::state::AppState;
use snapgen_core::config::WorkerConfig;
use snapgen_worker::handler::JobHandler;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
    }
}

/// Worker config pointing at a dead ComfyUI port.
///
/// Envelope and validation tests never reach the upstream; connectivity
/// tests fail fast with a single probe attempt.
pub fn dead_comfy_config() -> WorkerConfig {
    WorkerConfig {
        api_url: "http://127.0.0.1:1".into(),
        ws_url: "ws://127.0.0.1:1".into(),
        templates_dir: PathBuf::from("does-not-exist"),
        job_timeout: Duration::from_secs(2),
        server_probe_attempts: 1,
        server_probe_interval: Duration::from_millis(1),
        history_attempts: 1,
        history_delay: Duration::from_millis(1),
        ws_reconnect_attempts: 1,
        min_available_memory_bytes: 0,
        min_free_disk_bytes: 0,
        disk_check_path: "/".into(),
        s3: None,
    }
}

/// Build the full application router backed by a dead ComfyUI config.
pub async fn build_test_app() -> Router {
    let handler = Arc::new(JobHandler::from_config(dead_comfy_config()).await);
    let state = AppState {
        handler,
        jobs: Arc::new(JobStore::new()),
    };
    build_router(state, &test_server_config())
}

/// Issue a GET request against the in-process router.
pub async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Issue a POST request with a JSON body against the in-process router.
pub async fn post_json(app: Router, uri: &str, body: &Value) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
