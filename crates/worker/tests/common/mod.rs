//! Stub ComfyUI server and fixtures for handler scenario tests.

use std::future::IntoFuture;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use snapgen_core::config::WorkerConfig;

/// Prompt ID the stub assigns to every submission.
pub const PROMPT_ID: &str = "stub-prompt-1";

/// Per-endpoint request counters, for asserting which upstream calls ran.
#[derive(Default)]
pub struct Hits {
    pub stats: AtomicU32,
    pub upload: AtomicU32,
    pub prompt: AtomicU32,
    pub history: AtomicU32,
}

pub struct StubOptions {
    /// Whether `/system_stats` answers 200.
    pub stats_ok: bool,
    /// Messages the WebSocket endpoint plays back to each client.
    pub ws_script: Vec<Value>,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            stats_ok: true,
            ws_script: completion_script(),
        }
    }
}

/// A normal run: start, one node, progress, then completion.
pub fn completion_script() -> Vec<Value> {
    vec![
        json!({"type": "execution_start", "data": {"prompt_id": PROMPT_ID}}),
        json!({"type": "executing", "data": {"prompt_id": PROMPT_ID, "node": "3"}}),
        json!({"type": "progress", "data": {"value": 1, "max": 2, "prompt_id": PROMPT_ID}}),
        json!({"type": "executing", "data": {"prompt_id": PROMPT_ID, "node": null}}),
    ]
}

/// A run that dies in a sampler node with the given message.
pub fn error_script(message: &str) -> Vec<Value> {
    vec![
        json!({"type": "executing", "data": {"prompt_id": PROMPT_ID, "node": "5"}}),
        json!({"type": "execution_error", "data": {
            "prompt_id": PROMPT_ID,
            "node_id": "5",
            "node_type": "KSampler",
            "exception_message": message,
            "exception_type": "RuntimeError",
        }}),
    ]
}

struct StubState {
    hits: Arc<Hits>,
    options: StubOptions,
}

pub struct StubComfy {
    pub api_url: String,
    pub ws_url: String,
    pub hits: Arc<Hits>,
}

pub async fn spawn_stub(options: StubOptions) -> StubComfy {
    let hits = Arc::new(Hits::default());
    let state = Arc::new(StubState {
        hits: Arc::clone(&hits),
        options,
    });

    let app = Router::new()
        .route("/system_stats", get(system_stats))
        .route("/upload/image", post(upload_image))
        .route("/prompt", post(submit_prompt))
        .route("/history/{id}", get(history))
        .route("/view", get(view))
        .route("/ws", get(ws_upgrade))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());

    StubComfy {
        api_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}"),
        hits,
    }
}

async fn system_stats(State(state): State<Arc<StubState>>) -> axum::response::Response {
    state.hits.stats.fetch_add(1, Ordering::SeqCst);
    if state.options.stats_ok {
        Json(json!({"system": {"os": "stub"}})).into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "not ready").into_response()
    }
}

async fn upload_image(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.hits.upload.fetch_add(1, Ordering::SeqCst);
    Json(json!({"name": "uploaded.png", "subfolder": "", "type": "input"}))
}

async fn submit_prompt(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.hits.prompt.fetch_add(1, Ordering::SeqCst);
    Json(json!({"prompt_id": PROMPT_ID, "number": 1}))
}

async fn history(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.hits.history.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        PROMPT_ID: {
            "status": {"status_str": "success", "completed": true},
            "outputs": {
                "9": {"images": [{"filename": "out_00001_.png", "subfolder": "", "type": "output"}]}
            },
        }
    }))
}

async fn view() -> Vec<u8> {
    b"stub image bytes".to_vec()
}

async fn ws_upgrade(
    State(state): State<Arc<StubState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let script = state.options.ws_script.clone();
    ws.on_upgrade(move |mut socket| async move {
        for message in script {
            if socket
                .send(Message::Text(message.to_string().into()))
                .await
                .is_err()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Hold the socket open so the client drains the script before any
        // close frame arrives.
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
}

/// Worker config pointing at the stub, with floors disabled and short
/// polling budgets so failures surface quickly.
pub fn worker_config(stub: &StubComfy, templates_dir: &Path) -> WorkerConfig {
    WorkerConfig {
        api_url: stub.api_url.clone(),
        ws_url: stub.ws_url.clone(),
        templates_dir: templates_dir.to_path_buf(),
        job_timeout: Duration::from_secs(5),
        server_probe_attempts: 2,
        server_probe_interval: Duration::from_millis(10),
        history_attempts: 5,
        history_delay: Duration::from_millis(10),
        ws_reconnect_attempts: 2,
        min_available_memory_bytes: 0,
        min_free_disk_bytes: 0,
        disk_check_path: "/".into(),
        s3: None,
    }
}

/// Write the catalog entries the scenarios use into `dir`.
pub fn write_templates(dir: &Path) {
    let video = json!({
        "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "{{ VIDEO_PROMPT }}"}},
        "2": {"class_type": "LoadImage", "inputs": {"image": "{{ INPUT_IMAGE }}"}},
        "3": {"class_type": "WanImageToVideo", "inputs": {"width": 0, "height": 0, "length": 0}},
        "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ComfyUI"}},
    });
    std::fs::write(
        dir.join("video_wan2_2_14B_i2v.json"),
        serde_json::to_string_pretty(&video).unwrap(),
    )
    .unwrap();

    let drawing = json!({
        "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "{{ IMAGE_PROMPT }}"}},
        "2": {"class_type": "EmptySD3LatentImage", "inputs": {"width": 0, "height": 0}},
        "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ComfyUI"}},
    });
    std::fs::write(
        dir.join("crayon-drawing.json"),
        serde_json::to_string_pretty(&drawing).unwrap(),
    )
    .unwrap();
}

/// A valid 2x2 PNG, base64-encoded, as a job would submit it.
pub fn test_image_base64() -> String {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([128, 64, 32]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    STANDARD.encode(bytes)
}
