//! Router construction and request handlers.
//!
//! [`build_router`] is used by both the production binary and the
//! integration tests so both exercise the same middleware stack.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use snapgen_worker::response::JobResponse;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::jobs::JobStatus;
use crate::state::AppState;

/// Build the application [`Router`] with all middleware layers.
///
/// The middleware stack mirrors the platform's ingress: CORS, request ID
/// stamping and propagation, structured tracing, a request timeout, and
/// panic recovery.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health))
        .route("/run", post(run))
        .route("/runsync", post(runsync))
        .route("/status/{id}", get(status))
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /health` -- verify the backing ComfyUI instance is reachable.
async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state
        .handler
        .probe_server()
        .await
        .map_err(|e| AppError::ServiceUnavailable(format!("ComfyUI disconnected: {e}")))?;

    Ok(Json(json!({"status": "healthy", "comfyui": "connected"})))
}

/// `POST /run` -- accept a job, process it in the background, return its ID.
async fn run(State(state): State<AppState>, Json(body): Json<Value>) -> AppResult<Json<Value>> {
    let input = extract_input(&body)?;
    let job_id = uuid::Uuid::new_v4().to_string();

    state.jobs.insert_queued(&job_id).await;
    tracing::info!(job_id, "Accepted async job");

    let handler = Arc::clone(&state.handler);
    let jobs = Arc::clone(&state.jobs);
    let id = job_id.clone();
    tokio::spawn(async move {
        jobs.mark_running(&id).await;
        let response = handler.handle(&id, &input).await;
        jobs.complete(&id, response).await;
    });

    Ok(Json(json!({
        "id": job_id,
        "status": JobStatus::InQueue.as_str(),
    })))
}

/// `POST /runsync` -- process a job inline and return its terminal response.
async fn runsync(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Json<JobResponse>> {
    let input = extract_input(&body)?;
    let job_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(job_id, "Accepted sync job");

    let response = state.handler.handle(&job_id, &input).await;
    Ok(Json(response))
}

/// `GET /status/{id}` -- report a tracked job's state and terminal payload.
async fn status(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    let record = state
        .jobs
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;

    let mut body = json!({
        "id": id,
        "status": record.status.as_str(),
        "created_at": record.created_at,
        "updated_at": record.updated_at,
    });

    match record.response {
        Some(JobResponse::Output { output }) => {
            body["output"] = serde_json::to_value(output)
                .map_err(|e| AppError::Internal(format!("Serializing job output: {e}")))?;
        }
        Some(JobResponse::Error { error }) => {
            body["error"] = Value::String(error);
        }
        None => {}
    }

    Ok(Json(body))
}

/// The platform envelope: `{"input": {...}}`.
fn extract_input(body: &Value) -> Result<Value, AppError> {
    let Some(input) = body.get("input") else {
        return Err(AppError::BadRequest(
            "'input' is required in request body".into(),
        ));
    };
    if !input.is_object() {
        return Err(AppError::BadRequest("'input' must be an object".into()));
    }
    Ok(input.clone())
}
