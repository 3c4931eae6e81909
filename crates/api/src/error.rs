//! Application-level error type for HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced by the API layer.
///
/// Implements [`IntoResponse`] to produce consistent `{error, code}` JSON
/// bodies. Note that a job's own failure is not an `AppError` -- the
/// handler converts it to a `{error}` payload inside a 200 response, per
/// the hosting contract.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request envelope is malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The referenced job does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The backing ComfyUI instance is unreachable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
