//! Shared application state.

use std::sync::Arc;

use snapgen_worker::handler::JobHandler;

use crate::jobs::JobStore;

/// State available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The job orchestrator shared by `/run` and `/runsync`.
    pub handler: Arc<JobHandler>,
    /// In-memory store backing `/status/{id}`.
    pub jobs: Arc<JobStore>,
}
