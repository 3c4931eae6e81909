//! In-memory job status store.
//!
//! The real hosting runtime owns job state; this store exists only so the
//! local emulation can answer `/status/{id}` for jobs submitted through
//! `/run`. State lives for the lifetime of the process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use snapgen_worker::response::JobResponse;

/// Lifecycle states reported to clients, matching the platform's strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::InQueue => "IN_QUEUE",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// One tracked job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub status: JobStatus,
    /// The terminal response, once the job finished either way.
    pub response: Option<JobResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe map of job ID to record.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly accepted job.
    pub async fn insert_queued(&self, id: &str) {
        let now = Utc::now();
        self.jobs.write().await.insert(
            id.to_string(),
            JobRecord {
                status: JobStatus::InQueue,
                response: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Transition a job to `IN_PROGRESS`.
    pub async fn mark_running(&self, id: &str) {
        if let Some(record) = self.jobs.write().await.get_mut(id) {
            record.status = JobStatus::InProgress;
            record.updated_at = Utc::now();
        }
    }

    /// Record a job's terminal response, deriving the final status from it.
    pub async fn complete(&self, id: &str, response: JobResponse) {
        if let Some(record) = self.jobs.write().await.get_mut(id) {
            record.status = if response.is_error() {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };
            record.response = Some(response);
            record.updated_at = Utc::now();
        }
    }

    /// Look up a job by ID.
    pub async fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(id).cloned()
    }
}
