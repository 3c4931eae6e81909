//! The job hosting contract: exactly one of `{output}` or `{error}`.

use serde::Serialize;
use snapgen_outputs::JobOutput;

/// Terminal response for one job.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobResponse {
    /// The job succeeded; finalized assets grouped by kind.
    Output { output: JobOutput },
    /// The job failed; a single human-readable message.
    Error { error: String },
}

impl JobResponse {
    pub fn output(output: JobOutput) -> Self {
        JobResponse::Output { output }
    }

    pub fn error(message: impl Into<String>) -> Self {
        JobResponse::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JobResponse::Error { .. })
    }

    /// The error message, when this is an error response.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobResponse::Error { error } => Some(error),
            JobResponse::Output { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_serializes_under_the_output_key() {
        let response = JobResponse::output(JobOutput::default());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"output": {"images": [], "videos": []}}));
    }

    #[test]
    fn error_serializes_under_the_error_key() {
        let response = JobResponse::error("boom");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"error": "boom"}));
    }
}
