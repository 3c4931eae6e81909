//! ComfyUI WebSocket message types and parser.
//!
//! ComfyUI sends JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. This module deserializes them into
//! a strongly-typed [`ComfyMessage`] enum.

use serde::Deserialize;

/// All known ComfyUI WebSocket message types.
///
/// Deserialized via the internally-tagged `"type"` field with associated
/// `"data"` content.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyMessage {
    /// Server status broadcast (queue depth, etc.).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A prompt has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Some nodes were skipped because their outputs are cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A specific node is currently executing (or execution finished when `node` is `None`).
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Progress update from a long-running node (e.g. KSampler).
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node has finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// The whole prompt finished successfully.
    #[serde(rename = "execution_success")]
    ExecutionSuccess(ExecutionSuccessData),

    /// Execution was interrupted before completion.
    #[serde(rename = "execution_interrupted")]
    ExecutionInterrupted(ExecutionInterruptedData),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

/// Queue status information.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

/// Current queue state.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

/// Execution queue statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

/// Payload for `execution_start` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

/// Payload for `execution_cached` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    /// Node IDs whose outputs were served from cache.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `executing` messages.
///
/// When `node` is `None`, execution of the prompt has completed.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload for `progress` messages (step-level progress within a node).
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
    /// The prompt this progress belongs to, when the server includes it.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// The node reporting progress, when included.
    #[serde(default)]
    pub node: Option<String>,
}

impl ProgressData {
    /// Completion fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.max > 0 {
            f64::from(self.value) / f64::from(self.max)
        } else {
            0.0
        }
    }
}

/// Payload for `executed` messages (node output).
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    /// The node that produced this output.
    pub node: String,
    /// Raw output value (images, filenames, etc.).
    pub output: serde_json::Value,
    pub prompt_id: String,
}

/// Payload for `execution_success` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSuccessData {
    pub prompt_id: String,
}

/// Payload for `execution_interrupted` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionInterruptedData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Payload for `execution_error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    pub node_id: String,
    #[serde(default)]
    pub node_type: Option<String>,
    pub exception_message: String,
    pub exception_type: String,
}

impl ErrorData {
    /// Human-readable error detail surfaced to the job submitter.
    pub fn detail(&self) -> String {
        format!(
            "Node Type: {}, Node ID: {}, Message: {}",
            self.node_type.as_deref().unwrap_or(&self.exception_type),
            self.node_id,
            self.exception_message,
        )
    }
}

/// Parse a ComfyUI WebSocket text message into a typed enum.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// should log unknown types and continue.
pub fn parse_message(text: &str) -> Result<ComfyMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_message() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":3}}}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::Status(data) => {
                assert_eq!(data.status.exec_info.queue_remaining, 3);
            }
            other => panic!("Expected Status, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_start_message() {
        let json = r#"{"type":"execution_start","data":{"prompt_id":"abc-123"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::ExecutionStart(data) => {
                assert_eq!(data.prompt_id, "abc-123");
            }
            other => panic!("Expected ExecutionStart, got {other:?}"),
        }
    }

    #[test]
    fn parse_executing_with_node() {
        let json = r#"{"type":"executing","data":{"node":"42","prompt_id":"xyz"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::Executing(data) => {
                assert_eq!(data.node.as_deref(), Some("42"));
                assert_eq!(data.prompt_id, "xyz");
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn parse_executing_finished() {
        let json = r#"{"type":"executing","data":{"node":null,"prompt_id":"xyz"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::Executing(data) => {
                assert!(data.node.is_none());
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_message_without_prompt_id() {
        let json = r#"{"type":"progress","data":{"value":5,"max":20}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::Progress(data) => {
                assert_eq!(data.value, 5);
                assert_eq!(data.max, 20);
                assert!(data.prompt_id.is_none());
                assert!((data.fraction() - 0.25).abs() < f64::EPSILON);
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn progress_fraction_handles_zero_max() {
        let json = r#"{"type":"progress","data":{"value":5,"max":0}}"#;
        match parse_message(json).unwrap() {
            ComfyMessage::Progress(data) => assert_eq!(data.fraction(), 0.0),
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_success_message() {
        let json = r#"{"type":"execution_success","data":{"prompt_id":"abc"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::ExecutionSuccess(data) => assert_eq!(data.prompt_id, "abc"),
            other => panic!("Expected ExecutionSuccess, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_error_message() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"abc","node_id":"5","node_type":"KSampler","exception_message":"out of memory","exception_type":"RuntimeError"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyMessage::ExecutionError(data) => {
                assert_eq!(data.prompt_id, "abc");
                assert_eq!(data.node_id, "5");
                let detail = data.detail();
                assert!(detail.contains("KSampler"));
                assert!(detail.contains("out of memory"));
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn error_detail_falls_back_to_exception_type() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"abc","node_id":"5","exception_message":"boom","exception_type":"RuntimeError"}}"#;
        match parse_message(json).unwrap() {
            ComfyMessage::ExecutionError(data) => {
                assert!(data.detail().contains("RuntimeError"));
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        let json = r#"{"type":"unknown_thing","data":{}}"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
    }
}
