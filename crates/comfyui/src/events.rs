//! Execution events emitted by the monitor.
//!
//! These are the high-level state changes a job submitter cares about,
//! produced by the monitor loop after interpreting raw WebSocket messages.
//! Per submission the sequence is: `Queued`, then zero or more
//! `Executing`/`Progress`, then exactly one terminal event.

use serde::Serialize;

/// A high-level event for one in-flight workflow submission.
#[derive(Debug, Clone, Serialize)]
pub enum ExecutionEvent {
    /// The submission was accepted into the execution queue.
    Queued,

    /// A specific node is executing.
    Executing {
        /// Node ID within the workflow graph.
        node: String,
    },

    /// Step-level progress within a long-running node.
    Progress {
        /// Completion fraction in `[0, 1]`.
        fraction: f64,
    },

    /// The workflow completed successfully. Terminal.
    Completed,

    /// The workflow failed. Terminal.
    Failed {
        /// Upstream error detail (node type/id and exception message).
        detail: String,
    },
}

impl ExecutionEvent {
    /// Whether this event ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionEvent::Completed | ExecutionEvent::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(ExecutionEvent::Completed.is_terminal());
        assert!(ExecutionEvent::Failed { detail: "x".into() }.is_terminal());
        assert!(!ExecutionEvent::Queued.is_terminal());
        assert!(!ExecutionEvent::Executing { node: "1".into() }.is_terminal());
        assert!(!ExecutionEvent::Progress { fraction: 0.5 }.is_terminal());
    }
}
