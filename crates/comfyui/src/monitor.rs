//! Per-submission monitor loop.
//!
//! Reads raw frames from a ComfyUI WebSocket session, parses them into
//! typed [`ComfyMessage`] variants, and forwards the high-level
//! [`ExecutionEvent`]s for one prompt to the caller over an mpsc channel.
//! The sequence always ends with exactly one terminal event.
//!
//! Dropped connections are retried with bounded exponential backoff. The
//! prompt may have finished while the channel was down, so every
//! reconnection is followed by a single history probe before resuming the
//! stream -- reconnection never restarts or re-submits the job itself.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::api::ComfyApi;
use crate::client::{ClientError, ComfyClient, ComfySession};
use crate::events::ExecutionEvent;
use crate::messages::{parse_message, ComfyMessage};
use crate::reconnect::{reconnect_with_backoff, ReconnectConfig};

/// Tunables for one monitor run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Overall bound on the wait for a terminal event.
    pub timeout: Duration,
    /// Backoff policy for channel-drop recovery.
    pub reconnect: ReconnectConfig,
}

/// Errors from the monitor loop.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The initial WebSocket connection could not be established.
    #[error(transparent)]
    Connect(#[from] ClientError),

    /// The channel dropped and could not be re-established.
    #[error("WebSocket connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },

    /// ComfyUI reported a workflow execution error.
    #[error("Workflow execution error: {0}")]
    ExecutionFailed(String),

    /// No terminal event arrived within the configured timeout.
    #[error("No terminal event within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Monitor one submission until its terminal event.
///
/// Emits [`ExecutionEvent`]s for `prompt_id` on `events` as they arrive;
/// the caller consumes them incrementally while this future is pending.
/// Returns `Ok(())` when the workflow completes, or the error that ended
/// monitoring. In both cases the event sequence has been terminated with
/// exactly one terminal event before this function returns.
pub async fn monitor(
    session: ComfySession,
    client: &ComfyClient,
    api: &ComfyApi,
    prompt_id: &str,
    config: &MonitorConfig,
    events: mpsc::Sender<ExecutionEvent>,
) -> Result<(), MonitorError> {
    match tokio::time::timeout(
        config.timeout,
        monitor_inner(session, client, api, prompt_id, &config.reconnect, &events),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(
                prompt_id,
                timeout_secs = config.timeout.as_secs(),
                "Monitor timed out waiting for terminal event",
            );
            Err(MonitorError::Timeout(config.timeout))
        }
    }
}

async fn monitor_inner(
    mut session: ComfySession,
    client: &ComfyClient,
    api: &ComfyApi,
    prompt_id: &str,
    reconnect: &ReconnectConfig,
    events: &mpsc::Sender<ExecutionEvent>,
) -> Result<(), MonitorError> {
    let client_id = session.client_id.clone();
    emit(events, ExecutionEvent::Queued).await;

    loop {
        let dropped = match session.ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                match interpret(&text, prompt_id) {
                    Step::Skip => {}
                    Step::Emit(event) => emit(events, event).await,
                    Step::Completed => {
                        tracing::info!(prompt_id, "Workflow completed");
                        emit(events, ExecutionEvent::Completed).await;
                        return Ok(());
                    }
                    Step::Failed(detail) => {
                        tracing::error!(prompt_id, detail = %detail, "Workflow execution error");
                        emit(events, ExecutionEvent::Failed { detail: detail.clone() }).await;
                        return Err(MonitorError::ExecutionFailed(detail));
                    }
                }
                false
            }
            Some(Ok(Message::Binary(_))) => {
                // ComfyUI sends binary frames for preview images. Ignored.
                tracing::trace!(prompt_id, "Ignoring binary message (preview image)");
                false
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
                false
            }
            Some(Ok(Message::Frame(_))) => false,
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(prompt_id, ?frame, "ComfyUI WebSocket closed");
                true
            }
            Some(Err(e)) => {
                tracing::warn!(prompt_id, error = %e, "WebSocket receive error");
                true
            }
            None => {
                tracing::info!(prompt_id, "WebSocket stream ended");
                true
            }
        };

        if dropped {
            match resume(client, api, prompt_id, &client_id, reconnect).await? {
                Resumed::Session(new_session) => session = new_session,
                Resumed::AlreadyComplete => {
                    emit(events, ExecutionEvent::Completed).await;
                    return Ok(());
                }
            }
        }
    }
}

/// What to do with one parsed text frame.
enum Step {
    Skip,
    Emit(ExecutionEvent),
    Completed,
    Failed(String),
}

/// Map a raw text frame onto the event alphabet for `prompt_id`.
///
/// Messages for other prompts and unknown message types are skipped.
fn interpret(text: &str, prompt_id: &str) -> Step {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, raw_message = %text, "Skipping unparseable message");
            return Step::Skip;
        }
    };

    match msg {
        ComfyMessage::Executing(data) if data.prompt_id == prompt_id => match data.node {
            Some(node) => {
                tracing::debug!(prompt_id, node = %node, "Executing node");
                Step::Emit(ExecutionEvent::Executing { node })
            }
            // node == None means execution is complete for this prompt.
            None => Step::Completed,
        },
        ComfyMessage::ExecutionSuccess(data) if data.prompt_id == prompt_id => Step::Completed,
        ComfyMessage::ExecutionError(data) if data.prompt_id == prompt_id => {
            Step::Failed(data.detail())
        }
        ComfyMessage::ExecutionInterrupted(data) if data.prompt_id == prompt_id => {
            Step::Failed(format!(
                "Execution interrupted at node {}",
                data.node_id.as_deref().unwrap_or("<unknown>"),
            ))
        }
        ComfyMessage::Progress(data)
            if data.prompt_id.as_deref().map_or(true, |p| p == prompt_id) =>
        {
            Step::Emit(ExecutionEvent::Progress {
                fraction: data.fraction(),
            })
        }
        ComfyMessage::ExecutionStart(data) if data.prompt_id == prompt_id => {
            tracing::info!(prompt_id, "Execution started");
            Step::Skip
        }
        ComfyMessage::ExecutionCached(data) if data.prompt_id == prompt_id => {
            tracing::debug!(prompt_id, cached_nodes = data.nodes.len(), "Execution used cache");
            Step::Skip
        }
        ComfyMessage::Executed(data) if data.prompt_id == prompt_id => {
            // Outputs are per-node; completion is signaled separately.
            tracing::debug!(prompt_id, node = %data.node, "Node executed with output");
            Step::Skip
        }
        ComfyMessage::Status(data) => {
            tracing::debug!(
                queue_remaining = data.status.exec_info.queue_remaining,
                "ComfyUI queue status",
            );
            Step::Skip
        }
        _ => Step::Skip,
    }
}

/// Outcome of a channel-drop recovery.
enum Resumed {
    /// Reconnected; keep streaming on this session.
    Session(ComfySession),
    /// The history record shows the prompt finished while we were away.
    AlreadyComplete,
}

/// Reconnect after a drop, then probe history once for events missed
/// while disconnected.
async fn resume(
    client: &ComfyClient,
    api: &ComfyApi,
    prompt_id: &str,
    client_id: &str,
    config: &ReconnectConfig,
) -> Result<Resumed, MonitorError> {
    tracing::warn!(prompt_id, "WebSocket connection lost, attempting to reconnect");

    let Some(session) = reconnect_with_backoff(client, client_id, config).await else {
        return Err(MonitorError::ConnectionLost {
            attempts: config.max_attempts,
        });
    };

    match probe_history(api, prompt_id).await {
        HistoryState::Completed => {
            tracing::info!(prompt_id, "Prompt completed while disconnected");
            Ok(Resumed::AlreadyComplete)
        }
        HistoryState::Failed(detail) => Err(MonitorError::ExecutionFailed(detail)),
        HistoryState::Pending => Ok(Resumed::Session(session)),
    }
}

enum HistoryState {
    Pending,
    Completed,
    Failed(String),
}

/// Single history lookup to classify a prompt's state after a reconnect.
///
/// Probe failures are treated as "still pending" -- the resumed stream
/// remains the source of truth.
async fn probe_history(api: &ComfyApi, prompt_id: &str) -> HistoryState {
    let history = match api.history(prompt_id).await {
        Ok(history) => history,
        Err(e) => {
            tracing::debug!(prompt_id, error = %e, "History probe failed");
            return HistoryState::Pending;
        }
    };

    let Some(record) = history.get(prompt_id) else {
        return HistoryState::Pending;
    };

    if let Some(status) = record.get("status") {
        if status.get("status_str").and_then(serde_json::Value::as_str) == Some("error") {
            return HistoryState::Failed(
                "Execution error reported by history while monitor was disconnected".into(),
            );
        }
        if status.get("completed").and_then(serde_json::Value::as_bool) == Some(true) {
            return HistoryState::Completed;
        }
    }

    let has_outputs = record
        .get("outputs")
        .and_then(serde_json::Value::as_object)
        .map(|outputs| !outputs.is_empty())
        .unwrap_or(false);
    if has_outputs {
        return HistoryState::Completed;
    }

    HistoryState::Pending
}

async fn emit(events: &mpsc::Sender<ExecutionEvent>, event: ExecutionEvent) {
    // A dropped receiver must not abort monitoring; the terminal outcome
    // is still reported through the return value.
    let _ = events.send(event).await;
}
