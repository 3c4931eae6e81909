//! Bounded exponential-backoff reconnection for monitor WebSocket
//! connections.
//!
//! When the channel to ComfyUI drops mid-monitor, the monitor calls
//! [`reconnect_with_backoff`] to retry with increasing delays up to a
//! bounded attempt count. Reconnection reuses the original client ID so
//! the server keeps routing the in-flight prompt's messages to us.

use std::time::Duration;

use crate::client::{ComfyClient, ComfySession};

/// Tunable parameters for the bounded exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Attempt bound; exhaustion is reported to the caller.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Attempt to re-establish a dropped connection, preserving `client_id`.
///
/// Returns `Some(session)` once a connection succeeds, or `None` after
/// [`ReconnectConfig::max_attempts`] failures.
pub async fn reconnect_with_backoff(
    client: &ComfyClient,
    client_id: &str,
    config: &ReconnectConfig,
) -> Option<ComfySession> {
    let mut delay = config.initial_delay;

    for attempt in 1..=config.max_attempts {
        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to ComfyUI",
        );
        tokio::time::sleep(delay).await;

        match client.connect_with_client_id(client_id).await {
            Ok(session) => {
                tracing::info!(attempt, "Reconnected to ComfyUI");
                return Some(session);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
            }
        }

        delay = next_delay(delay, config);
    }

    tracing::error!(
        attempts = config.max_attempts,
        "Giving up on ComfyUI reconnection",
    );
    None
}
