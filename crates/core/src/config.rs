//! Worker configuration loaded from environment variables.
//!
//! All fields have defaults suitable for a worker colocated with a ComfyUI
//! instance on its default port. In production, override via environment
//! variables. The config is constructed once at startup and passed into the
//! handler explicitly; nothing reads the environment after that point.

use std::path::PathBuf;
use std::time::Duration;

/// Optional S3 offload target for finalized assets.
///
/// When present, output assets are uploaded to the bucket and returned as
/// URLs instead of inline base64 payloads.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket that receives finalized assets.
    pub bucket: String,
    /// Custom endpoint URL for S3-compatible object stores.
    pub endpoint_url: Option<String>,
}

/// Configuration for one worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base HTTP URL of the local ComfyUI server (default: `http://127.0.0.1:8188`).
    pub api_url: String,
    /// Base WebSocket URL of the local ComfyUI server (default: `ws://127.0.0.1:8188`).
    pub ws_url: String,
    /// Directory holding the workflow template catalog files.
    pub templates_dir: PathBuf,
    /// Overall per-job execution timeout.
    pub job_timeout: Duration,
    /// Attempts for the server-availability probe before giving up.
    pub server_probe_attempts: u32,
    /// Delay between server-availability probe attempts.
    pub server_probe_interval: Duration,
    /// Attempts when polling the history endpoint for finalized outputs.
    pub history_attempts: u32,
    /// Delay between history polling attempts.
    pub history_delay: Duration,
    /// Bound on WebSocket reconnect attempts during monitoring.
    pub ws_reconnect_attempts: u32,
    /// Minimum available container memory required to accept a job.
    pub min_available_memory_bytes: u64,
    /// Minimum free container disk space required to accept a job.
    pub min_free_disk_bytes: u64,
    /// Filesystem path whose mount is checked for disk headroom.
    pub disk_check_path: String,
    /// Optional S3 offload target; `None` means inline base64 outputs.
    pub s3: Option<S3Config>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `COMFY_API_URL`                 | `http://127.0.0.1:8188`  |
    /// | `COMFY_WS_URL`                  | `ws://127.0.0.1:8188`    |
    /// | `WORKFLOW_TEMPLATES_DIR`        | `workflows`              |
    /// | `JOB_TIMEOUT_SECS`              | `600`                    |
    /// | `COMFY_AVAILABLE_ATTEMPTS`      | `500`                    |
    /// | `COMFY_AVAILABLE_INTERVAL_MS`   | `50`                     |
    /// | `COMFY_HISTORY_ATTEMPTS`        | `120`                    |
    /// | `COMFY_HISTORY_DELAY_MS`        | `2000`                   |
    /// | `WEBSOCKET_RECONNECT_ATTEMPTS`  | `5`                      |
    /// | `MIN_AVAILABLE_MEMORY_BYTES`    | `536870912` (0.5 GiB)    |
    /// | `MIN_FREE_DISK_BYTES`           | `524288000` (500 MiB)    |
    /// | `DISK_CHECK_PATH`               | `/`                      |
    /// | `BUCKET_ENDPOINT_URL`           | unset (inline base64)    |
    /// | `BUCKET_NAME`                   | `comfyui-outputs`        |
    ///
    /// Panics on unparseable values, which is the desired behaviour -- we
    /// want misconfiguration to fail at startup, not mid-job.
    pub fn from_env() -> Self {
        let s3 = std::env::var("BUCKET_ENDPOINT_URL").ok().map(|endpoint| S3Config {
            bucket: std::env::var("BUCKET_NAME").unwrap_or_else(|_| "comfyui-outputs".into()),
            endpoint_url: Some(endpoint),
        });

        Self {
            api_url: env_or("COMFY_API_URL", "http://127.0.0.1:8188".into()),
            ws_url: env_or("COMFY_WS_URL", "ws://127.0.0.1:8188".into()),
            templates_dir: PathBuf::from(env_or::<String>("WORKFLOW_TEMPLATES_DIR", "workflows".into())),
            job_timeout: Duration::from_secs(env_or("JOB_TIMEOUT_SECS", 600)),
            server_probe_attempts: env_or("COMFY_AVAILABLE_ATTEMPTS", 500),
            server_probe_interval: Duration::from_millis(env_or("COMFY_AVAILABLE_INTERVAL_MS", 50)),
            history_attempts: env_or("COMFY_HISTORY_ATTEMPTS", 120),
            history_delay: Duration::from_millis(env_or("COMFY_HISTORY_DELAY_MS", 2000)),
            ws_reconnect_attempts: env_or("WEBSOCKET_RECONNECT_ATTEMPTS", 5),
            min_available_memory_bytes: env_or("MIN_AVAILABLE_MEMORY_BYTES", 512 * 1024 * 1024),
            min_free_disk_bytes: env_or("MIN_FREE_DISK_BYTES", 500 * 1024 * 1024),
            disk_check_path: env_or("DISK_CHECK_PATH", "/".into()),
            s3,
        }
    }
}

/// Read an environment variable, parsing it into `T`, or return `default`
/// when the variable is unset.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid value: {e}")),
        Err(_) => default,
    }
}
