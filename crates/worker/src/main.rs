//! Worker binary: run one job payload through the handler.
//!
//! Reads a job event (`{"id": ..., "input": {...}}`) from the file named
//! by the first argument, or from stdin, and prints the `{output}` /
//! `{error}` response. The hosting runtime owns delivery and concurrency;
//! this binary is the local equivalent of one invocation.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapgen_core::config::WorkerConfig;
use snapgen_worker::handler::JobHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let payload = read_payload()?;
    let job_id = payload
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let input = payload
        .get("input")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    let handler = JobHandler::from_config(WorkerConfig::from_env()).await;
    let response = handler.handle(&job_id, &input).await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn read_payload() -> anyhow::Result<serde_json::Value> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading job payload from {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
                .context("reading job payload from stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw).context("parsing job payload JSON")
}
