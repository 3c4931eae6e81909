//! Local API server binary.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapgen_api::config::ServerConfig;
use snapgen_api::jobs::JobStore;
use snapgen_api::routes::build_router;
use snapgen_api::state::AppState;
use snapgen_core::config::WorkerConfig;
use snapgen_worker::handler::JobHandler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_config = ServerConfig::from_env();
    let handler = Arc::new(JobHandler::from_config(WorkerConfig::from_env()).await);

    let state = AppState {
        handler,
        jobs: Arc::new(JobStore::new()),
    };
    let app = build_router(state, &server_config);

    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));

    tracing::info!(%addr, "Serverless API emulation listening");
    axum::serve(listener, app).await.expect("server error");
}
