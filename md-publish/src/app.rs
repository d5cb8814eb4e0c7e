//! Router construction and the server loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use md_publish_core::converter::TokioCommandRunner;
use md_publish_core::download::GitHubClient;
use md_publish_core::PublishService;
use tracing::{error, info};

use crate::handlers;
use crate::load_config::ServiceConfig;
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::status::root))
        .route("/health", get(handlers::status::health))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/publish", post(handlers::publish::publish))
        .with_state(state)
}

/// Build the production service from `config`.
pub fn build_state(config: ServiceConfig) -> Result<Arc<AppState>> {
    let github = GitHubClient::new(&config.publish.github).context("Failed to build GitHub client")?;
    let service = PublishService::new(
        config.publish,
        Arc::new(github),
        Arc::new(TokioCommandRunner),
    );
    Ok(Arc::new(AppState::new(service)))
}

/// Bind, serve until Ctrl-C, then drain in-flight requests.
pub async fn run_server(config: ServiceConfig) -> Result<()> {
    let address = config.server.bind_address();
    let app = create_router(build_state(config)?);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(address = %address, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping server"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, stopping server"),
    }
}
