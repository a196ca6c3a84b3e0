use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use model_forge::backend::{GenerationClient, HttpGenerationBackend};
use model_forge::cache::{ArtifactCache, InMemoryStore};
use model_forge::config::AppConfig;
use model_forge::pipeline::Orchestrator;
use model_forge::retry::RetryController;
use model_forge::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    tracing::info!(
        api_key = %config.masked_api_key(),
        backend = %config.backend_url,
        cache_ttl_secs = config.cache_ttl_secs,
        max_retries = config.max_retries,
        "Loaded configuration"
    );

    let backend = Arc::new(HttpGenerationBackend::new(
        config.api_key.clone(),
        config.backend_url.clone(),
    ));
    if backend.is_demo() {
        tracing::warn!("No GENERATION_API_KEY set, serving placeholder models");
    }

    let orchestrator = Orchestrator::new(
        ArtifactCache::new(Arc::new(InMemoryStore::default()), config.cache_ttl_secs),
        GenerationClient::new(backend),
        RetryController::new(config.max_retries),
    );
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    let app = routes::router(state).layer(config.cors_layer());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
