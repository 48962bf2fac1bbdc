//! API Architect service
//!
//! Accepts prompts over HTTP, generates services in the background and
//! reports their progress.

use anyhow::{Context, Result};
use architect_orchestrator::cloud::{self, MockCloud};
use architect_orchestrator::config::{Config, StoreBackend};
use architect_orchestrator::{
    create_router, job_queue, AppState, GenerationPipeline, IdentityVerifier, MemoryStore,
    Orchestrator, RecordStore, RedisStore, StaticTokenVerifier, TrustedTokenVerifier,
    WorkerConfig,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api_architect=debug,architect_orchestrator=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting API Architect");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded - listening on {}",
        config.api_address()
    );

    // Record store
    let store: Arc<dyn RecordStore> = match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisStore::new(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?;
            store.health_check().await.context("Redis health check failed")?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory record store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // External collaborators
    let collaborators = if config.mock_mode {
        warn!("MOCK_MODE enabled - no cloud resources will be created");
        cloud::mock_collaborators(Arc::new(MockCloud::new()))
    } else {
        info!(
            "Using Google Cloud project {} in {}",
            config.gcp.project_id, config.gcp.region
        );
        cloud::google_collaborators(&config.gcp, config.http_timeout)?
    };

    // Generation pipeline and its worker
    let pipeline = Arc::new(GenerationPipeline::new(store.clone(), collaborators.clone()));
    let (queue, worker) = job_queue(
        WorkerConfig {
            num_workers: config.pipeline_workers,
        },
        pipeline,
    );
    let worker = tokio::spawn(worker.run());

    let verifier: Arc<dyn IdentityVerifier> = if config.auth_tokens.is_empty() {
        warn!("AUTH_TOKENS is empty - bearer tokens are trusted as owner ids");
        Arc::new(TrustedTokenVerifier)
    } else {
        Arc::new(StaticTokenVerifier::new(config.auth_tokens.clone()))
    };

    let state = AppState {
        orchestrator: Orchestrator::new(store, &collaborators, queue),
        verifier,
    };
    let app = create_router(state, &config.api_prefix, &config.cors_origins);

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("API Architect listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());
    info!("Service routes under {}/services", config.api_prefix);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router held the last queue handle; the worker drains and exits
    info!("Waiting for running pipelines to finish");
    worker.await.context("Pipeline worker panicked")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
