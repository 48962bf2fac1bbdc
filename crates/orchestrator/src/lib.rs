//! API Architect orchestrator
//!
//! Turns natural-language prompts into deployed HTTP microservices. A
//! request is accepted immediately as a PENDING record; a background
//! pipeline infers a [`ServiceSpec`](architect_common::ServiceSpec), renders
//! and publishes the source and submits a cloud build. Reads reconcile the
//! stored records against the build system and runtime platform.
//!
//! ## Endpoints
//!
//! - `POST {prefix}/services/generate` - Accept a prompt
//! - `GET {prefix}/services` - List the caller's services
//! - `GET {prefix}/services/{id}` - Get one service
//! - `GET {prefix}/services/{id}/artifact` - Link to the generated source
//! - `DELETE {prefix}/services/{id}` - Tear down a service
//! - `GET /health` - Health check

pub mod auth;
pub mod cloud;
pub mod config;
pub mod handlers;
pub mod orchestrator;
pub mod pipeline;
pub mod ports;
pub mod reconcile;
pub mod storage;
pub mod worker;

pub use auth::{IdentityVerifier, StaticTokenVerifier, TrustedTokenVerifier};
pub use config::Config;
pub use handlers::AppState;
pub use orchestrator::{DeleteAck, Orchestrator};
pub use pipeline::GenerationPipeline;
pub use ports::Collaborators;
pub use reconcile::Reconciler;
pub use storage::{MemoryStore, RecordStore, RedisStore};
pub use worker::{job_queue, JobQueue, Worker, WorkerConfig};

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the API router
///
/// Service routes are mounted under `api_prefix`; an empty `cors_origins`
/// allows every origin.
pub fn create_router(state: AppState, api_prefix: &str, cors_origins: &[String]) -> Router {
    let state = Arc::new(state);

    let services = Router::new()
        .route("/services/generate", post(handlers::generate_handler))
        .route("/services", get(handlers::list_services_handler))
        .route(
            "/services/{id}",
            get(handlers::get_service_handler).delete(handlers::delete_service_handler),
        )
        .route("/services/{id}/artifact", get(handlers::get_artifact_handler));

    let prefix = api_prefix.trim_end_matches('/');
    let router = Router::new().route("/health", get(handlers::health_handler));
    let router = if prefix.is_empty() {
        router.merge(services)
    } else if prefix.starts_with('/') {
        router.nest(prefix, services)
    } else {
        router.nest(&format!("/{}", prefix), services)
    };

    router
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
