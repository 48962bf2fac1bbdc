//! API handlers for the orchestrator

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use architect_common::{Error, ServiceRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{IdentityVerifier, Owner};
use crate::orchestrator::Orchestrator;

/// Shared application state
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Request to generate a new service
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Natural-language description of the service
    pub prompt: String,
}

/// Response to a delete request
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Link to the published source of a service
#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub download_url: String,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Permission(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Deletion(_) | Error::Transient(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidTransition { .. }
            | Error::Inference(_)
            | Error::Render(_)
            | Error::Publish(_)
            | Error::BuildSubmit(_)
            | Error::Store(_)
            | Error::Json(_)
            | Error::Io(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", err);
        }

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "api-architect"
    }))
}

/// Accept a prompt and start generating a service
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<ServiceRecord>), ApiError> {
    info!("Generating service for {}", owner);

    let record = state.orchestrator.intake(&owner, &payload.prompt).await?;

    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// List the caller's services
pub async fn list_services_handler(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<ServiceRecord>>, ApiError> {
    let records = state.orchestrator.list(&owner).await?;
    Ok(Json(records))
}

/// Get one service
pub async fn get_service_handler(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<ServiceRecord>, ApiError> {
    let record = state.orchestrator.get(&id, &owner).await?;
    Ok(Json(record))
}

/// Link to the generated source of a service
pub async fn get_artifact_handler(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<ArtifactResponse>, ApiError> {
    let download_url = state.orchestrator.artifact_url(&id, &owner).await?;
    Ok(Json(ArtifactResponse { download_url }))
}

/// Delete a service
pub async fn delete_service_handler(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    info!("Deleting service {} for {}", id, owner);

    let ack = state.orchestrator.delete(&id, &owner).await?;
    Ok(Json(DeleteResponse {
        message: ack.message(),
    }))
}
