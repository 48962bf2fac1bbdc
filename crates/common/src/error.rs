use crate::record::ServiceStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ServiceStatus,
        to: ServiceStatus,
    },

    #[error("Spec inference failed: {0}")]
    Inference(String),

    #[error("Source rendering failed: {0}")]
    Render(String),

    #[error("Artifact upload failed: {0}")]
    Publish(String),

    #[error("Build submission failed: {0}")]
    BuildSubmit(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Deployment deletion failed: {0}")]
    Deletion(String),

    #[error("Record {id} was modified concurrently")]
    Conflict { id: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Errors from status and endpoint queries that a later pass may not see again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
