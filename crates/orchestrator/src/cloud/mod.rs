//! Adapters implementing the collaborator ports
//!
//! [`google_collaborators`] wires the Google Cloud services (Gemini, Cloud
//! Storage, Cloud Build, Cloud Run); [`mock_collaborators`] wires the
//! in-memory [`MockCloud`] used by mock mode and the tests.

pub mod cloud_build;
pub mod cloud_run;
pub mod gcs;
pub mod gemini;
pub mod mock;
pub mod renderer;
pub mod token;

pub use cloud_build::CloudBuildTrigger;
pub use cloud_run::CloudRunPlatform;
pub use gcs::GcsPublisher;
pub use gemini::GeminiInference;
pub use mock::{FailurePoint, MockCloud, Registration};
pub use renderer::SourceRenderer;
pub use token::TokenSource;

use crate::config::GcpConfig;
use crate::ports::Collaborators;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators backed by Google Cloud
pub fn google_collaborators(gcp: &GcpConfig, timeout: Duration) -> Result<Collaborators> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let tokens = Arc::new(match &gcp.access_token {
        Some(token) => TokenSource::fixed(token.clone()),
        None => TokenSource::metadata(client.clone()),
    });

    Ok(Collaborators {
        inference: Arc::new(GeminiInference::new(
            client.clone(),
            gcp.gemini_api_key.clone(),
            gcp.gemini_model.clone(),
        )),
        builder: Arc::new(SourceRenderer),
        publisher: Arc::new(GcsPublisher::new(
            client.clone(),
            tokens.clone(),
            gcp.source_bucket.clone(),
        )),
        builds: Arc::new(CloudBuildTrigger::new(client.clone(), tokens.clone(), gcp)),
        deployments: Arc::new(CloudRunPlatform::new(client, tokens, gcp)),
    })
}

/// Collaborators backed by an in-memory cloud; sources are still rendered
pub fn mock_collaborators(cloud: Arc<MockCloud>) -> Collaborators {
    Collaborators {
        inference: cloud.clone(),
        builder: Arc::new(SourceRenderer),
        publisher: cloud.clone(),
        builds: cloud.clone(),
        deployments: cloud,
    }
}

/// Status line plus body of an unsuccessful response
async fn failure_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    }
}
