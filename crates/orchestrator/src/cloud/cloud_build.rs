//! Builds through the Cloud Build REST API
//!
//! Each build unpacks the uploaded tarball, builds and pushes the container
//! image to Artifact Registry and deploys it to Cloud Run under the target
//! service name.

use super::failure_detail;
use super::token::TokenSource;
use crate::config::GcpConfig;
use crate::ports::{ArtifactRef, BuildId, BuildState, BuildTrigger};
use architect_common::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CLOUD_BUILD_BASE: &str = "https://cloudbuild.googleapis.com/v1";
const DOCKER_BUILDER: &str = "gcr.io/cloud-builders/docker";
const GCLOUD_BUILDER: &str = "gcr.io/google.com/cloudsdktool/cloud-sdk";

#[derive(Debug, Deserialize)]
struct Operation {
    metadata: Option<OperationMetadata>,
}

#[derive(Debug, Deserialize)]
struct OperationMetadata {
    build: Option<BuildResource>,
}

#[derive(Debug, Deserialize)]
struct BuildResource {
    id: Option<String>,
    status: Option<String>,
}

/// Map a Cloud Build status string
pub fn map_build_status(status: &str) -> BuildState {
    match status {
        "SUCCESS" => BuildState::Success,
        "FAILURE" | "INTERNAL_ERROR" | "TIMEOUT" => BuildState::Failure,
        "CANCELLED" => BuildState::Cancelled,
        "EXPIRED" => BuildState::Expired,
        "QUEUED" | "PENDING" | "WORKING" | "STATUS_UNKNOWN" => BuildState::Running,
        other => {
            warn!("Unrecognized build status '{}', treating it as running", other);
            BuildState::Running
        }
    }
}

/// Cloud Build backed [`BuildTrigger`]
pub struct CloudBuildTrigger {
    client: reqwest::Client,
    tokens: Arc<TokenSource>,
    project_id: String,
    region: String,
    repository: String,
}

impl CloudBuildTrigger {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenSource>, gcp: &GcpConfig) -> Self {
        Self {
            client,
            tokens,
            project_id: gcp.project_id.clone(),
            region: gcp.region.clone(),
            repository: gcp.artifact_repository.clone(),
        }
    }

    /// Artifact Registry image of a target, tagged with the build id
    fn image(&self, target: &str) -> String {
        format!(
            "{}-docker.pkg.dev/{}/{}/{}:$BUILD_ID",
            self.region, self.project_id, self.repository, target
        )
    }

    fn build_request(&self, bucket: &str, object: &str, target: &str) -> Value {
        let image = self.image(target);
        json!({
            "source": {
                "storageSource": { "bucket": bucket, "object": object }
            },
            "steps": [
                {
                    "name": DOCKER_BUILDER,
                    "args": ["build", "-t", image, "."]
                },
                {
                    "name": DOCKER_BUILDER,
                    "args": ["push", image]
                },
                {
                    "name": GCLOUD_BUILDER,
                    "entrypoint": "gcloud",
                    "args": [
                        "run", "deploy", target,
                        "--image", image,
                        "--region", self.region,
                        "--platform", "managed",
                        "--allow-unauthenticated",
                        "--quiet"
                    ]
                }
            ],
            "images": [image]
        })
    }

    fn builds_url(&self) -> String {
        format!("{}/projects/{}/builds", CLOUD_BUILD_BASE, self.project_id)
    }
}

#[async_trait]
impl BuildTrigger for CloudBuildTrigger {
    async fn submit(&self, source: &ArtifactRef, target: &str) -> Result<BuildId> {
        let (bucket, object) = source.gcs_location().ok_or_else(|| {
            Error::BuildSubmit(format!("{} is not a Cloud Storage location", source))
        })?;
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| Error::BuildSubmit(format!("no access token: {:#}", e)))?;

        let response = self
            .client
            .post(self.builds_url())
            .bearer_auth(token)
            .json(&self.build_request(bucket, object, target))
            .send()
            .await
            .map_err(|e| Error::BuildSubmit(format!("build request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::BuildSubmit(failure_detail(response).await));
        }

        let operation: Operation = response
            .json()
            .await
            .map_err(|e| Error::BuildSubmit(format!("unreadable build operation: {}", e)))?;

        let id = operation
            .metadata
            .and_then(|metadata| metadata.build)
            .and_then(|build| build.id)
            .ok_or_else(|| Error::BuildSubmit("build operation carries no build id".to_string()))?;

        info!("Submitted build {} for {}", id, target);
        Ok(BuildId::new(id))
    }

    async fn status(&self, build: &BuildId) -> Result<BuildState> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| Error::Transient(format!("no access token: {:#}", e)))?;

        let response = self
            .client
            .get(format!("{}/{}", self.builds_url(), build))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("build status request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Transient(format!(
                "build {} status unavailable: {}",
                build,
                failure_detail(response).await
            )));
        }

        let resource: BuildResource = response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("unreadable build {}: {}", build, e)))?;

        let status = resource.status.unwrap_or_else(|| "STATUS_UNKNOWN".to_string());
        debug!("Build {} is {}", build, status);
        Ok(map_build_status(&status))
    }

    fn log_url(&self, build: &BuildId) -> String {
        format!(
            "https://console.cloud.google.com/cloud-build/builds/{}?project={}",
            build, self.project_id
        )
    }
}
