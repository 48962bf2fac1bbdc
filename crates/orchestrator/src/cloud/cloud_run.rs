//! Deployed services on Cloud Run (Admin API v2)

use super::failure_detail;
use super::token::TokenSource;
use crate::config::GcpConfig;
use crate::ports::{DeleteOutcome, Deployment, DeploymentPlatform};
use architect_common::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const CLOUD_RUN_BASE: &str = "https://run.googleapis.com/v2";

#[derive(Debug, Deserialize)]
struct RunService {
    uri: Option<String>,
}

/// A service without a `uri` exists but is not serving yet (or never will)
fn service_state(service: RunService) -> Deployment {
    match service.uri.filter(|uri| !uri.is_empty()) {
        Some(uri) => Deployment::Ready(uri),
        None => Deployment::Unresolved,
    }
}

/// Cloud Run backed [`DeploymentPlatform`]
pub struct CloudRunPlatform {
    client: reqwest::Client,
    tokens: Arc<TokenSource>,
    project_id: String,
    region: String,
}

impl CloudRunPlatform {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenSource>, gcp: &GcpConfig) -> Self {
        Self {
            client,
            tokens,
            project_id: gcp.project_id.clone(),
            region: gcp.region.clone(),
        }
    }

    fn service_url(&self, target: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/services/{}",
            CLOUD_RUN_BASE, self.project_id, self.region, target
        )
    }
}

#[async_trait]
impl DeploymentPlatform for CloudRunPlatform {
    async fn lookup(&self, target: &str) -> Result<Deployment> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| Error::Transient(format!("no access token: {:#}", e)))?;

        let response = self
            .client
            .get(self.service_url(target))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("service lookup failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Service {} is not deployed", target);
            return Ok(Deployment::Absent);
        }

        if !response.status().is_success() {
            return Err(Error::Transient(format!(
                "service {} lookup failed: {}",
                target,
                failure_detail(response).await
            )));
        }

        let service: RunService = response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("unreadable service {}: {}", target, e)))?;

        Ok(service_state(service))
    }

    async fn delete(&self, target: &str) -> Result<DeleteOutcome> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| Error::Deletion(format!("no access token: {:#}", e)))?;

        let response = self
            .client
            .delete(self.service_url(target))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Deletion(format!("delete request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::NotFound);
        }

        if !response.status().is_success() {
            return Err(Error::Deletion(format!(
                "service {}: {}",
                target,
                failure_detail(response).await
            )));
        }

        info!("Deletion of Cloud Run service {} accepted", target);
        Ok(DeleteOutcome::Deleted)
    }
}
