//! Artifact publishing to Cloud Storage

use super::failure_detail;
use super::token::TokenSource;
use crate::ports::{ArtifactHandle, ArtifactPublisher, ArtifactRef};
use architect_common::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const BROWSER_BASE: &str = "https://storage.cloud.google.com";

/// Uploads packaged sources to `gs://{bucket}/source/{record_id}/{file}`
pub struct GcsPublisher {
    client: reqwest::Client,
    tokens: Arc<TokenSource>,
    bucket: String,
}

impl GcsPublisher {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenSource>, bucket: String) -> Self {
        Self {
            client,
            tokens,
            bucket,
        }
    }
}

/// Object name of a record's artifact
pub fn object_name(record_id: &str, file_name: &str) -> String {
    format!("source/{}/{}", record_id, file_name)
}

#[async_trait]
impl ArtifactPublisher for GcsPublisher {
    async fn publish(&self, record_id: &str, artifact: &ArtifactHandle) -> Result<ArtifactRef> {
        let object = object_name(record_id, artifact.file_name());
        let bytes = tokio::fs::read(artifact.path())
            .await
            .map_err(|e| Error::Publish(format!("cannot read {}: {}", artifact.path().display(), e)))?;
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| Error::Publish(format!("no access token: {:#}", e)))?;

        let response = self
            .client
            .post(format!("{}/b/{}/o", UPLOAD_BASE, self.bucket))
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Publish(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Publish(format!(
                "upload of {} rejected: {}",
                object,
                failure_detail(response).await
            )));
        }

        let reference = ArtifactRef::new(format!("gs://{}/{}", self.bucket, object));
        info!("Uploaded source to {}", reference);
        Ok(reference)
    }

    fn download_url(&self, reference: &str) -> String {
        match ArtifactRef::new(reference).gcs_location() {
            Some((bucket, object)) => format!("{}/{}/{}", BROWSER_BASE, bucket, object),
            None => reference.to_string(),
        }
    }
}
