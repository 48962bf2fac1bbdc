//! Interfaces to the external systems the orchestrator drives
//!
//! Every collaborator is injected as an `Arc<dyn Trait>` through
//! [`Collaborators`]; nothing is looked up from ambient state.

use architect_common::{Result, ServiceSpec};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Packaged source produced by an [`ArtifactBuilder`]
///
/// The handle owns its scratch directory; dropping it releases the files.
pub type ArtifactHandle = service_codegen::PackagedSource;

/// Durable location of a published artifact (e.g. `gs://bucket/object`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a `gs://bucket/object` reference into bucket and object
    pub fn gcs_location(&self) -> Option<(&str, &str)> {
        self.0
            .strip_prefix("gs://")?
            .split_once('/')
            .filter(|(bucket, object)| !bucket.is_empty() && !object.is_empty())
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an external build job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observed state of an external build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Queued or still executing
    Running,
    Success,
    Failure,
    Cancelled,
    Expired,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildState::Running => "RUNNING",
            BuildState::Success => "SUCCESS",
            BuildState::Failure => "FAILURE",
            BuildState::Cancelled => "CANCELLED",
            BuildState::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// What the runtime platform reports under a target name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    /// Nothing exists under the name
    Absent,
    /// A service exists but exposes no reachable endpoint
    Unresolved,
    /// Serving at the URL
    Ready(String),
}

/// Result of asking the platform to delete a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Deletion accepted; completion is observed later
    Deleted,
    /// Nothing was deployed under that name
    NotFound,
}

/// Natural-language prompt to structured spec
#[async_trait]
pub trait SpecInference: Send + Sync {
    /// Errors are [`architect_common::Error::Inference`]
    async fn infer(&self, prompt: &str) -> Result<ServiceSpec>;
}

/// Spec to packaged source
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Errors are [`architect_common::Error::Render`]
    async fn render(&self, spec: &ServiceSpec) -> Result<ArtifactHandle>;
}

/// Uploads artifacts to durable object storage
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Errors are [`architect_common::Error::Publish`]
    async fn publish(&self, record_id: &str, artifact: &ArtifactHandle) -> Result<ArtifactRef>;

    /// Link a client can use to fetch a published artifact
    fn download_url(&self, reference: &str) -> String {
        reference.to_string()
    }
}

/// Asynchronous external build system
#[async_trait]
pub trait BuildTrigger: Send + Sync {
    /// Errors are [`architect_common::Error::BuildSubmit`]
    async fn submit(&self, source: &ArtifactRef, target: &str) -> Result<BuildId>;

    /// Errors are [`architect_common::Error::Transient`]
    async fn status(&self, build: &BuildId) -> Result<BuildState>;

    /// Human-readable location of the build logs
    fn log_url(&self, build: &BuildId) -> String;
}

/// Runtime platform the built services are deployed to
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Errors are [`architect_common::Error::Transient`]
    async fn lookup(&self, target: &str) -> Result<Deployment>;

    /// Errors are [`architect_common::Error::Deletion`]
    async fn delete(&self, target: &str) -> Result<DeleteOutcome>;
}

/// Handles to every external collaborator
#[derive(Clone)]
pub struct Collaborators {
    pub inference: Arc<dyn SpecInference>,
    pub builder: Arc<dyn ArtifactBuilder>,
    pub publisher: Arc<dyn ArtifactPublisher>,
    pub builds: Arc<dyn BuildTrigger>,
    pub deployments: Arc<dyn DeploymentPlatform>,
}
