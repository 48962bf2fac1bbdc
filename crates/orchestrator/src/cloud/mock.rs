//! In-memory cloud for mock mode and tests
//!
//! One [`MockCloud`] plays every external system. Builds report RUNNING for
//! a number of status polls and then settle on their outcome; a successful
//! build registers the target under `{endpoint_base}/{target}` (see
//! [`Registration`]). Any operation can be made to fail with
//! [`MockCloud::fail`].

use crate::ports::{
    ArtifactHandle, ArtifactPublisher, ArtifactRef, BuildId, BuildState, BuildTrigger,
    DeleteOutcome, Deployment, DeploymentPlatform, SpecInference,
};
use architect_common::{
    sanitize_service_name, EndpointSpec, Error, FieldType, HttpMethod, Result, SchemaField,
    ServiceSpec,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const DEFAULT_ENDPOINT_BASE: &str = "https://svc.example";

/// Operation of the mock cloud that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Inference,
    Publish,
    Submit,
    BuildStatus,
    Endpoint,
    Delete,
}

/// What a successful build leaves on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A service serving at `{endpoint_base}/{target}`
    Ready,
    /// A service that exists but never gets an endpoint
    Unresolved,
    /// No service at all
    Nothing,
}

#[derive(Debug)]
struct MockBuild {
    target: String,
    polls: u32,
    outcome: BuildState,
}

#[derive(Debug, Default)]
struct MockState {
    spec: Option<ServiceSpec>,
    failures: HashSet<FailurePoint>,
    builds: HashMap<String, MockBuild>,
    next_build: u64,
    /// `None` marks a service without an endpoint
    deployments: HashMap<String, Option<String>>,
    published: Vec<String>,
    scratch_dirs: Vec<PathBuf>,
    delete_calls: Vec<String>,
    linger_deletes: bool,
    pending_deletes: HashSet<String>,
}

/// Mock implementation of every collaborator port
#[derive(Debug)]
pub struct MockCloud {
    endpoint_base: String,
    polls_until_done: u32,
    registration: Registration,
    state: Mutex<MockState>,
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCloud {
    /// Builds succeed on their first status poll
    pub fn new() -> Self {
        Self {
            endpoint_base: DEFAULT_ENDPOINT_BASE.to_string(),
            polls_until_done: 1,
            registration: Registration::Ready,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Number of status polls before a build settles (at least 1)
    pub fn with_polls_until_done(mut self, polls: u32) -> Self {
        self.polls_until_done = polls.max(1);
        self
    }

    pub fn with_endpoint_base(mut self, base: impl Into<String>) -> Self {
        self.endpoint_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.registration = registration;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spec returned by inference instead of the one derived from the prompt
    pub fn set_spec(&self, spec: ServiceSpec) {
        self.state().spec = Some(spec);
    }

    pub fn fail(&self, point: FailurePoint) {
        self.state().failures.insert(point);
    }

    pub fn recover(&self, point: FailurePoint) {
        self.state().failures.remove(&point);
    }

    /// Final state a submitted build settles on
    pub fn set_build_outcome(&self, build: &str, outcome: BuildState) {
        if let Some(build) = self.state().builds.get_mut(build) {
            build.outcome = outcome;
        }
    }

    pub fn deploy(&self, target: &str, endpoint: impl Into<String>) {
        self.state()
            .deployments
            .insert(target.to_string(), Some(endpoint.into()));
    }

    /// Register a service that exists without an endpoint
    pub fn deploy_unresolved(&self, target: &str) {
        self.state().deployments.insert(target.to_string(), None);
    }

    pub fn undeploy(&self, target: &str) {
        self.state().deployments.remove(target);
    }

    pub fn endpoint_of(&self, target: &str) -> Option<String> {
        self.state().deployments.get(target).cloned().flatten()
    }

    /// Whether anything, resolvable or not, exists under `target`
    pub fn is_deployed(&self, target: &str) -> bool {
        self.state().deployments.contains_key(target)
    }

    /// Accepted deletions keep the service resolvable until [`Self::finish_deletions`]
    pub fn linger_deletes(&self, linger: bool) {
        self.state().linger_deletes = linger;
    }

    pub fn finish_deletions(&self) {
        let mut state = self.state();
        let pending: Vec<String> = state.pending_deletes.drain().collect();
        for target in pending {
            state.deployments.remove(&target);
        }
    }

    /// Targets passed to [`DeploymentPlatform::delete`], in call order
    pub fn delete_calls(&self) -> Vec<String> {
        self.state().delete_calls.clone()
    }

    /// References returned by [`ArtifactPublisher::publish`]
    pub fn published(&self) -> Vec<String> {
        self.state().published.clone()
    }

    /// Scratch directories of every artifact handed to the publisher
    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.state().scratch_dirs.clone()
    }

    pub fn builds_submitted(&self) -> usize {
        self.state().builds.len()
    }

    fn check(&self, point: FailurePoint) -> Result<()> {
        if !self.state().failures.contains(&point) {
            return Ok(());
        }

        let detail = format!("injected {:?} failure", point);
        Err(match point {
            FailurePoint::Inference => Error::Inference(detail),
            FailurePoint::Publish => Error::Publish(detail),
            FailurePoint::Submit => Error::BuildSubmit(detail),
            FailurePoint::BuildStatus | FailurePoint::Endpoint => Error::Transient(detail),
            FailurePoint::Delete => Error::Deletion(detail),
        })
    }
}

/// Deterministic spec for a prompt: one POST endpoint taking a message
fn derived_spec(prompt: &str) -> ServiceSpec {
    let mut name = sanitize_service_name(prompt);
    name.truncate(30);
    let name = name.trim_matches('-').to_string();
    let name = if name.is_empty() {
        "mock-service".to_string()
    } else {
        name
    };

    ServiceSpec {
        endpoint: EndpointSpec {
            path: format!("/{}", name),
            method: HttpMethod::Post,
            model_name: "Payload".to_string(),
            schema_fields: vec![SchemaField {
                name: "message".to_string(),
                field_type: FieldType::String,
                required: true,
            }],
        },
        service_name: name,
        storage: None,
    }
}

#[async_trait]
impl SpecInference for MockCloud {
    async fn infer(&self, prompt: &str) -> Result<ServiceSpec> {
        self.check(FailurePoint::Inference)?;
        let spec = self.state().spec.clone();
        Ok(spec.unwrap_or_else(|| derived_spec(prompt)))
    }
}

#[async_trait]
impl ArtifactPublisher for MockCloud {
    async fn publish(&self, record_id: &str, artifact: &ArtifactHandle) -> Result<ArtifactRef> {
        self.state()
            .scratch_dirs
            .push(artifact.scratch_dir().to_path_buf());
        self.check(FailurePoint::Publish)?;
        let size = artifact
            .size()
            .map_err(|e| Error::Publish(format!("artifact unreadable: {}", e)))?;

        let reference = format!("mock://artifacts/source/{}/{}", record_id, artifact.file_name());
        debug!("Published {} bytes as {}", size, reference);
        self.state().published.push(reference.clone());
        Ok(ArtifactRef::new(reference))
    }
}

#[async_trait]
impl BuildTrigger for MockCloud {
    async fn submit(&self, _source: &ArtifactRef, target: &str) -> Result<BuildId> {
        self.check(FailurePoint::Submit)?;
        let mut state = self.state();
        state.next_build += 1;
        let id = format!("mock-build-{}", state.next_build);
        state.builds.insert(
            id.clone(),
            MockBuild {
                target: target.to_string(),
                polls: 0,
                outcome: BuildState::Success,
            },
        );
        info!("Mock build {} started for {}", id, target);
        Ok(BuildId::new(id))
    }

    async fn status(&self, build: &BuildId) -> Result<BuildState> {
        self.check(FailurePoint::BuildStatus)?;
        let mut state = self.state();
        let Some(entry) = state.builds.get_mut(build.as_str()) else {
            return Err(Error::Transient(format!("unknown build {}", build)));
        };

        entry.polls = entry.polls.saturating_add(1);
        if entry.polls < self.polls_until_done {
            return Ok(BuildState::Running);
        }

        let outcome = entry.outcome;
        if outcome == BuildState::Success {
            let target = entry.target.clone();
            let endpoint = match self.registration {
                Registration::Ready => Some(format!("{}/{}", self.endpoint_base, target)),
                Registration::Unresolved => None,
                Registration::Nothing => return Ok(outcome),
            };
            state.deployments.entry(target).or_insert(endpoint);
        }
        Ok(outcome)
    }

    fn log_url(&self, build: &BuildId) -> String {
        format!("mock://builds/{}/logs", build)
    }
}

#[async_trait]
impl DeploymentPlatform for MockCloud {
    async fn lookup(&self, target: &str) -> Result<Deployment> {
        self.check(FailurePoint::Endpoint)?;
        Ok(match self.state().deployments.get(target) {
            None => Deployment::Absent,
            Some(None) => Deployment::Unresolved,
            Some(Some(url)) => Deployment::Ready(url.clone()),
        })
    }

    async fn delete(&self, target: &str) -> Result<DeleteOutcome> {
        let mut state = self.state();
        state.delete_calls.push(target.to_string());
        if state.failures.contains(&FailurePoint::Delete) {
            return Err(Error::Deletion(format!("injected failure deleting {}", target)));
        }

        if !state.deployments.contains_key(target) {
            return Ok(DeleteOutcome::NotFound);
        }

        if state.linger_deletes {
            state.pending_deletes.insert(target.to_string());
        } else {
            state.deployments.remove(target);
        }
        Ok(DeleteOutcome::Deleted)
    }
}
