//! End-to-end orchestration scenarios against the in-memory store and cloud

use architect_common::{Error, Result, ServiceRecord, ServiceSpec, ServiceStatus};
use architect_orchestrator::cloud::{mock_collaborators, FailurePoint, MockCloud, Registration};
use architect_orchestrator::ports::{
    ArtifactHandle, ArtifactPublisher, ArtifactRef, BuildState, SpecInference,
};
use architect_orchestrator::{
    job_queue, Collaborators, DeleteAck, GenerationPipeline, MemoryStore, Orchestrator,
    RecordStore, WorkerConfig,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const OWNER: &str = "alice";
const CONTACT_PROMPT: &str = "Create a contact form API that accepts name, email and message";

fn contact_form_spec() -> ServiceSpec {
    ServiceSpec::from_model_output(
        r#"```json
        {
            "service_name": "contact-form-api",
            "endpoint": {
                "path": "/contact",
                "method": "POST",
                "model_name": "ContactForm",
                "schema_fields": [
                    { "name": "name", "type": "str", "required": true },
                    { "name": "email", "type": "EmailStr", "required": true },
                    { "name": "message", "type": "str", "required": true }
                ]
            }
        }
        ```"#,
    )
    .unwrap()
}

struct Harness {
    store: Arc<MemoryStore>,
    cloud: Arc<MockCloud>,
    orchestrator: Orchestrator,
    worker: JoinHandle<()>,
}

impl Harness {
    fn new(cloud: MockCloud) -> Self {
        Self::with_collaborators(Arc::new(cloud), |_| {})
    }

    /// Mock collaborators, some of them replaced by `customize`
    fn with_collaborators(
        cloud: Arc<MockCloud>,
        customize: impl FnOnce(&mut Collaborators),
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        cloud.set_spec(contact_form_spec());

        let mut collaborators = mock_collaborators(cloud.clone());
        customize(&mut collaborators);
        let pipeline = Arc::new(GenerationPipeline::new(store.clone(), collaborators.clone()));
        let (queue, worker) = job_queue(WorkerConfig { num_workers: 2 }, pipeline);

        Self {
            orchestrator: Orchestrator::new(store.clone(), &collaborators, queue),
            worker: tokio::spawn(worker.run()),
            store,
            cloud,
        }
    }

    async fn stored(&self, id: &str) -> Option<ServiceRecord> {
        self.store.get(id).await.unwrap()
    }

    /// Wait for the pipeline of `id` to leave PENDING
    async fn settle(&self, id: &str) -> ServiceRecord {
        for _ in 0..500 {
            if let Some(record) = self.stored(id).await {
                if record.status != ServiceStatus::Pending {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pipeline for {} did not finish", id);
    }

    async fn generate(&self, prompt: &str) -> ServiceRecord {
        let accepted = self.orchestrator.intake(OWNER, prompt).await.unwrap();
        self.settle(&accepted.id).await
    }

    /// Close the queue and wait for the worker to drain
    async fn shutdown(self) {
        drop(self.orchestrator);
        self.worker.await.unwrap();
    }
}

/// Publisher that holds every upload until released
struct GatedPublisher {
    inner: Arc<MockCloud>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl ArtifactPublisher for GatedPublisher {
    async fn publish(&self, record_id: &str, artifact: &ArtifactHandle) -> Result<ArtifactRef> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.publish(record_id, artifact).await
    }
}

struct CrashingInference;

#[async_trait]
impl SpecInference for CrashingInference {
    async fn infer(&self, _prompt: &str) -> Result<ServiceSpec> {
        panic!("model client crashed");
    }
}

#[tokio::test]
async fn test_contact_form_reaches_building() {
    let h = Harness::new(MockCloud::new());

    let accepted = h.orchestrator.intake(OWNER, CONTACT_PROMPT).await.unwrap();
    assert_eq!(accepted.status, ServiceStatus::Pending);
    assert_eq!(accepted.owner_id, OWNER);
    assert!(accepted.build_reference.is_none());
    assert!(accepted.deployed_endpoint.is_none());

    let record = h.settle(&accepted.id).await;
    assert_eq!(record.status, ServiceStatus::Building);
    assert_eq!(record.display_name, "contact-form-api");
    assert_eq!(record.source_prompt, CONTACT_PROMPT);
    assert!(record.error_detail.is_none());

    let build = record.build_reference.clone().unwrap();
    assert_eq!(
        record.build_log_reference.as_deref(),
        Some(format!("mock://builds/{}/logs", build).as_str())
    );
    assert_eq!(
        record.source_reference.as_deref(),
        Some(format!("mock://artifacts/source/{}/contact-form-api.tar.gz", record.id).as_str())
    );
    assert_eq!(
        record.spec.as_ref().map(|spec| spec.endpoint.path.as_str()),
        Some("/contact")
    );
    record.check_invariants().unwrap();

    h.shutdown().await;
}

#[tokio::test]
async fn test_successful_build_is_deployed() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;

    let deployed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(deployed.status, ServiceStatus::Deployed);
    assert_eq!(
        deployed.deployed_endpoint.as_deref(),
        Some("https://svc.example/contact-form-api")
    );
    assert!(deployed.error_detail.is_none());
    deployed.check_invariants().unwrap();

    let stored = h.stored(&record.id).await.unwrap();
    assert_eq!(stored.status, ServiceStatus::Deployed);
}

#[tokio::test]
async fn test_failed_build_marks_failed() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;
    h.cloud
        .set_build_outcome(record.build_reference.as_deref().unwrap(), BuildState::Failure);

    let failed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(failed.status, ServiceStatus::Failed);
    assert!(failed.deployed_endpoint.is_none());
    let detail = failed.error_detail.unwrap();
    assert!(detail.contains("FAILURE"), "{}", detail);
    assert!(detail.contains(record.build_reference.as_deref().unwrap()));
}

#[tokio::test]
async fn test_expired_build_marks_failed() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;
    h.cloud
        .set_build_outcome(record.build_reference.as_deref().unwrap(), BuildState::Expired);

    let failed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(failed.status, ServiceStatus::Failed);
    assert!(failed.error_detail.unwrap().contains("EXPIRED"));
}

#[tokio::test]
async fn test_succeeded_build_without_endpoint_marks_failed() {
    let h = Harness::new(MockCloud::new().with_registration(Registration::Nothing));
    let record = h.generate(CONTACT_PROMPT).await;

    let failed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(failed.status, ServiceStatus::Failed);
    assert!(failed
        .error_detail
        .unwrap()
        .contains("no endpoint could be resolved"));
}

#[tokio::test]
async fn test_inference_failure_marks_failed() {
    let h = Harness::new(MockCloud::new());
    h.cloud.fail(FailurePoint::Inference);

    let record = h.generate(CONTACT_PROMPT).await;
    assert_eq!(record.status, ServiceStatus::Failed);
    assert!(record.error_detail.unwrap().contains("injected"));
    assert!(record.build_reference.is_none());
    assert!(h.cloud.published().is_empty());
}

#[tokio::test]
async fn test_publish_failure_marks_failed() {
    let h = Harness::new(MockCloud::new());
    h.cloud.fail(FailurePoint::Publish);

    let record = h.generate(CONTACT_PROMPT).await;
    assert_eq!(record.status, ServiceStatus::Failed);
    assert_eq!(record.display_name, "contact-form-api");
    assert!(record.source_reference.is_none());
    assert!(record.build_reference.is_none());
}

#[tokio::test]
async fn test_submit_failure_keeps_source_reference() {
    let h = Harness::new(MockCloud::new());
    h.cloud.fail(FailurePoint::Submit);

    let record = h.generate(CONTACT_PROMPT).await;
    assert_eq!(record.status, ServiceStatus::Failed);
    assert!(record.source_reference.is_some());
    assert!(record.build_reference.is_none());
    assert!(record.error_detail.unwrap().contains("Build submission failed"));
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let h = Harness::new(MockCloud::new().with_polls_until_done(1000));
    let record = h.generate(CONTACT_PROMPT).await;

    let first = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    let second = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(first.status, ServiceStatus::Building);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
    assert_eq!(second.version, record.version);
}

#[tokio::test]
async fn test_terminal_records_are_not_rewritten() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;

    let deployed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    let again = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(
        serde_json::to_value(&deployed).unwrap(),
        serde_json::to_value(&again).unwrap()
    );
    assert_eq!(h.stored(&record.id).await.unwrap().version, deployed.version);
}

#[tokio::test]
async fn test_transient_errors_leave_record_unchanged() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;

    h.cloud.fail(FailurePoint::BuildStatus);
    let unchanged = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(unchanged.status, ServiceStatus::Building);
    assert_eq!(unchanged.version, record.version);

    h.cloud.recover(FailurePoint::BuildStatus);
    h.cloud.fail(FailurePoint::Endpoint);
    let unchanged = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(unchanged.status, ServiceStatus::Building);
    assert_eq!(h.stored(&record.id).await.unwrap().version, record.version);

    h.cloud.recover(FailurePoint::Endpoint);
    let deployed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(deployed.status, ServiceStatus::Deployed);
}

#[tokio::test]
async fn test_list_is_scoped_and_newest_first() {
    let h = Harness::new(MockCloud::new());
    let older = h.generate(CONTACT_PROMPT).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = h.generate("A second contact form").await;

    let other = h.orchestrator.intake("bob", "Something else").await.unwrap();
    h.settle(&other.id).await;

    let listed = h.orchestrator.list(OWNER).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    assert!(listed.iter().all(|r| r.status == ServiceStatus::Deployed));
    for record in &listed {
        record.check_invariants().unwrap();
    }
}

#[tokio::test]
async fn test_get_checks_ownership() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;

    assert!(matches!(
        h.orchestrator.get(&record.id, "mallory").await,
        Err(Error::Permission(_))
    ));
    assert!(matches!(
        h.orchestrator.get("missing", OWNER).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_empty_prompt_is_rejected() {
    let h = Harness::new(MockCloud::new());

    let err = h.orchestrator.intake(OWNER, "   ").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_intake_without_worker_marks_failed() {
    let store = Arc::new(MemoryStore::new());
    let collaborators = mock_collaborators(Arc::new(MockCloud::new()));
    let pipeline = Arc::new(GenerationPipeline::new(store.clone(), collaborators.clone()));
    let (queue, worker) = job_queue(WorkerConfig::default(), pipeline);
    drop(worker);

    let orchestrator = Orchestrator::new(store.clone(), &collaborators, queue);
    assert!(orchestrator.intake(OWNER, CONTACT_PROMPT).await.is_err());

    let records = store.list_by_owner(OWNER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ServiceStatus::Failed);
}

#[tokio::test]
async fn test_artifact_url() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;

    let url = h.orchestrator.artifact_url(&record.id, OWNER).await.unwrap();
    assert_eq!(Some(url), record.source_reference);

    h.cloud.fail(FailurePoint::Publish);
    let unpublished = h.generate(CONTACT_PROMPT).await;
    assert!(matches!(
        h.orchestrator.artifact_url(&unpublished.id, OWNER).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_missing_is_idempotent() {
    let h = Harness::new(MockCloud::new());

    for _ in 0..2 {
        let ack = h.orchestrator.delete("no-such-id", OWNER).await.unwrap();
        assert_eq!(ack, DeleteAck::AlreadyGone);
    }
    assert!(h.cloud.delete_calls().is_empty());
}

#[tokio::test]
async fn test_delete_by_other_owner_is_denied() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;

    let err = h.orchestrator.delete(&record.id, "mallory").await.unwrap_err();
    assert!(matches!(err, Error::Permission(_)));

    let stored = h.stored(&record.id).await.unwrap();
    assert_eq!(stored.status, ServiceStatus::Building);
    assert_eq!(stored.version, record.version);
    assert!(h.cloud.delete_calls().is_empty());
}

#[tokio::test]
async fn test_delete_deployed_service() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;
    h.orchestrator.get(&record.id, OWNER).await.unwrap();

    h.cloud.linger_deletes(true);
    let ack = h.orchestrator.delete(&record.id, OWNER).await.unwrap();
    assert_eq!(
        ack,
        DeleteAck::Initiated {
            service_name: "contact-form-api".to_string()
        }
    );
    assert_eq!(h.cloud.delete_calls(), vec!["contact-form-api"]);

    let deleting = h.stored(&record.id).await.unwrap();
    assert_eq!(deleting.status, ServiceStatus::Deleting);
    assert!(deleting.deployed_endpoint.is_none());

    // Still resolvable on the platform
    let still = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(still.status, ServiceStatus::Deleting);

    h.cloud.finish_deletions();
    assert!(matches!(
        h.orchestrator.get(&record.id, OWNER).await,
        Err(Error::NotFound(_))
    ));
    assert!(h.stored(&record.id).await.is_none());
    assert!(h.orchestrator.list(OWNER).await.unwrap().is_empty());

    let ack = h.orchestrator.delete(&record.id, OWNER).await.unwrap();
    assert_eq!(ack, DeleteAck::AlreadyGone);
}

#[tokio::test]
async fn test_delete_undeployed_service_erases_record() {
    let h = Harness::new(MockCloud::new());
    h.cloud.fail(FailurePoint::Inference);
    let record = h.generate(CONTACT_PROMPT).await;
    assert_eq!(record.status, ServiceStatus::Failed);

    let ack = h.orchestrator.delete(&record.id, OWNER).await.unwrap();
    assert!(matches!(ack, DeleteAck::Removed { .. }));
    assert!(h.stored(&record.id).await.is_none());
}

#[tokio::test]
async fn test_delete_error_keeps_deleting() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;
    h.orchestrator.get(&record.id, OWNER).await.unwrap();

    h.cloud.fail(FailurePoint::Delete);
    let err = h.orchestrator.delete(&record.id, OWNER).await.unwrap_err();
    assert!(matches!(err, Error::Deletion(_)));

    let stored = h.stored(&record.id).await.unwrap();
    assert_eq!(stored.status, ServiceStatus::Deleting);
    assert!(stored.deployed_endpoint.is_none());
    assert!(h.cloud.endpoint_of("contact-form-api").is_some());

    h.cloud.recover(FailurePoint::Delete);
    let ack = h.orchestrator.delete(&record.id, OWNER).await.unwrap();
    assert!(matches!(ack, DeleteAck::Initiated { .. }));
    assert!(matches!(
        h.orchestrator.get(&record.id, OWNER).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_while_building_erases_record() {
    let h = Harness::new(MockCloud::new().with_polls_until_done(1000));
    let record = h.generate(CONTACT_PROMPT).await;

    let ack = h.orchestrator.delete(&record.id, OWNER).await.unwrap();
    assert!(matches!(ack, DeleteAck::Removed { .. }));
    assert!(h.stored(&record.id).await.is_none());
}

#[tokio::test]
async fn test_unresolved_service_after_build_marks_failed() {
    let h = Harness::new(MockCloud::new().with_registration(Registration::Unresolved));
    let record = h.generate(CONTACT_PROMPT).await;

    let failed = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(failed.status, ServiceStatus::Failed);
    assert!(failed.deployed_endpoint.is_none());
    assert!(failed
        .error_detail
        .unwrap()
        .contains("no endpoint could be resolved"));
}

#[tokio::test]
async fn test_deleting_waits_for_unresolved_service() {
    let h = Harness::new(MockCloud::new());
    let record = h.generate(CONTACT_PROMPT).await;
    h.orchestrator.get(&record.id, OWNER).await.unwrap();

    h.cloud.linger_deletes(true);
    h.orchestrator.delete(&record.id, OWNER).await.unwrap();

    // Service still exists, without an endpoint
    h.cloud.deploy_unresolved("contact-form-api");
    let still = h.orchestrator.get(&record.id, OWNER).await.unwrap();
    assert_eq!(still.status, ServiceStatus::Deleting);
    assert!(h.stored(&record.id).await.is_some());

    h.cloud.finish_deletions();
    assert!(matches!(
        h.orchestrator.get(&record.id, OWNER).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_during_publish_stops_before_build() {
    let cloud = Arc::new(MockCloud::new());
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let gated = Arc::new(GatedPublisher {
        inner: cloud.clone(),
        entered: entered.clone(),
        release: release.clone(),
    });
    let h = Harness::with_collaborators(cloud, |collaborators| {
        collaborators.publisher = gated;
    });

    let accepted = h.orchestrator.intake(OWNER, CONTACT_PROMPT).await.unwrap();
    entered.notified().await;

    let ack = h.orchestrator.delete(&accepted.id, OWNER).await.unwrap();
    assert!(matches!(ack, DeleteAck::Removed { .. }));
    release.notify_one();

    let cloud = h.cloud.clone();
    let store = h.store.clone();
    h.shutdown().await;

    assert!(store.get(&accepted.id).await.unwrap().is_none());
    assert_eq!(cloud.builds_submitted(), 0);
    assert!(!cloud.is_deployed("contact-form-api"));
}

#[tokio::test]
async fn test_render_failure_marks_failed() {
    let h = Harness::new(MockCloud::new());
    let mut spec = contact_form_spec();
    spec.endpoint.path = "/items/{id}".to_string();
    spec.validate().unwrap();
    h.cloud.set_spec(spec);

    let record = h.generate(CONTACT_PROMPT).await;
    assert_eq!(record.status, ServiceStatus::Failed);
    assert!(record
        .error_detail
        .unwrap()
        .contains("Source rendering failed"));
    assert!(h.cloud.published().is_empty());
    assert!(record.source_reference.is_none());
}

#[tokio::test]
async fn test_scratch_dir_released_on_every_exit() {
    for failure in [None, Some(FailurePoint::Publish), Some(FailurePoint::Submit)] {
        let h = Harness::new(MockCloud::new());
        if let Some(point) = failure {
            h.cloud.fail(point);
        }

        let record = h.generate(CONTACT_PROMPT).await;
        let expected = if failure.is_some() {
            ServiceStatus::Failed
        } else {
            ServiceStatus::Building
        };
        assert_eq!(record.status, expected, "{:?}", failure);

        let dirs = h.cloud.scratch_dirs();
        assert_eq!(dirs.len(), 1, "{:?}", failure);
        assert!(!dirs[0].exists(), "{:?} left {}", failure, dirs[0].display());
    }
}

#[tokio::test]
async fn test_crashed_pipeline_marks_failed() {
    let h = Harness::with_collaborators(Arc::new(MockCloud::new()), |collaborators| {
        collaborators.inference = Arc::new(CrashingInference);
    });

    let record = h.generate(CONTACT_PROMPT).await;
    assert_eq!(record.status, ServiceStatus::Failed);
    assert!(record
        .error_detail
        .unwrap()
        .contains("Generation aborted unexpectedly"));

    // The worker survives and keeps draining
    h.shutdown().await;
}
