//! Orchestrator facade - the operations the HTTP layer exposes

use crate::ports::{ArtifactPublisher, Collaborators, DeleteOutcome, DeploymentPlatform};
use crate::reconcile::Reconciler;
use crate::storage::RecordStore;
use crate::worker::{JobQueue, PipelineJob};
use architect_common::{Error, Result, ServiceRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// Attempts at moving a record to DELETING when writes keep conflicting
const DELETE_ATTEMPTS: usize = 3;

/// How a delete request concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteAck {
    /// No such record; nothing to do
    AlreadyGone,
    /// Nothing was deployed, the record was erased right away
    Removed { service_name: String },
    /// Platform accepted the deletion; the record is erased once it completes
    Initiated { service_name: String },
}

impl DeleteAck {
    pub fn message(&self) -> String {
        match self {
            DeleteAck::AlreadyGone => "Service already deleted.".to_string(),
            DeleteAck::Removed { service_name } => {
                format!("Service '{}' deleted.", service_name)
            }
            DeleteAck::Initiated { service_name } => {
                format!("Deletion initiated for service '{}'.", service_name)
            }
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn RecordStore>,
    queue: JobQueue,
    reconciler: Reconciler,
    deployments: Arc<dyn DeploymentPlatform>,
    publisher: Arc<dyn ArtifactPublisher>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn RecordStore>, collaborators: &Collaborators, queue: JobQueue) -> Self {
        Self {
            reconciler: Reconciler::new(
                store.clone(),
                collaborators.builds.clone(),
                collaborators.deployments.clone(),
            ),
            store,
            queue,
            deployments: collaborators.deployments.clone(),
            publisher: collaborators.publisher.clone(),
        }
    }

    /// Accept a request and hand it to the generation pipeline
    ///
    /// Returns the stored PENDING record without waiting for generation.
    pub async fn intake(&self, owner_id: &str, prompt: &str) -> Result<ServiceRecord> {
        if prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt cannot be empty.".to_string()));
        }

        let record = self
            .store
            .upsert(&ServiceRecord::new(owner_id, prompt))
            .await?;
        info!(
            "Accepted request {} from {} as '{}'",
            record.id, owner_id, record.display_name
        );

        if let Err(e) = self.queue.submit(PipelineJob {
            record: record.clone(),
        }) {
            let mut failed = record;
            failed.mark_failed(e.to_string())?;
            self.store.upsert(&failed).await?;
            return Err(e);
        }

        Ok(record)
    }

    /// All records of an owner after reconciling them, newest first
    pub async fn list(&self, owner_id: &str) -> Result<Vec<ServiceRecord>> {
        self.reconciler.reconcile_owner(owner_id).await
    }

    /// A single record after reconciling it
    pub async fn get(&self, id: &str, owner_id: &str) -> Result<ServiceRecord> {
        let record = self.owned_record(id, owner_id).await?;
        self.reconciler
            .reconcile(record)
            .await
            .ok_or_else(|| Error::NotFound(format!("service {}", id)))
    }

    /// Download link of the published source
    pub async fn artifact_url(&self, id: &str, owner_id: &str) -> Result<String> {
        let record = self.owned_record(id, owner_id).await?;
        record
            .source_reference
            .as_deref()
            .map(|reference| self.publisher.download_url(reference))
            .ok_or_else(|| Error::NotFound(format!("source artifact of service {}", id)))
    }

    /// Tear down a service
    pub async fn delete(&self, id: &str, owner_id: &str) -> Result<DeleteAck> {
        let Some(record) = self.mark_deleting(id, owner_id).await? else {
            return Ok(DeleteAck::AlreadyGone);
        };
        let service_name = record.display_name.clone();

        match self.deployments.delete(&service_name).await? {
            DeleteOutcome::Deleted => {
                info!("Deletion of '{}' initiated for {}", service_name, id);
                Ok(DeleteAck::Initiated { service_name })
            }
            DeleteOutcome::NotFound => {
                self.store.delete(&record.id).await?;
                info!("'{}' was not deployed, erased record {}", service_name, id);
                Ok(DeleteAck::Removed { service_name })
            }
        }
    }

    async fn owned_record(&self, id: &str, owner_id: &str) -> Result<ServiceRecord> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("service {}", id)))?;

        if !record.is_owned_by(owner_id) {
            return Err(Error::Permission(format!(
                "service {} belongs to another user",
                id
            )));
        }

        Ok(record)
    }

    /// Persist DELETING, re-reading the record when a concurrent write wins
    async fn mark_deleting(&self, id: &str, owner_id: &str) -> Result<Option<ServiceRecord>> {
        let mut last_conflict = None;

        for _ in 0..DELETE_ATTEMPTS {
            let Some(mut record) = self.store.get(id).await? else {
                return Ok(None);
            };

            if !record.is_owned_by(owner_id) {
                return Err(Error::Permission(format!(
                    "service {} belongs to another user",
                    id
                )));
            }

            record.mark_deleting()?;
            match self.store.upsert(&record).await {
                Ok(saved) => return Ok(Some(saved)),
                Err(e @ Error::Conflict { .. }) => {
                    warn!("Record {} changed while marking it DELETING, retrying", id);
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or_else(|| Error::Conflict { id: id.to_string() }))
    }
}
