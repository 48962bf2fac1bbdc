//! Generation pipeline - drives one record from intake to a submitted build
//!
//! Steps: infer spec, settle the service name, render the source, publish
//! it, submit the build, mark BUILDING. Any failure lands the record in
//! FAILED with the error as its detail.
//!
//! Every write is check-and-set, and the record is written right before the
//! build is submitted: a record deleted while the source was rendered or
//! uploaded stops the pipeline before anything is deployed.

use crate::ports::Collaborators;
use crate::storage::RecordStore;
use architect_common::{sanitize_service_name, Error, Result, ServiceRecord, ServiceStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct GenerationPipeline {
    store: Arc<dyn RecordStore>,
    collaborators: Collaborators,
}

impl GenerationPipeline {
    pub fn new(store: Arc<dyn RecordStore>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Run the pipeline for a freshly stored PENDING record
    ///
    /// Never returns an error: the outcome is always persisted on the
    /// record, or logged when even that write is impossible.
    pub async fn run(&self, record: ServiceRecord) {
        let mut record = record;
        info!("Generating service for record {}", record.id);

        match self.execute(&mut record).await {
            Ok(()) => {
                info!(
                    "Record {} is BUILDING as '{}' (build {})",
                    record.id,
                    record.display_name,
                    record.build_reference.as_deref().unwrap_or_default()
                );
            }
            Err(e) => {
                error!("Generation failed for record {}: {}", record.id, e);
                self.fail(record, e).await;
            }
        }
    }

    async fn execute(&self, record: &mut ServiceRecord) -> Result<()> {
        let collaborators = &self.collaborators;

        let mut spec = collaborators.inference.infer(&record.source_prompt).await?;

        let name = sanitize_service_name(&spec.service_name);
        if name.is_empty() {
            warn!(
                "Inferred name '{}' is unusable, keeping '{}'",
                spec.service_name, record.display_name
            );
        } else {
            record.rename(&name)?;
        }
        spec.service_name = record.display_name.clone();
        record.spec = Some(spec.clone());
        *record = self.store.upsert(record).await?;

        let source = {
            let artifact = collaborators.builder.render(&spec).await?;
            collaborators.publisher.publish(&record.id, &artifact).await?
        };
        record.source_reference = Some(source.to_string());
        *record = self.store.upsert(record).await?;

        let build = collaborators
            .builds
            .submit(&source, &record.display_name)
            .await?;
        let log_url = collaborators.builds.log_url(&build);

        let mut next = record.clone();
        next.mark_building(build.to_string(), log_url)?;
        *record = self.store.upsert(&next).await?;

        Ok(())
    }

    /// Mark a record FAILED after its pipeline died without reporting back
    ///
    /// Only a record still PENDING is touched; later states were written by
    /// the pipeline itself or by a concurrent delete.
    pub async fn abandon(&self, id: &str, detail: String) {
        match self.store.get(id).await {
            Ok(Some(record)) if record.status == ServiceStatus::Pending => {
                self.fail(record, Error::Other(anyhow::anyhow!(detail))).await;
            }
            Ok(_) => {}
            Err(e) => error!("Cannot load abandoned record {}: {}", id, e),
        }
    }

    async fn fail(&self, mut record: ServiceRecord, cause: Error) {
        if let Err(e) = record.mark_failed(cause.to_string()) {
            error!("Cannot mark record {} as FAILED: {}", record.id, e);
            return;
        }

        match self.store.upsert(&record).await {
            Ok(_) => info!("Record {} is FAILED", record.id),
            Err(Error::Conflict { .. }) => warn!(
                "Record {} changed while its pipeline ran, leaving it as stored",
                record.id
            ),
            Err(e) => error!("Failed to persist failure of record {}: {}", record.id, e),
        }
    }
}
