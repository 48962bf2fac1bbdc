//! Reconciliation loop
//!
//! Compares each non-terminal record with what the build system and the
//! runtime platform report, and moves the record forward when they
//! disagree. Checks for different records run concurrently. A check that
//! cannot reach a verdict leaves the record untouched for the next pass.

use crate::ports::{BuildId, BuildState, BuildTrigger, Deployment, DeploymentPlatform};
use crate::storage::RecordStore;
use architect_common::{Error, Result, ServiceRecord, ServiceStatus};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    builds: Arc<dyn BuildTrigger>,
    deployments: Arc<dyn DeploymentPlatform>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        builds: Arc<dyn BuildTrigger>,
        deployments: Arc<dyn DeploymentPlatform>,
    ) -> Self {
        Self {
            store,
            builds,
            deployments,
        }
    }

    /// Reconcile every record of `owner_id`; erased records are omitted
    pub async fn reconcile_owner(&self, owner_id: &str) -> Result<Vec<ServiceRecord>> {
        let records = self.store.list_by_owner(owner_id).await?;
        debug!("Reconciling {} records of {}", records.len(), owner_id);

        let checked = join_all(records.into_iter().map(|record| self.reconcile(record))).await;

        Ok(checked.into_iter().flatten().collect())
    }

    /// Reconcile one record; `None` when it has been erased
    pub async fn reconcile(&self, record: ServiceRecord) -> Option<ServiceRecord> {
        match record.status {
            ServiceStatus::Building => self.check_build(record).await,
            ServiceStatus::Deleting => self.check_deletion(record).await,
            ServiceStatus::Pending | ServiceStatus::Deployed | ServiceStatus::Failed => {
                Some(record)
            }
        }
    }

    async fn check_build(&self, record: ServiceRecord) -> Option<ServiceRecord> {
        let Some(build_ref) = record.build_reference.clone() else {
            warn!("Record {} is BUILDING without a build reference", record.id);
            return Some(record);
        };
        let build = BuildId::new(build_ref);

        let state = match self.builds.status(&build).await {
            Ok(state) => state,
            Err(e) => {
                log_unverified(&record, &format!("build {}", build), &e);
                return Some(record);
            }
        };

        let mut next = record.clone();
        let applied = match state {
            BuildState::Running => {
                debug!("Build {} of {} still running", build, record.id);
                return Some(record);
            }
            BuildState::Success => match self.deployments.lookup(&record.display_name).await {
                Ok(Deployment::Ready(url)) => next.mark_deployed(url),
                Ok(Deployment::Absent | Deployment::Unresolved) => next.mark_failed(format!(
                    "Build {} succeeded but no endpoint could be resolved for service '{}'",
                    build, record.display_name
                )),
                Err(e) => {
                    log_unverified(&record, &format!("endpoint of '{}'", record.display_name), &e);
                    return Some(record);
                }
            },
            BuildState::Failure | BuildState::Cancelled | BuildState::Expired => next.mark_failed(
                format!("Build {} finished with status {}", build, state),
            ),
        };

        if let Err(e) = applied {
            warn!("Skipping update of {}: {}", record.id, e);
            return Some(record);
        }

        self.persist(record, next).await
    }

    async fn check_deletion(&self, record: ServiceRecord) -> Option<ServiceRecord> {
        match self.deployments.lookup(&record.display_name).await {
            Ok(Deployment::Absent) => match self.store.delete(&record.id).await {
                Ok(_) => {
                    info!(
                        "Service '{}' is gone, erased record {}",
                        record.display_name, record.id
                    );
                    None
                }
                Err(e) => {
                    warn!("Could not erase record {}: {}", record.id, e);
                    Some(record)
                }
            },
            Ok(Deployment::Ready(_) | Deployment::Unresolved) => {
                debug!("Service '{}' is still being deleted", record.display_name);
                Some(record)
            }
            Err(e) => {
                log_unverified(&record, &format!("deletion of '{}'", record.display_name), &e);
                Some(record)
            }
        }
    }

    async fn persist(&self, current: ServiceRecord, next: ServiceRecord) -> Option<ServiceRecord> {
        match self.store.upsert(&next).await {
            Ok(saved) => {
                info!(
                    "Record {} moved {} -> {}",
                    saved.id, current.status, saved.status
                );
                Some(saved)
            }
            Err(Error::Conflict { .. }) => {
                debug!("Record {} changed during reconciliation, reloading", current.id);
                match self.store.get(&current.id).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        warn!("Could not reload record {}: {}", current.id, e);
                        Some(current)
                    }
                }
            }
            Err(e) => {
                warn!("Could not persist record {}: {}", current.id, e);
                Some(current)
            }
        }
    }
}

/// A check without a verdict; the record is left for the next pass
fn log_unverified(record: &ServiceRecord, subject: &str, err: &Error) {
    if err.is_transient() {
        warn!("Could not check {} for {}: {}", subject, record.id, err);
    } else {
        error!("Unexpected error checking {} for {}: {}", subject, record.id, err);
    }
}
