//! Service records and their lifecycle
//!
//! A [`ServiceRecord`] is the single persisted entity. Its [`ServiceStatus`]
//! only moves along the transitions allowed by
//! [`ServiceStatus::can_transition_to`]; every mutating helper on the record
//! goes through that check.

use crate::error::{Error, Result};
use crate::naming::{provisional_name, validate_service_name};
use crate::spec::ServiceSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    /// Accepted, generation pipeline not finished yet
    Pending,
    /// Build submitted to the external build system
    Building,
    /// Build succeeded and the endpoint is reachable
    Deployed,
    /// Generation or build failed
    Failed,
    /// Owner requested teardown, waiting for the platform to confirm
    Deleting,
}

impl ServiceStatus {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: ServiceStatus) -> bool {
        use ServiceStatus::*;

        match (self, next) {
            (_, Deleting) => true,
            (Pending, Building) | (Pending, Failed) => true,
            (Building, Deployed) | (Building, Failed) => true,
            (Pending, _) | (Building, _) | (Deployed, _) | (Failed, _) | (Deleting, _) => false,
        }
    }

    /// DEPLOYED and FAILED see no further automatic transition
    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceStatus::Deployed | ServiceStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Pending => "PENDING",
            ServiceStatus::Building => "BUILDING",
            ServiceStatus::Deployed => "DEPLOYED",
            ServiceStatus::Failed => "FAILED",
            ServiceStatus::Deleting => "DELETING",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested service and everything known about its deployment
///
/// Field names on the wire follow the dashboard client's contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Unique record identifier
    pub id: String,

    /// Identity of the requester
    #[serde(rename = "user_id")]
    pub owner_id: String,

    /// Deployment target name
    #[serde(rename = "service_name")]
    pub display_name: String,

    /// Natural-language request the service was generated from
    #[serde(rename = "prompt")]
    pub source_prompt: String,

    /// Current lifecycle status
    pub status: ServiceStatus,

    /// External build identifier
    #[serde(rename = "build_id", default, skip_serializing_if = "Option::is_none")]
    pub build_reference: Option<String>,

    /// Link to the build logs
    #[serde(rename = "build_log_url", default, skip_serializing_if = "Option::is_none")]
    pub build_log_reference: Option<String>,

    /// Public URL of the running service
    #[serde(rename = "deployed_url", default, skip_serializing_if = "Option::is_none")]
    pub deployed_endpoint: Option<String>,

    /// Durable location of the packaged source
    #[serde(rename = "source_blob", default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,

    /// Inferred service specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ServiceSpec>,

    /// Failure description
    #[serde(rename = "error_message", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Store revision, bumped on every successful write
    #[serde(default)]
    pub version: u64,
}

impl ServiceRecord {
    /// Create a new PENDING record with a provisional name
    pub fn new(owner_id: impl Into<String>, source_prompt: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let source_prompt = source_prompt.into();
        let now = Utc::now();

        Self {
            id: id.to_string(),
            owner_id: owner_id.into(),
            display_name: provisional_name(&source_prompt, &id),
            source_prompt,
            status: ServiceStatus::Pending,
            build_reference: None,
            build_log_reference: None,
            deployed_endpoint: None,
            source_reference: None,
            spec: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Copy of this record as the store persists it: next version, fresh timestamp
    pub fn next_revision(&self) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        next
    }

    /// Replace the provisional name; only allowed before a build exists
    pub fn rename(&mut self, name: &str) -> Result<()> {
        if self.status != ServiceStatus::Pending {
            return Err(Error::Validation(format!(
                "cannot rename service in status {}",
                self.status
            )));
        }
        validate_service_name(name)?;
        self.display_name = name.to_string();
        Ok(())
    }

    /// PENDING → BUILDING
    pub fn mark_building(&mut self, build_id: String, build_log_url: String) -> Result<()> {
        self.transition(ServiceStatus::Building)?;
        self.build_reference = Some(build_id);
        self.build_log_reference = Some(build_log_url);
        Ok(())
    }

    /// BUILDING → DEPLOYED
    pub fn mark_deployed(&mut self, endpoint: String) -> Result<()> {
        self.transition(ServiceStatus::Deployed)?;
        self.deployed_endpoint = Some(endpoint);
        self.error_detail = None;
        Ok(())
    }

    /// PENDING | BUILDING → FAILED
    pub fn mark_failed(&mut self, detail: impl Into<String>) -> Result<()> {
        self.transition(ServiceStatus::Failed)?;
        self.deployed_endpoint = None;
        self.error_detail = Some(detail.into());
        Ok(())
    }

    /// any → DELETING
    pub fn mark_deleting(&mut self) -> Result<()> {
        self.transition(ServiceStatus::Deleting)?;
        self.deployed_endpoint = None;
        Ok(())
    }

    /// Check the record-level invariants
    pub fn check_invariants(&self) -> Result<()> {
        if self.deployed_endpoint.is_some() && self.status != ServiceStatus::Deployed {
            return Err(Error::Validation(format!(
                "record {} has an endpoint while {}",
                self.id, self.status
            )));
        }

        if self.status == ServiceStatus::Building && self.build_reference.is_none() {
            return Err(Error::Validation(format!(
                "record {} is BUILDING without a build reference",
                self.id
            )));
        }

        Ok(())
    }

    fn transition(&mut self, next: ServiceStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building_record() -> ServiceRecord {
        let mut record = ServiceRecord::new("owner-1", "contact form api");
        record
            .mark_building("build-1".to_string(), "https://logs/build-1".to_string())
            .unwrap();
        record
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = ServiceRecord::new("owner-1", "contact form api");
        assert_eq!(record.status, ServiceStatus::Pending);
        assert_eq!(record.version, 0);
        assert!(record.display_name.starts_with("contact-form-api-"));
        assert!(record.check_invariants().is_ok());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut record = building_record();
        assert_eq!(record.build_reference.as_deref(), Some("build-1"));

        record
            .mark_deployed("https://svc.example/contact-form-api".to_string())
            .unwrap();
        assert_eq!(record.status, ServiceStatus::Deployed);
        assert!(record.check_invariants().is_ok());

        record.mark_deleting().unwrap();
        assert_eq!(record.status, ServiceStatus::Deleting);
        assert!(record.deployed_endpoint.is_none());
        assert!(record.check_invariants().is_ok());
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let mut record = ServiceRecord::new("owner-1", "x");
        record.mark_failed("inference failed").unwrap();
        assert_eq!(record.status, ServiceStatus::Failed);
        assert!(record.build_reference.is_none());
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let mut record = ServiceRecord::new("owner-1", "x");
        let err = record.mark_deployed("https://x".to_string()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: ServiceStatus::Pending,
                to: ServiceStatus::Deployed
            }
        ));
        assert_eq!(record.status, ServiceStatus::Pending);
        assert!(record.deployed_endpoint.is_none());

        let mut record = building_record();
        record.mark_failed("boom").unwrap();
        assert!(record
            .mark_building("b2".to_string(), "l".to_string())
            .is_err());
        assert!(record.mark_deployed("https://x".to_string()).is_err());

        record.mark_deleting().unwrap();
        assert!(record.mark_failed("late").is_err());
        assert!(record.mark_deleting().is_ok());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ServiceStatus::Deployed.is_terminal());
        assert!(ServiceStatus::Failed.is_terminal());
        assert!(!ServiceStatus::Pending.is_terminal());
        assert!(!ServiceStatus::Building.is_terminal());
        assert!(!ServiceStatus::Deleting.is_terminal());
    }

    #[test]
    fn test_rename_only_while_pending() {
        let mut record = ServiceRecord::new("owner-1", "x");
        record.rename("contact-form-api").unwrap();
        assert_eq!(record.display_name, "contact-form-api");
        assert!(record.rename("Bad Name").is_err());

        let mut record = building_record();
        assert!(record.rename("other-name").is_err());
    }

    #[test]
    fn test_next_revision_bumps_version() {
        let record = ServiceRecord::new("owner-1", "x");
        let next = record.next_revision();
        assert_eq!(next.version, 1);
        assert!(next.updated_at >= record.updated_at);
        assert_eq!(next.id, record.id);
    }

    #[test]
    fn test_wire_format_uses_client_field_names() {
        let record = building_record();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["status"], "BUILDING");
        assert_eq!(json["user_id"], "owner-1");
        assert_eq!(json["prompt"], "contact form api");
        assert_eq!(json["build_id"], "build-1");
        assert!(json.get("deployed_url").is_none());

        let back: ServiceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
