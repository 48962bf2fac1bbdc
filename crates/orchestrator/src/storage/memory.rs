//! In-process record store for development and tests

use super::RecordStore;
use architect_common::{Error, Result, ServiceRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ServiceRecord>>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Store("lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<ServiceRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ServiceRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        let mut owned: Vec<ServiceRecord> = records
            .values()
            .filter(|r| r.is_owned_by(owner_id))
            .cloned()
            .collect();

        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceRecord> {
        let mut records = self.records.write().map_err(poison_err)?;

        let stored_version = records.get(&record.id).map(|r| r.version).unwrap_or(0);
        if stored_version != record.version {
            return Err(Error::Conflict {
                id: record.id.clone(),
            });
        }

        let next = record.next_revision();
        records.insert(next.id.clone(), next.clone());
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(poison_err)?;
        Ok(records.remove(id).is_some())
    }
}
