//! Record storage
//!
//! Writes are check-and-set on [`ServiceRecord::version`]: an upsert only
//! lands when the stored revision equals the caller's copy (0 for a record
//! that was never stored). The stored copy gets the next version and a
//! fresh `updated_at`, and is returned to the caller.

pub mod memory;
pub mod redis_store;

use architect_common::{Result, ServiceRecord};
use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ServiceRecord>>;

    /// All records of an owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ServiceRecord>>;

    /// Fails with [`architect_common::Error::Conflict`] on a stale version
    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceRecord>;

    /// Returns whether a record was removed
    async fn delete(&self, id: &str) -> Result<bool>;
}
