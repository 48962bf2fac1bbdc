//! Redis storage for service records
//!
//! Each record is a hash `architect:service:{id}` with a `version` and a
//! JSON `data` field. Owners index their records in a sorted set
//! `architect:owner:{owner_id}` scored by creation time. Writes go through a
//! Lua script so the version check and the write are atomic.

use super::RecordStore;
use architect_common::{Error, Result, ServiceRecord};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

const CHECK_AND_SET: &str = r#"
local current = redis.call('HGET', KEYS[1], 'version')
if (current or '0') ~= ARGV[1] then
    return 0
end
redis.call('HSET', KEYS[1], 'version', ARGV[2], 'data', ARGV[3])
redis.call('ZADD', KEYS[2], ARGV[4], ARGV[5])
return 1
"#;

/// Storage backend for service records
pub struct RedisStore {
    conn: ConnectionManager,
    check_and_set: Script,
}

fn store_err(err: redis::RedisError) -> Error {
    Error::Store(err.to_string())
}

fn record_key(id: &str) -> String {
    format!("architect:service:{}", id)
}

fn owner_key(owner_id: &str) -> String {
    format!("architect:owner:{}", owner_id)
}

impl RedisStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(store_err)?;

        let conn = ConnectionManager::new(client).await.map_err(store_err)?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            check_and_set: Script::new(CHECK_AND_SET),
        })
    }

    /// Round-trip a PING
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<ServiceRecord>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn
            .hget(record_key(id), "data")
            .await
            .map_err(store_err)?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ServiceRecord>> {
        let mut conn = self.conn.clone();
        let owner_key = owner_key(owner_id);
        let ids: Vec<String> = conn
            .zrevrange(&owner_key, 0, -1)
            .await
            .map_err(store_err)?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await? {
                Some(record) => records.push(record),
                None => {
                    // Index entry outlived its record
                    let _: () = conn.zrem(&owner_key, &id).await.map_err(store_err)?;
                }
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceRecord> {
        let mut conn = self.conn.clone();
        let next = record.next_revision();
        let json = serde_json::to_string(&next)?;

        let written: i32 = self
            .check_and_set
            .key(record_key(&next.id))
            .key(owner_key(&next.owner_id))
            .arg(record.version.to_string())
            .arg(next.version.to_string())
            .arg(json)
            .arg(next.created_at.timestamp_millis())
            .arg(&next.id)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        if written == 0 {
            return Err(Error::Conflict {
                id: record.id.clone(),
            });
        }

        debug!(
            "Stored record {} v{} status {}",
            next.id, next.version, next.status
        );
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let Some(record) = self.get(id).await? else {
            return Ok(false);
        };

        let mut conn = self.conn.clone();
        let (deleted, _): (i32, i32) = redis::pipe()
            .atomic()
            .del(record_key(id))
            .zrem(owner_key(&record.owner_id), id)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        if deleted > 0 {
            info!("Deleted record {}", id);
        }
        Ok(deleted > 0)
    }
}
