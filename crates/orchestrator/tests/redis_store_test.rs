//! Redis store tests; run with a local Redis via `--ignored`

use architect_common::{Error, ServiceRecord};
use architect_orchestrator::{RecordStore, RedisStore};
use std::time::Duration;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

fn unique_owner() -> String {
    format!("test-owner-{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_upsert_and_get() {
    let store = RedisStore::new(&redis_url()).await.unwrap();
    store.health_check().await.unwrap();

    let record = ServiceRecord::new(unique_owner(), "A contact form API");
    let saved = store.upsert(&record).await.unwrap();
    assert_eq!(saved.version, record.version + 1);

    let loaded = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, record.id);
    assert_eq!(loaded.version, saved.version);

    assert!(store.delete(&record.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_stale_write_conflicts() {
    let store = RedisStore::new(&redis_url()).await.unwrap();

    let record = ServiceRecord::new(unique_owner(), "Conflicts");
    let saved = store.upsert(&record).await.unwrap();
    store.upsert(&saved).await.unwrap();

    let err = store.upsert(&saved).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    store.delete(&record.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_deleted_record_is_not_resurrected() {
    let store = RedisStore::new(&redis_url()).await.unwrap();

    let saved = store
        .upsert(&ServiceRecord::new(unique_owner(), "Short lived"))
        .await
        .unwrap();
    assert!(store.delete(&saved.id).await.unwrap());
    assert!(!store.delete(&saved.id).await.unwrap());

    assert!(matches!(
        store.upsert(&saved).await,
        Err(Error::Conflict { .. })
    ));
    assert!(store.get(&saved.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_list_by_owner_newest_first() {
    let store = RedisStore::new(&redis_url()).await.unwrap();
    let owner = unique_owner();

    let older = store
        .upsert(&ServiceRecord::new(owner.clone(), "first"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = store
        .upsert(&ServiceRecord::new(owner.clone(), "second"))
        .await
        .unwrap();

    let listed = store.list_by_owner(&owner).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

    store.delete(&older.id).await.unwrap();
    store.delete(&newer.id).await.unwrap();
    assert!(store.list_by_owner(&owner).await.unwrap().is_empty());
}
