//! Integration Tests for the Cache Client
//!
//! Exercises the public client surface over the embedded store, including
//! expiry behaviour under a paused clock.

use std::collections::HashMap;
use std::time::Duration;

use cache_commons::cache::CacheError;
use cache_commons::error::{self, codes};
use cache_commons::{spawn_cleanup_task, CacheClient, CacheConfig, MemoryStore, Topology};
use serde::{Deserialize, Serialize};
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
}

fn create_client() -> CacheClient {
    CacheClient::embedded(MemoryStore::new())
}

// == Strings and Structs ==

#[tokio::test]
async fn test_set_and_get_string() {
    let client = create_client();

    client.set("greeting", "hello", Duration::ZERO).await.unwrap();

    assert_eq!(client.get_string("greeting").await.unwrap(), "hello");
    assert_eq!(client.get("greeting").await.unwrap(), b"hello".to_vec());
}

#[tokio::test]
async fn test_struct_roundtrip() {
    let client = create_client();
    let session = Session {
        user_id: 42,
        roles: vec!["admin".to_string()],
    };

    client
        .set_struct("session:42", &session, Duration::from_secs(60))
        .await
        .unwrap();

    let read: Session = client.read_struct("session:42").await.unwrap();
    assert_eq!(read, session);
}

#[tokio::test]
async fn test_read_struct_decode_failure_is_internal() {
    let client = create_client();
    client.set("session:bad", "not json", Duration::ZERO).await.unwrap();

    let err = client.read_struct::<Session>("session:bad").await.unwrap_err();

    assert!(!err.is_cache_miss());
    assert_eq!(err.code(), codes::INTERNAL);
    assert!(matches!(
        err.downcast_cause::<CacheError>(),
        Some(CacheError::Serialization(_))
    ));
}

#[tokio::test]
async fn test_missing_key_is_cache_miss() {
    let client = create_client();

    let err = client.read_struct::<Session>("session:none").await.unwrap_err();

    assert!(err.is_cache_miss());
    assert!(error::is_cache_miss(&err));
    assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
}

// == Expiry ==

#[tokio::test(start_paused = true)]
async fn test_value_expires_after_ttl() {
    let client = create_client();
    client.set("otp", "123456", Duration::from_secs(30)).await.unwrap();

    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(client.get_string("otp").await.unwrap(), "123456");

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(client.get("otp").await.unwrap_err().is_cache_miss());
}

#[tokio::test(start_paused = true)]
async fn test_expire_and_ttl() {
    let client = create_client();
    client.set("token", "t", Duration::ZERO).await.unwrap();
    assert_eq!(client.ttl("token").await.unwrap(), None);

    assert!(client.expire("token", Duration::from_secs(10)).await.unwrap());
    assert_eq!(client.ttl("token").await.unwrap(), Some(Duration::from_secs(10)));

    assert!(!client.expire("absent", Duration::from_secs(10)).await.unwrap());
}

#[tokio::test]
async fn test_ttl_beyond_backend_range_is_rejected() {
    let client = create_client();

    let err = assert_err!(client.set("k", "v", Duration::MAX).await);
    assert_eq!(err.code(), codes::BAD_REQUEST);
    let err = assert_err!(client.hset_ex("h", "f", "v", Duration::MAX).await);
    assert_eq!(err.code(), codes::BAD_REQUEST);

    // The longest accepted TTL is stored as a live key
    assert_ok!(client.set("k", "v", cache_commons::cache::MAX_TTL).await);
    assert!(client.ttl("k").await.unwrap().is_some());
}

// == Counters and Keys ==

#[tokio::test]
async fn test_incr_and_del() {
    let client = create_client();

    assert_eq!(client.incr("visits").await.unwrap(), 1);
    assert_eq!(client.incr("visits").await.unwrap(), 2);
    assert_eq!(client.get_string("visits").await.unwrap(), "2");

    assert!(client.del("visits").await.unwrap());
    assert!(!client.del("visits").await.unwrap());
}

#[tokio::test]
async fn test_keys_pattern() {
    let client = create_client();
    for key in ["user:1", "user:2", "order:1"] {
        client.set(key, "v", Duration::ZERO).await.unwrap();
    }

    assert_eq!(client.keys("user:*").await.unwrap(), vec!["user:1", "user:2"]);
    assert!(client.keys("cart:*").await.unwrap().is_empty());
}

// == Hashes ==

#[tokio::test]
async fn test_hash_operations() {
    let client = create_client();

    assert!(client.hset("user:1", "name", "Ada").await.unwrap());
    assert!(client.hset("user:1", "lang", "en").await.unwrap());

    assert_eq!(client.hget("user:1", "name").await.unwrap(), "Ada");
    assert!(client.hget("user:1", "email").await.unwrap_err().is_cache_miss());

    let all = client.hget_all("user:1").await.unwrap();
    assert_eq!(
        all,
        HashMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("lang".to_string(), "en".to_string()),
        ])
    );
    assert!(client.hget_all("user:none").await.unwrap().is_empty());

    assert!(client.hdel("user:1", "lang").await.unwrap());
    assert!(!client.hdel("user:1", "lang").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_hset_ex_refreshes_expiry() {
    let client = create_client();

    client
        .hset_ex("cart:1", "sku-1", "2", Duration::from_secs(60))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(50)).await;

    client
        .hset_ex("cart:1", "sku-2", "1", Duration::from_secs(60))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(50)).await;

    // Both fields survive: the second write pushed the whole key's expiry out
    assert_eq!(client.hget("cart:1", "sku-1").await.unwrap(), "2");
    assert_eq!(client.hget_all("cart:1").await.unwrap().len(), 2);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(client.hget("cart:1", "sku-1").await.unwrap_err().is_cache_miss());
}

// == Lifecycle ==

#[tokio::test]
async fn test_close_rejects_operations() {
    let client = create_client();
    assert_eq!(client.topology(), Topology::Embedded);

    assert_ok!(client.close());
    assert_ok!(client.close());

    let err = assert_err!(client.set("k", "v", Duration::ZERO).await);
    assert_eq!(err.code(), codes::INTERNAL);
    assert!(!err.is_cache_miss());
}

#[tokio::test]
async fn test_connect_rejects_empty_addrs() {
    let config = CacheConfig {
        addrs: Vec::new(),
        ..CacheConfig::default()
    };

    let err = assert_err!(CacheClient::connect(&config).await);
    assert_eq!(err.code(), codes::INTERNAL);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_task_shrinks_store() {
    let store = MemoryStore::new();
    let client = CacheClient::embedded(store.clone());
    let handle = spawn_cleanup_task(store.clone(), 1);

    client.set("short", "v", Duration::from_secs(1)).await.unwrap();
    client.set("long", "v", Duration::from_secs(600)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(store.len().await, 1);
    assert_eq!(client.get_string("long").await.unwrap(), "v");
    handle.abort();
}
