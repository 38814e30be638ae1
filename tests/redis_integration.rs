//! Integration Tests against a live Redis
//!
//! Enable with: --features test-services
//!
//! `REDIS_ADDRS` selects the single node (default localhost:6379).
//! `REDIS_CLUSTER_ADDRS` (comma-separated) enables the cluster tests.
//! Tests skip with a warning when the server is unreachable.

#![cfg(feature = "test-services")]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cache_commons::{CacheClient, CacheConfig, CacheRateLimiter, RateLimiter, Topology};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    id: u32,
    label: String,
}

/// Routes `warn!` skip notices to the test output.
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn unique_key(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("test:{prefix}:{nanos}")
}

async fn single_node() -> Option<CacheClient> {
    init_test_logging();
    let config = CacheConfig {
        dial_timeout_ms: 2000,
        ..CacheConfig::from_env()
    };
    match CacheClient::connect(&config).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Skipping Redis test (not available): {}", e.description().unwrap_or_default());
            None
        }
    }
}

async fn cluster() -> Option<CacheClient> {
    init_test_logging();
    let Ok(raw) = std::env::var("REDIS_CLUSTER_ADDRS") else {
        warn!("Skipping cluster test: REDIS_CLUSTER_ADDRS is not set");
        return None;
    };
    let addrs: Vec<String> = raw
        .split(',')
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .collect();
    if addrs.len() < 2 {
        warn!("Skipping cluster test: REDIS_CLUSTER_ADDRS needs at least two nodes");
        return None;
    }
    let config = CacheConfig {
        addrs,
        dial_timeout_ms: 2000,
        ..CacheConfig::default()
    };
    match CacheClient::connect(&config).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Skipping cluster test (not available): {}", e.description().unwrap_or_default());
            None
        }
    }
}

#[tokio::test]
async fn test_single_node_crud() {
    let Some(client) = single_node().await else {
        return;
    };
    assert_eq!(client.topology(), Topology::SingleNode);
    assert!(!client.cluster_mode());

    let key = unique_key("crud");
    let item = Item {
        id: 7,
        label: "seven".to_string(),
    };

    client.set_struct(&key, &item, Duration::from_secs(60)).await.unwrap();
    let read: Item = client.read_struct(&key).await.unwrap();
    assert_eq!(read, item);

    let ttl = client.ttl(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(60));

    assert!(client.del(&key).await.unwrap());
    assert!(client.get(&key).await.unwrap_err().is_cache_miss());

    client.close().unwrap();
}

#[tokio::test]
async fn test_single_node_hash_with_expiry() {
    let Some(client) = single_node().await else {
        return;
    };
    let key = unique_key("hash");

    client.hset_ex(&key, "f1", "v1", Duration::from_secs(30)).await.unwrap();
    assert_eq!(client.hget(&key, "f1").await.unwrap(), "v1");
    assert!(client.ttl(&key).await.unwrap().is_some());

    client.hset_ex(&key, "f2", "v2", Duration::ZERO).await.unwrap();
    assert_eq!(client.ttl(&key).await.unwrap(), None);
    assert_eq!(client.hget_all(&key).await.unwrap().len(), 2);

    client.del(&key).await.unwrap();
}

#[tokio::test]
async fn test_single_node_rejects_oversized_ttl() {
    let Some(client) = single_node().await else {
        return;
    };
    let key = unique_key("huge");

    let err = client.set(&key, "v", Duration::MAX).await.unwrap_err();
    assert_eq!(err.code(), cache_commons::error::codes::BAD_REQUEST);
    assert!(client.get(&key).await.unwrap_err().is_cache_miss());
}

#[tokio::test]
async fn test_single_node_rate_limit() {
    let Some(client) = single_node().await else {
        return;
    };
    let client = Arc::new(client);
    let limiter = CacheRateLimiter::new(client.clone());
    let key = unique_key("rl");

    for _ in 0..3 {
        assert!(limiter.rate_limit(&key, 3, 60).await.unwrap().allowed);
    }
    let denied = limiter.rate_limit(&key, 3, 60).await.unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.count, 4);
    assert!(denied.retry_after > Duration::ZERO);

    client.del(&format!("rate:{key}")).await.unwrap();
}

#[tokio::test]
async fn test_cluster_struct_roundtrip() {
    let Some(client) = cluster().await else {
        return;
    };
    assert!(client.cluster_mode());

    let key = unique_key("cluster");
    let item = Item {
        id: 1,
        label: "one".to_string(),
    };

    client.set_struct(&key, &item, Duration::from_secs(60)).await.unwrap();
    let read: Item = client.read_struct(&key).await.unwrap();
    assert_eq!(read, item);

    let (count, ttl) = client
        .incr_window(&unique_key("cluster-rl"), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert!(ttl.is_some());

    client.del(&key).await.unwrap();
}
