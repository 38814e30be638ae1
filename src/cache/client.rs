//! Cache Client
//!
//! Topology-transparent front for the cache backends. The client picks a
//! backend once at construction (one address = single node, several =
//! cluster), normalizes "key absent" into `cache_miss`, wraps every other
//! backend fault as `internal`, and never retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::backend::{ttl_millis, Backend, CacheBackend, KeyTtl};
use super::error::{CacheError, CacheResult};
use super::memory::MemoryStore;
use super::redis::RedisBackend;
use crate::config::CacheConfig;
use crate::error::{Result, StructuredError};

/// Physical topology behind a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    SingleNode,
    Cluster,
    /// In-process [`MemoryStore`]
    Embedded,
}

// == Cache Client ==
/// Shared cache handle. Safe for unsynchronized concurrent use: every call
/// works on its own clone of the multiplexed connection.
pub struct CacheClient {
    /// `None` once closed
    backend: RwLock<Option<Backend>>,
    topology: Topology,
    op_timeout: Option<Duration>,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("topology", &self.topology)
            .field("op_timeout", &self.op_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Bounds `fut` by `limit` when one is configured.
async fn bounded<T>(
    limit: Option<Duration>,
    op: &str,
    fut: impl Future<Output = CacheResult<T>>,
) -> CacheResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| CacheError::Timeout(format!("{op} exceeded {limit:?}")))?,
        None => fut.await,
    }
}

fn miss(key: &str) -> StructuredError {
    StructuredError::cache_miss(CacheError::Miss(key.to_string()))
}

impl CacheClient {
    // == Constructors ==
    /// Connects to the configured backend and probes it with `PING`.
    ///
    /// An empty address list is a configuration error. Probe failures are
    /// returned as-is; the caller owns the retry policy.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let dial = config.dial_timeout();
        let (backend, topology) = match config.addrs.as_slice() {
            [] => {
                return Err(StructuredError::internal(CacheError::InvalidConfig(
                    "address list is empty".to_string(),
                )))
            }
            [addr] => {
                let url = config.connection_url(addr);
                let backend = bounded(dial, "connect", RedisBackend::connect_single(&url))
                    .await
                    .map_err(connection_error)?;
                (Backend::Single(backend), Topology::SingleNode)
            }
            addrs => {
                let nodes = addrs.iter().map(|addr| CacheConfig::node_url(addr)).collect();
                let backend = bounded(
                    dial,
                    "connect",
                    RedisBackend::connect_cluster(nodes, config.password.clone()),
                )
                .await
                .map_err(connection_error)?;
                (Backend::Cluster(backend), Topology::Cluster)
            }
        };

        bounded(dial, "ping", backend.ping())
            .await
            .map_err(connection_error)?;

        info!(topology = ?topology, nodes = config.addrs.len(), "Cache client connected");
        Ok(Self {
            backend: RwLock::new(Some(backend)),
            topology,
            op_timeout: config.operation_timeout(),
        })
    }

    /// Wraps an in-process store. No timeouts apply.
    pub fn embedded(store: MemoryStore) -> Self {
        Self {
            backend: RwLock::new(Some(Backend::Embedded(store))),
            topology: Topology::Embedded,
            op_timeout: None,
        }
    }

    /// Bounds every later operation by `timeout`. Zero disables the bound.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    // == Topology ==
    /// Reports whether the cluster handle is active.
    pub fn cluster_mode(&self) -> bool {
        self.topology == Topology::Cluster
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    // == Lifecycle ==
    /// Releases the connection. Safe to call repeatedly.
    pub fn close(&self) -> Result<()> {
        let mut backend = self.backend.write().unwrap_or_else(PoisonError::into_inner);
        match backend.take() {
            Some(_) => info!(topology = ?self.topology, "Cache client closed"),
            None => debug!("Cache client already closed"),
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn handle(&self) -> Result<Backend> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StructuredError::internal(CacheError::Closed))
    }

    /// Runs one backend call under the operation timeout. An oversized TTL
    /// is the caller's fault (`bad_request`); every other failure is
    /// `internal`.
    async fn run<T, F, Fut>(&self, op: &'static str, key: &str, call: F) -> Result<T>
    where
        F: FnOnce(Backend) -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let backend = self.handle()?;
        bounded(self.op_timeout, op, call(backend))
            .await
            .map_err(|err| match err {
                CacheError::TtlOutOfRange(_) => StructuredError::bad_request(err),
                err => {
                    warn!(op, key, error = %err, "Cache operation failed");
                    StructuredError::internal(err)
                }
            })
    }

    // == Operations ==
    pub async fn ping(&self) -> Result<()> {
        self.run("PING", "", |b| async move { b.ping().await }).await
    }

    /// Reads raw bytes. An absent key is a `cache_miss`.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.run("GET", key, |b| async move { b.get(key).await }).await? {
            Some(value) => {
                debug!(key, "Cache HIT");
                Ok(value)
            }
            None => {
                debug!(key, "Cache MISS");
                Err(miss(key))
            }
        }
    }

    /// Reads a UTF-8 value.
    pub async fn get_string(&self, key: &str) -> Result<String> {
        let value = self.get(key).await?;
        String::from_utf8(value).map_err(|err| StructuredError::internal(CacheError::Utf8(err)))
    }

    /// Stores `value`. A zero `ttl` means no expiry.
    pub async fn set(&self, key: &str, value: impl AsRef<[u8]>, ttl: Duration) -> Result<()> {
        let value = value.as_ref();
        self.run("SET", key, |b| async move { b.set(key, value, ttl).await })
            .await?;
        debug!(key, ttl_ms = ttl_millis(ttl).unwrap_or(u64::MAX), "Cache SET");
        Ok(())
    }

    /// Stores `value` as JSON, the encoding [`read_struct`](Self::read_struct) expects.
    pub async fn set_struct<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(value)
            .map_err(|err| StructuredError::internal(CacheError::Serialization(err)))?;
        self.set(key, encoded, ttl).await
    }

    /// Reads and decodes a JSON value.
    ///
    /// A missing key is a `cache_miss`; a present but undecodable value is an
    /// `internal` error caused by [`CacheError::Serialization`].
    pub async fn read_struct<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self.get(key).await?;
        serde_json::from_slice(&raw).map_err(|err| {
            warn!(key, error = %err, "Cached value failed to decode");
            StructuredError::internal(CacheError::Serialization(err))
        })
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.run("INCR", key, |b| async move { b.incr(key).await })
            .await
    }

    /// Sets the key's expiry. A zero `ttl` deletes the key. Returns false
    /// when the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.run("PEXPIRE", key, |b| async move { b.expire(key, ttl).await })
            .await
    }

    /// Remaining lifetime of `key`; `None` when it never expires.
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        match self.run("PTTL", key, |b| async move { b.ttl(key).await }).await? {
            KeyTtl::Missing => Err(miss(key)),
            KeyTtl::Persistent => Ok(None),
            KeyTtl::Expires(remaining) => Ok(Some(remaining)),
        }
    }

    /// Deletes `key`. Returns true if it existed.
    pub async fn del(&self, key: &str) -> Result<bool> {
        self.run("DEL", key, |b| async move { b.del(key).await })
            .await
    }

    /// Lists keys matching a glob pattern.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.run("KEYS", pattern, |b| async move { b.keys(pattern).await })
            .await
    }

    /// Sets a hash field. Returns true if the field is new.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.run("HSET", key, |b| async move { b.hset(key, field, value).await })
            .await
    }

    /// Reads a hash field. An absent key or field is a `cache_miss`.
    pub async fn hget(&self, key: &str, field: &str) -> Result<String> {
        self.run("HGET", key, |b| async move { b.hget(key, field).await })
            .await?
            .ok_or_else(|| miss(&format!("{key}.{field}")))
    }

    /// Reads all hash fields. An absent key yields an empty map.
    pub async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.run("HGETALL", key, |b| async move { b.hget_all(key).await })
            .await
    }

    /// Removes a hash field. Returns true if it existed.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        self.run("HDEL", key, |b| async move { b.hdel(key, field).await })
            .await
    }

    /// Sets a hash field and refreshes the whole key's expiry atomically.
    ///
    /// A zero `ttl` removes any expiry from the key.
    pub async fn hset_ex(&self, key: &str, field: &str, value: &str, ttl: Duration) -> Result<()> {
        self.run("HSET+PEXPIRE", key, |b| async move {
            b.hset_ex(key, field, value, ttl).await
        })
        .await
    }

    /// Counts one hit in the fixed window stored at `key`.
    ///
    /// The first hit creates the counter with expiry `window`; creation,
    /// increment and TTL read happen in one atomic unit. Returns the
    /// post-increment count and the time left in the window (`None` if the
    /// key unexpectedly has no expiry).
    pub async fn incr_window(&self, key: &str, window: Duration) -> Result<(i64, Option<Duration>)> {
        if window.is_zero() {
            return Err(StructuredError::bad_request("window must be positive")
                .with_message("Rate limit window must be positive"));
        }
        let (count, ttl) = self
            .run("INCR-WINDOW", key, |b| async move {
                b.incr_window(key, window).await
            })
            .await?;
        Ok((count, ttl.remaining()))
    }
}

fn connection_error(err: CacheError) -> StructuredError {
    warn!(error = %err, "Cache connection failed");
    StructuredError::internal(err)
}
