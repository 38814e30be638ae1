//! Cache Backend
//!
//! The command set every topology implements, and the enum that selects one
//! topology at construction. Backends report an absent key as `None`; turning
//! that into a `cache_miss` error is the client's job.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::cluster_async::ClusterConnection;

use super::error::{CacheError, CacheResult};
use super::memory::MemoryStore;
use super::redis::RedisBackend;

/// Remaining lifetime of a key as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist
    Missing,
    /// Key exists without an expiry
    Persistent,
    /// Key expires after the given duration
    Expires(Duration),
}

impl KeyTtl {
    /// Decodes a Redis `PTTL` reply.
    pub fn from_pttl(millis: i64) -> Self {
        match millis {
            -2 => KeyTtl::Missing,
            m if m < 0 => KeyTtl::Persistent,
            m => KeyTtl::Expires(Duration::from_millis(m.unsigned_abs())),
        }
    }

    pub fn remaining(self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(remaining) => Some(remaining),
            KeyTtl::Missing | KeyTtl::Persistent => None,
        }
    }
}

/// Longest accepted expiry. Redis stores expiries as signed milliseconds.
pub const MAX_TTL: Duration = Duration::from_millis(i64::MAX as u64);

/// Converts a TTL to whole milliseconds, rejecting values above [`MAX_TTL`].
pub(crate) fn ttl_millis(ttl: Duration) -> CacheResult<u64> {
    u64::try_from(ttl.as_millis())
        .ok()
        .filter(|ms| *ms <= i64::MAX as u64)
        .ok_or(CacheError::TtlOutOfRange(ttl))
}

/// Command set shared by the single-node, cluster and embedded backends.
///
/// A zero `ttl` on `set` and `hset_ex` means "no expiry". `expire` keeps the
/// backend semantics: a zero TTL deletes the key. TTLs above [`MAX_TTL`] are
/// rejected with [`CacheError::TtlOutOfRange`].
pub trait CacheBackend: Send + Sync {
    fn ping(&self) -> impl Future<Output = CacheResult<()>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<Vec<u8>>>> + Send;

    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    fn incr(&self, key: &str) -> impl Future<Output = CacheResult<i64>> + Send;

    /// Returns false when the key does not exist.
    fn expire(&self, key: &str, ttl: Duration) -> impl Future<Output = CacheResult<bool>> + Send;

    fn ttl(&self, key: &str) -> impl Future<Output = CacheResult<KeyTtl>> + Send;

    /// Returns true when a key was removed.
    fn del(&self, key: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    fn keys(&self, pattern: &str) -> impl Future<Output = CacheResult<Vec<String>>> + Send;

    /// Returns true when the field is new.
    fn hset(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = CacheResult<bool>> + Send;

    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = CacheResult<Option<String>>> + Send;

    fn hget_all(
        &self,
        key: &str,
    ) -> impl Future<Output = CacheResult<HashMap<String, String>>> + Send;

    /// Returns true when the field was removed.
    fn hdel(&self, key: &str, field: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Sets one hash field and the key's expiry as a single atomic unit.
    fn hset_ex(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Atomically creates the counter with expiry `window` if absent,
    /// increments it and reads its remaining TTL.
    fn incr_window(
        &self,
        key: &str,
        window: Duration,
    ) -> impl Future<Output = CacheResult<(i64, KeyTtl)>> + Send;
}

// == Backend ==
/// The active topology. Selected once at construction and never changed.
#[derive(Clone)]
pub(crate) enum Backend {
    Single(RedisBackend<ConnectionManager>),
    Cluster(RedisBackend<ClusterConnection>),
    Embedded(MemoryStore),
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            Backend::Single($backend) => $call,
            Backend::Cluster($backend) => $call,
            Backend::Embedded($backend) => $call,
        }
    };
}

impl CacheBackend for Backend {
    async fn ping(&self) -> CacheResult<()> {
        dispatch!(self, b => b.ping().await)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        dispatch!(self, b => b.get(key).await)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        dispatch!(self, b => b.set(key, value, ttl).await)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        dispatch!(self, b => b.incr(key).await)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        dispatch!(self, b => b.expire(key, ttl).await)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        dispatch!(self, b => b.ttl(key).await)
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        dispatch!(self, b => b.del(key).await)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        dispatch!(self, b => b.keys(pattern).await)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        dispatch!(self, b => b.hset(key, field, value).await)
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        dispatch!(self, b => b.hget(key, field).await)
    }

    async fn hget_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        dispatch!(self, b => b.hget_all(key).await)
    }

    async fn hdel(&self, key: &str, field: &str) -> CacheResult<bool> {
        dispatch!(self, b => b.hdel(key, field).await)
    }

    async fn hset_ex(&self, key: &str, field: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        dispatch!(self, b => b.hset_ex(key, field, value, ttl).await)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<(i64, KeyTtl)> {
        dispatch!(self, b => b.incr_window(key, window).await)
    }
}
