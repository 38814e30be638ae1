//! Redis Backend
//!
//! One implementation of the command set for both topologies: the
//! single-node `ConnectionManager` and the cluster `ClusterConnection` are
//! multiplexed, cheaply cloneable handles that speak the same protocol.
//! Cluster routing is done by the driver.

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use tracing::debug;

use super::backend::{ttl_millis, CacheBackend, KeyTtl};
use super::error::CacheResult;

/// Redis-backed implementation over a multiplexed connection handle.
#[derive(Clone)]
pub(crate) struct RedisBackend<C> {
    conn: C,
}

impl<C> std::fmt::Debug for RedisBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("conn", &std::any::type_name::<C>())
            .finish()
    }
}

impl RedisBackend<ConnectionManager> {
    /// Connects to a single node. `url` is a `redis://` URL.
    pub(crate) async fn connect_single(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("Redis single-node connection established");
        Ok(Self { conn })
    }
}

impl RedisBackend<ClusterConnection> {
    /// Connects to a cluster through its seed nodes.
    pub(crate) async fn connect_cluster(
        nodes: Vec<String>,
        password: Option<String>,
    ) -> CacheResult<Self> {
        let mut builder = ClusterClientBuilder::new(nodes);
        if let Some(password) = password {
            builder = builder.password(password);
        }
        let client = builder.build()?;
        let conn = client.get_async_connection().await?;
        debug!("Redis cluster connection established");
        Ok(Self { conn })
    }
}

// Redis rejects a zero PX/PEXPIRE, so sub-millisecond durations round up.
fn px(ttl: Duration) -> CacheResult<u64> {
    Ok(ttl_millis(ttl)?.max(1))
}

impl<C> CacheBackend for RedisBackend<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if !ttl.is_zero() {
            cmd.arg("PX").arg(px(ttl)?);
        }
        let mut conn = self.conn.clone();
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let ms = ttl_millis(ttl)?;
        let mut conn = self.conn.clone();
        let applied: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ms)
            .query_async(&mut conn)
            .await?;
        Ok(applied)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let mut conn = self.conn.clone();
        let pttl: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(KeyTtl::from_pttl(pttl))
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(added > 0)
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn hget_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields)
    }

    async fn hdel(&self, key: &str, field: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn hset_ex(&self, key: &str, field: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let expiry = if ttl.is_zero() { None } else { Some(px(ttl)?) };
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .ignore();
        match expiry {
            Some(ms) => pipe.cmd("PEXPIRE").arg(key).arg(ms).ignore(),
            None => pipe.cmd("PERSIST").arg(key).ignore(),
        };
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<(i64, KeyTtl)> {
        let window_ms = px(window)?;
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        // SET NX only succeeds for the first hit of a window, so the expiry
        // is applied exactly once and INCR keeps it.
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("PX")
            .arg(window_ms)
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key)
            .cmd("PTTL")
            .arg(key);
        let (count, pttl): (i64, i64) = pipe.query_async(&mut conn).await?;
        Ok((count, KeyTtl::from_pttl(pttl)))
    }
}
