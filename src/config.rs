//! Configuration Module
//!
//! Handles loading cache connection settings from environment variables.

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Cache connection parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Timeouts are in milliseconds; zero disables the timeout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend addresses as `host:port`; one = single node, several = cluster
    pub addrs: Vec<String>,
    /// Optional password
    pub password: Option<String>,
    /// Database index (single node only)
    pub db: i64,
    /// Connect + liveness probe timeout
    pub dial_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_ADDRS` - Comma-separated addresses (default: localhost:6379)
    /// - `REDIS_PASSWORD` - Password (default: none)
    /// - `REDIS_DB` - Database index (default: 0)
    /// - `REDIS_DIAL_TIMEOUT_MS` - Connect timeout (default: 5000)
    /// - `REDIS_READ_TIMEOUT_MS` - Read timeout (default: 3000)
    /// - `REDIS_WRITE_TIMEOUT_MS` - Write timeout (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addrs: env::var("REDIS_ADDRS")
                .ok()
                .map(|v| parse_addrs(&v))
                .filter(|addrs| !addrs.is_empty())
                .unwrap_or(defaults.addrs),
            password: env::var("REDIS_PASSWORD").ok().filter(|v| !v.is_empty()),
            db: env_parse("REDIS_DB").unwrap_or(defaults.db),
            dial_timeout_ms: env_parse("REDIS_DIAL_TIMEOUT_MS").unwrap_or(defaults.dial_timeout_ms),
            read_timeout_ms: env_parse("REDIS_READ_TIMEOUT_MS").unwrap_or(defaults.read_timeout_ms),
            write_timeout_ms: env_parse("REDIS_WRITE_TIMEOUT_MS")
                .unwrap_or(defaults.write_timeout_ms),
        }
    }

    /// Renders `host:port`.
    pub fn addr(host: &str, port: u16) -> String {
        format!("{}:{}", host, port)
    }

    pub fn dial_timeout(&self) -> Option<Duration> {
        millis(self.dial_timeout_ms)
    }

    /// Budget for one command round trip: read + write timeouts.
    pub fn operation_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms + self.write_timeout_ms)
    }

    /// Single-node URL carrying password and database.
    pub fn connection_url(&self, addr: &str) -> String {
        if has_scheme(addr) {
            return addr.to_string();
        }
        let auth = self
            .password
            .as_deref()
            .map(|password| format!(":{}@", password))
            .unwrap_or_default();
        format!("redis://{}{}/{}", auth, addr, self.db)
    }

    /// Cluster seed URL. Cluster nodes only have database 0 and receive the
    /// password through the cluster builder.
    pub fn node_url(addr: &str) -> String {
        if has_scheme(addr) {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            addrs: vec!["localhost:6379".to_string()],
            password: None,
            db: 0,
            dial_timeout_ms: 5000,
            read_timeout_ms: 3000,
            write_timeout_ms: 3000,
        }
    }
}

fn parse_addrs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
        .collect()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn has_scheme(addr: &str) -> bool {
    addr.starts_with("redis://") || addr.starts_with("rediss://")
}
