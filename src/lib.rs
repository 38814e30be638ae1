//! Cache Commons - shared error taxonomy, cache client and rate limiter
//!
//! Provides structured errors with HTTP status mapping, a Redis-backed cache
//! client that hides single-node vs cluster topology, and a fixed-window
//! rate limiter built on that client.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod ratelimit;
pub mod tasks;

pub use cache::{CacheClient, MemoryStore, Topology};
pub use config::CacheConfig;
pub use error::{StructuredError, ValidationError};
pub use ratelimit::{CacheRateLimiter, RateLimitDecision, RateLimiter};
pub use tasks::spawn_cleanup_task;
