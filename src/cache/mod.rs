//! Cache Module
//!
//! Topology-transparent cache client over a single Redis node, a Redis
//! cluster, or an in-process store with the same command semantics.

mod backend;
mod client;
mod entry;
mod error;
mod memory;
mod redis;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{CacheBackend, KeyTtl, MAX_TTL};
pub use client::{CacheClient, Topology};
pub use error::{CacheError, CacheResult};
pub use memory::MemoryStore;
