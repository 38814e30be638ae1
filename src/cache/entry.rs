//! Cache Entry Module
//!
//! Defines the structure for individual embedded-store entries with TTL support.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

// == Entry Value ==
/// Value held under a key: a plain byte string or a hash of string fields.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValue {
    Bytes(Vec<u8>),
    Hash(HashMap<String, String>),
}

// == Cache Entry ==
/// Represents a single cache entry with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: EntryValue,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry. A zero `ttl` means the entry never expires.
    pub fn new(value: EntryValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: deadline(Instant::now(), ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current instant reaches its deadline, so
    /// a fully elapsed TTL is never observable as a live entry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Instant::now() >= expires,
            None => false,
        }
    }

    // == Expiry ==
    /// Replaces the expiry. A zero `ttl` removes it.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.expires_at = deadline(Instant::now(), ttl);
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}

// A deadline past the clock's range is as good as none.
fn deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        now.checked_add(ttl)
    }
}
