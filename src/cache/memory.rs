//! Embedded Store Module
//!
//! In-process backend implementing the same command set and atomicity as
//! Redis. Each command runs under one write lock, so multi-step commands
//! (`hset_ex`, `incr_window`) are never observed half applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::backend::{ttl_millis, CacheBackend, KeyTtl};
use super::entry::{CacheEntry, EntryValue};
use super::error::{CacheError, CacheResult};

type Entries = HashMap<String, CacheEntry>;

// == Memory Store ==
/// Shared in-memory key-value store with lazy and periodic expiry.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<Entries>>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn write_lock(
        &self,
    ) -> tokio::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().await
    }
}

/// Returns the live entry under `key`, dropping it first if it has expired.
fn live<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a mut CacheEntry> {
    if entries.get(key).is_some_and(CacheEntry::is_expired) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::WrongType(key.to_string())
}

fn increment(entries: &mut Entries, key: &str) -> CacheResult<i64> {
    let entry = match live(entries, key) {
        Some(entry) => entry,
        None => {
            entries.insert(
                key.to_string(),
                CacheEntry::new(EntryValue::Bytes(b"1".to_vec()), Duration::ZERO),
            );
            return Ok(1);
        }
    };
    let EntryValue::Bytes(raw) = &mut entry.value else {
        return Err(wrong_type(key));
    };
    let current: i64 = std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
    let next = current
        .checked_add(1)
        .ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
    *raw = next.to_string().into_bytes();
    Ok(next)
}

fn hash_insert(entries: &mut Entries, key: &str, field: &str, value: &str) -> CacheResult<bool> {
    match live(entries, key) {
        Some(entry) => match &mut entry.value {
            EntryValue::Hash(fields) => Ok(fields
                .insert(field.to_string(), value.to_string())
                .is_none()),
            EntryValue::Bytes(_) => Err(wrong_type(key)),
        },
        None => {
            let fields = HashMap::from([(field.to_string(), value.to_string())]);
            entries.insert(
                key.to_string(),
                CacheEntry::new(EntryValue::Hash(fields), Duration::ZERO),
            );
            Ok(true)
        }
    }
}

fn entry_ttl(entries: &mut Entries, key: &str) -> KeyTtl {
    match live(entries, key) {
        None => KeyTtl::Missing,
        Some(entry) => match entry.ttl_remaining() {
            Some(remaining) => KeyTtl::Expires(remaining),
            None => KeyTtl::Persistent,
        },
    }
}

impl CacheBackend for MemoryStore {
    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                EntryValue::Bytes(value) => Ok(Some(value.clone())),
                EntryValue::Hash(_) => Err(wrong_type(key)),
            },
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        ttl_millis(ttl)?;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry::new(EntryValue::Bytes(value.to_vec()), ttl),
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut entries = self.entries.write().await;
        increment(&mut entries, key)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        ttl_millis(ttl)?;
        let mut entries = self.entries.write().await;
        if live(&mut entries, key).is_none() {
            return Ok(false);
        }
        if ttl.is_zero() {
            entries.remove(key);
        } else if let Some(entry) = entries.get_mut(key) {
            entry.set_ttl(ttl);
        }
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let mut entries = self.entries.write().await;
        Ok(entry_ttl(&mut entries, key))
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.entries.write().await;
        let existed = live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        let mut entries = self.entries.write().await;
        hash_insert(&mut entries, key, field, value)
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                EntryValue::Hash(fields) => Ok(fields.get(field).cloned()),
                EntryValue::Bytes(_) => Err(wrong_type(key)),
            },
        }
    }

    async fn hget_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut entries = self.entries.write().await;
        match live(&mut entries, key) {
            None => Ok(HashMap::new()),
            Some(entry) => match &entry.value {
                EntryValue::Hash(fields) => Ok(fields.clone()),
                EntryValue::Bytes(_) => Err(wrong_type(key)),
            },
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> CacheResult<bool> {
        let mut entries = self.entries.write().await;
        let (removed, now_empty) = match live(&mut entries, key) {
            None => return Ok(false),
            Some(entry) => match &mut entry.value {
                EntryValue::Hash(fields) => (fields.remove(field).is_some(), fields.is_empty()),
                EntryValue::Bytes(_) => return Err(wrong_type(key)),
            },
        };
        // Redis drops a hash once its last field is gone
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn hset_ex(&self, key: &str, field: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        ttl_millis(ttl)?;
        let mut entries = self.entries.write().await;
        hash_insert(&mut entries, key, field, value)?;
        if let Some(entry) = entries.get_mut(key) {
            entry.set_ttl(ttl);
        }
        Ok(())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<(i64, KeyTtl)> {
        ttl_millis(window)?;
        let mut entries = self.entries.write().await;
        if live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                CacheEntry::new(EntryValue::Bytes(b"0".to_vec()), window),
            );
        }
        let count = increment(&mut entries, key)?;
        Ok((count, entry_ttl(&mut entries, key)))
    }
}

// == Glob Matching ==
/// Matches `text` against a pattern where `*` is any run and `?` any one char.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
