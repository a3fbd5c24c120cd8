//! Store Module
//!
//! The key-value TTL store the page cache is built on, and an in-memory
//! implementation of it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::cache::entry::{current_timestamp_ms, StoredEntry};
use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

// == Page Store ==
/// Per-key get/set/delete with independent TTLs.
///
/// Operations are atomic per key; nothing is transactional across keys.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// The live value under `key`, or None when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Stores `value`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Stores `value` only when `key` holds no live value. Returns whether
    /// the value was stored.
    async fn add(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<bool>;

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

// == TTL Store ==
/// In-memory TTL storage with a hard entry cap.
#[derive(Debug)]
pub struct TtlStore {
    /// Key-value storage
    entries: HashMap<String, StoredEntry>,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl TtlStore {
    // == Constructor ==
    /// Creates a new store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    // == Set ==
    /// Stores a value with optional TTL.
    ///
    /// If the key already exists, the value is overwritten and TTL is reset.
    /// When the store is full, expired entries are swept first; if it is
    /// still full the write is refused.
    pub fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key must be 1 to {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let is_overwrite = self.entries.contains_key(key);
        if !is_overwrite && self.entries.len() >= self.max_entries {
            self.cleanup_expired();
            if self.entries.len() >= self.max_entries {
                return Err(CacheError::Store(format!(
                    "Store is full ({} entries)",
                    self.max_entries
                )));
            }
        }

        self.entries
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    // == Get ==
    /// The live entry under `key`. Expired entries read as absent.
    pub fn peek(&self, key: &str) -> Option<&StoredEntry> {
        self.entries.get(key).filter(|entry| !entry.is_expired())
    }

    // == Add ==
    /// Stores the value only if the key holds no live value.
    pub fn add(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<bool> {
        if self.peek(key).is_some() {
            return Ok(false);
        }
        self.set(key, value, ttl)?;
        Ok(true)
    }

    // == Delete ==
    /// Removes an entry by key, returning whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PageStore for RwLock<TtlStore> {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.read().await.peek(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        self.write().await.set(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.write().await.delete(key);
        Ok(())
    }

    async fn add(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<bool> {
        self.write().await.add(key, value, ttl)
    }
}
