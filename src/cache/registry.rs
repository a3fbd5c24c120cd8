//! Registry of issued page keys.
//!
//! Purges need to find every cached page without scanning the store, so each
//! page key is recorded here when its entry is written. The list is persisted
//! in the store under a reserved key with no expiry, and mirrored in memory
//! for reads.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::lock::{lock_with_retry, RegistryLock, RetryPolicy};
use crate::cache::PageStore;
use crate::sync::{rw_read, rw_write};

/// Store key holding the persisted registry.
pub const REGISTRY_KEY: &str = "admin-cache:registry";

pub struct Registry {
    store: Arc<dyn PageStore>,
    lock: Arc<dyn RegistryLock>,
    retry: RetryPolicy,
    /// In-memory copy; None until first loaded.
    cached: RwLock<Option<Vec<String>>>,
}

impl Registry {
    pub fn new(store: Arc<dyn PageStore>, lock: Arc<dyn RegistryLock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            lock,
            retry,
            cached: RwLock::new(None),
        }
    }

    /// Registered keys in insertion order.
    ///
    /// Served from memory after the first load. Writers in other processes
    /// are only seen after this process mutates the registry itself.
    pub async fn list(&self) -> Vec<String> {
        let cached = rw_read(&self.cached, "registry.list").clone();
        if let Some(keys) = cached {
            return keys;
        }
        let keys = self.load().await;
        *rw_write(&self.cached, "registry.list") = Some(keys.clone());
        keys
    }

    /// Records `key`. Adding a present key changes nothing.
    pub async fn add(&self, key: &str) {
        self.mutate("registry.add", |keys| {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        })
        .await
    }

    /// Removes and returns every key satisfying `predicate`.
    pub async fn remove_all<P>(&self, predicate: P) -> Vec<String>
    where
        P: Fn(&str) -> bool + Send + Sync,
    {
        self.mutate("registry.remove_all", |keys| {
            let (removed, kept): (Vec<String>, Vec<String>) =
                keys.drain(..).partition(|k| predicate(k));
            *keys = kept;
            removed
        })
        .await
    }

    /// Empties the registry, returning what it held.
    pub async fn clear(&self) -> Vec<String> {
        self.mutate("registry.clear", std::mem::take).await
    }

    /// Drops keys whose entries are gone from the store. Returns how many
    /// were dropped.
    pub async fn reconcile(&self) -> usize {
        let mut dead = HashSet::new();
        for key in self.load().await {
            match self.store.contains(&key).await {
                Ok(false) => {
                    dead.insert(key);
                }
                Ok(true) => {}
                Err(err) => warn!(key = %key, error = %err, "Registry reconcile lookup failed"),
            }
        }
        if dead.is_empty() {
            return 0;
        }
        let removed = self.remove_all(|key| dead.contains(key)).await;
        debug!(removed = removed.len(), "Registry reconciled");
        removed.len()
    }

    /// Runs `f` on the persisted list under the registry lock and writes the
    /// result back. The guard frees the lock on every path, including when
    /// this future is dropped midway.
    async fn mutate<F, R>(&self, op: &'static str, f: F) -> R
    where
        F: FnOnce(&mut Vec<String>) -> R,
    {
        let guard = lock_with_retry(&self.lock, self.retry).await;
        if guard.is_none() {
            warn!(op, "Registry lock not acquired, writing unsynchronized");
        }

        let mut keys = self.load().await;
        let before = keys.len();
        let out = f(&mut keys);
        if keys.len() != before {
            self.persist(&keys).await;
        }
        *rw_write(&self.cached, op) = Some(keys);

        if let Some(guard) = guard {
            guard.release().await;
        }
        out
    }

    async fn load(&self) -> Vec<String> {
        match self.store.get(REGISTRY_KEY).await {
            Ok(Some(raw)) => serde_json::from_slice(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "Malformed registry, starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "Registry read failed");
                Vec::new()
            }
        }
    }

    async fn persist(&self, keys: &[String]) {
        let raw = match serde_json::to_vec(keys) {
            Ok(raw) => Bytes::from(raw),
            Err(err) => {
                warn!(error = %err, "Registry serialization failed");
                return;
            }
        };
        if let Err(err) = self.store.set(REGISTRY_KEY, raw, None).await {
            warn!(error = %err, "Registry write failed");
        }
    }
}
