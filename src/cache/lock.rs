//! Registry mutation locks.
//!
//! Registry writes are read-modify-write cycles against shared state, so
//! concurrent writers serialize through a short-lived lock. Acquisition is
//! bounded: after the retry budget the writer proceeds unlocked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::cache::PageStore;

/// Store key of the portable registry lock.
pub const LOCK_KEY: &str = "admin-cache:registry-lock";

/// How long a store lock survives a holder that never releases it.
pub const LOCK_TTL: Duration = Duration::from_secs(5);

/// A try-lock guarding registry mutations.
#[async_trait]
pub trait RegistryLock: Send + Sync {
    /// Takes the lock if free. Never waits.
    async fn try_acquire(&self) -> bool;

    async fn release(&self);

    /// Frees the lock without awaiting, when the implementation can.
    /// Returns false when only the async `release` will do.
    fn release_now(&self) -> bool {
        false
    }
}

/// Lock held as a TTL key in the page store itself. Works with any store
/// that provides an atomic add; an abandoned lock expires on its own.
pub struct StoreLock {
    store: Arc<dyn PageStore>,
}

impl StoreLock {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RegistryLock for StoreLock {
    async fn try_acquire(&self) -> bool {
        match self
            .store
            .add(LOCK_KEY, Bytes::from_static(b"1"), Some(LOCK_TTL))
            .await
        {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!(error = %err, "Registry lock write failed");
                false
            }
        }
    }

    async fn release(&self) {
        if let Err(err) = self.store.delete(LOCK_KEY).await {
            warn!(error = %err, "Registry lock release failed");
        }
    }
}

/// In-process compare-and-swap lock, for deployments where every writer
/// shares one process.
#[derive(Debug, Default)]
pub struct LocalLock {
    held: AtomicBool,
}

impl LocalLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryLock for LocalLock {
    async fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    fn release_now(&self) -> bool {
        self.held.store(false, Ordering::Release);
        true
    }
}

/// Retry budget for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Tries the lock up to `policy.attempts` times, sleeping `policy.backoff`
/// between attempts. Returns whether the lock is now held.
pub async fn acquire_with_retry(lock: &dyn RegistryLock, policy: RetryPolicy) -> bool {
    for attempt in 0..policy.attempts.max(1) {
        if lock.try_acquire().await {
            return true;
        }
        if attempt + 1 < policy.attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }
    false
}

/// A held registry lock. Dropping it without calling `release` still frees
/// the lock, in the background when the lock needs async IO.
pub struct LockGuard {
    lock: Option<Arc<dyn RegistryLock>>,
}

impl LockGuard {
    pub async fn release(mut self) {
        if let Some(lock) = &self.lock {
            lock.release().await;
        }
        self.lock = None;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        if lock.release_now() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { lock.release().await });
            }
            Err(_) => warn!("Registry lock dropped outside a runtime, left to expire"),
        }
    }
}

/// `acquire_with_retry`, returning a guard that owns the lock on success.
pub async fn lock_with_retry(lock: &Arc<dyn RegistryLock>, policy: RetryPolicy) -> Option<LockGuard> {
    acquire_with_retry(lock.as_ref(), policy)
        .await
        .then(|| LockGuard {
            lock: Some(lock.clone()),
        })
}
