//! Cache Module
//!
//! Per-session page cache: the TTL store it sits on, key derivation, the
//! key registry and its lock, the request engine, and purges.

mod engine;
mod entry;
mod key;
mod lock;
mod marker;
mod nonce;
mod purge;
mod registry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{CacheEngine, CaptureTicket, Captured, Decision, PageRequest, PassReason};
pub use entry::StoredEntry;
pub use key::{sanitize_token, sha256_hex, PageKey, KEY_NAMESPACE, MAX_TOKEN_LEN};
pub use lock::{
    acquire_with_retry, lock_with_retry, LocalLock, LockGuard, RegistryLock, RetryPolicy, StoreLock,
    LOCK_KEY, LOCK_TTL,
};
pub use marker::{embed_timestamp, extract_timestamp, inject_label, is_complete_document};
pub use nonce::NonceIssuer;
pub use purge::{PurgeController, PurgeReport, PurgeScope};
pub use registry::{Registry, REGISTRY_KEY};
pub use stats::EngineStats;
pub use store::{PageStore, TtlStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum stored page size in bytes
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024;
