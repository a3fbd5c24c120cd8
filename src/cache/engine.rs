//! Cache Engine
//!
//! Drives one request through the page cache:
//!
//! ```text
//! INIT -> DECIDING -> SERVING | CAPTURING | PASSTHROUGH -> DONE
//! ```
//!
//! `begin` covers INIT and DECIDING and returns a [`Decision`]. When the
//! decision is [`Decision::Capture`], the caller renders the page and hands
//! the result to `finish`, which stores and registers it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::key::{sanitize_token, PageKey};
use crate::cache::marker::{embed_timestamp, extract_timestamp, inject_label, is_complete_document};
use crate::cache::nonce::NonceIssuer;
use crate::cache::purge::PurgeController;
use crate::cache::registry::Registry;
use crate::cache::stats::EngineStats;
use crate::cache::{PageStore, MAX_VALUE_SIZE};
use crate::error::CacheError;
use crate::rules::{relative_path, resolve_duration, should_cache, Reason};
use crate::settings::{Settings, Snapshot};
use crate::sync::mutex_lock;

/// What the engine needs to know about an incoming request.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Absolute request URL, query included.
    pub full_url: String,
    /// Method other than GET, HEAD or OPTIONS.
    pub mutating: bool,
    /// Raw, unsanitized session cookie value.
    pub session: Option<String>,
    pub prefetch: bool,
    pub nonce: Option<String>,
    /// Ignore any stored copy and render afresh.
    pub refresh: bool,
    /// Caller holds operator privilege.
    pub privileged: bool,
}

/// Why a request bypassed the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassReason {
    Disabled,
    NoSession,
    NotCacheable(Reason),
    /// Mutating request; the session's pages were purged.
    Mutation,
    StoreUnavailable,
}

impl fmt::Display for PassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassReason::Disabled => f.write_str("cache disabled"),
            PassReason::NoSession => f.write_str("no session token"),
            PassReason::NotCacheable(reason) => write!(f, "not cacheable: {reason}"),
            PassReason::Mutation => f.write_str("mutating request"),
            PassReason::StoreUnavailable => f.write_str("store unavailable"),
        }
    }
}

/// Capture state for one rendering, owned by the request.
#[derive(Debug)]
pub struct CaptureTicket {
    key: String,
    relative: String,
    ttl: Duration,
    prefetch: bool,
}

impl CaptureTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[derive(Debug)]
pub enum Decision {
    /// Run the inner handler and send its response untouched.
    Passthrough(PassReason),
    /// Send this stored page.
    Serve(Bytes),
    /// Answer a prefetch probe whose page is already cached.
    Prefetched { remaining_secs: u64 },
    Reject(CacheError),
    /// Run the inner handler, then call `finish`.
    Capture(CaptureTicket),
}

/// Result of finishing a capture.
#[derive(Debug, PartialEq, Eq)]
pub enum Captured {
    /// Stored; send this page.
    Page(Bytes),
    /// Stored for a prefetch probe; send the acknowledgement.
    PrefetchAck { ttl_secs: u64 },
    /// Not stored; send the rendered body as it was.
    Uncached(Bytes),
}

pub struct CacheEngine {
    store: Arc<dyn PageStore>,
    registry: Arc<Registry>,
    purge: PurgeController,
    nonces: NonceIssuer,
    admin_root: String,
    reconcile_every: u64,
    decisions: AtomicU64,
    stats: Mutex<EngineStats>,
}

impl CacheEngine {
    pub fn new(
        store: Arc<dyn PageStore>,
        registry: Arc<Registry>,
        nonces: NonceIssuer,
        admin_root: impl Into<String>,
    ) -> Self {
        Self {
            purge: PurgeController::new(store.clone(), registry.clone()),
            store,
            registry,
            nonces,
            admin_root: admin_root.into(),
            reconcile_every: 0,
            decisions: AtomicU64::new(0),
            stats: Mutex::new(EngineStats::new()),
        }
    }

    /// Reconcile the registry once every `every` cacheable decisions.
    /// Zero turns reconciliation off.
    pub fn with_reconcile_every(mut self, every: u64) -> Self {
        self.reconcile_every = every;
        self
    }

    pub fn purge(&self) -> &PurgeController {
        &self.purge
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn nonces(&self) -> &NonceIssuer {
        &self.nonces
    }

    pub fn admin_root(&self) -> &str {
        &self.admin_root
    }

    pub fn stats(&self) -> EngineStats {
        mutex_lock(&self.stats, "engine.stats").clone()
    }

    /// Decides what to do with `request` under `snapshot`.
    pub async fn begin(&self, snapshot: &Snapshot, request: &PageRequest) -> Decision {
        let settings = &snapshot.settings;

        // INIT
        if !settings.enabled {
            return self.passthrough(PassReason::Disabled);
        }
        let Some(token) = request.session.as_deref().and_then(sanitize_token) else {
            return self.passthrough(PassReason::NoSession);
        };

        // DECIDING
        let relative = relative_path(&request.full_url, &self.admin_root);
        let verdict = should_cache(&relative, &request.full_url, snapshot);
        if !verdict.cache {
            return self.passthrough(PassReason::NotCacheable(verdict.reason));
        }
        self.maybe_reconcile().await;

        if request.mutating && !request.prefetch {
            self.purge.purge_session(&token).await;
            return self.passthrough(PassReason::Mutation);
        }
        if request.prefetch {
            if let Err(err) = self.check_prefetch(settings, &token, request) {
                warn!(relative = %relative, error = %err, "Prefetch rejected");
                self.record(EngineStats::record_rejection);
                return Decision::Reject(err);
            }
        }

        let key = PageKey::derive(&token, &relative).to_string();
        let minutes = resolve_duration(&relative, settings);
        let stored = if request.refresh {
            None
        } else {
            match self.store.get(&key).await {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(key = %key, error = %err, "Store lookup failed");
                    return self.passthrough(PassReason::StoreUnavailable);
                }
            }
        };

        match stored {
            Some(page) if request.prefetch => {
                let remaining_secs = remaining_secs(&page, minutes, chrono::Utc::now().timestamp());
                debug!(relative = %relative, remaining_secs, "Prefetch hit");
                self.record(EngineStats::record_prefetch);
                Decision::Prefetched { remaining_secs }
            }
            Some(page) => {
                debug!(relative = %relative, "Serving cached page");
                self.record(EngineStats::record_hit);
                let page = if settings.show_label {
                    inject_label(&page)
                } else {
                    page
                };
                Decision::Serve(page)
            }
            None => {
                debug!(relative = %relative, key = %key, "Capturing page");
                self.record(EngineStats::record_miss);
                Decision::Capture(CaptureTicket {
                    key,
                    relative,
                    ttl: Duration::from_secs(u64::from(minutes) * 60),
                    prefetch: request.prefetch,
                })
            }
        }
    }

    /// Stores the rendered page for `ticket` if it is a complete, successful
    /// document, and says what to send back.
    pub async fn finish(&self, ticket: CaptureTicket, status: StatusCode, body: Bytes) -> Captured {
        if status != StatusCode::OK || !is_complete_document(&body) {
            debug!(relative = %ticket.relative, status = status.as_u16(), "Output not cacheable");
            self.record(EngineStats::record_passthrough);
            return Captured::Uncached(body);
        }
        if body.len() > MAX_VALUE_SIZE {
            debug!(relative = %ticket.relative, bytes = body.len(), "Output too large to cache");
            self.record(EngineStats::record_passthrough);
            return Captured::Uncached(body);
        }
        let Some(page) = embed_timestamp(&body, chrono::Utc::now().timestamp()) else {
            self.record(EngineStats::record_passthrough);
            return Captured::Uncached(body);
        };

        if let Err(err) = self.store.set(&ticket.key, page.clone(), Some(ticket.ttl)).await {
            warn!(key = %ticket.key, error = %err, "Store write failed, serving live page");
            self.record(EngineStats::record_passthrough);
            return Captured::Uncached(body);
        }
        self.registry.add(&ticket.key).await;
        self.record(EngineStats::record_store);
        info!(relative = %ticket.relative, ttl_secs = ticket.ttl.as_secs(), "Cached page");

        if ticket.prefetch {
            self.record(EngineStats::record_prefetch);
            Captured::PrefetchAck {
                ttl_secs: ticket.ttl.as_secs(),
            }
        } else {
            Captured::Page(page)
        }
    }

    fn check_prefetch(
        &self,
        settings: &Settings,
        token: &str,
        request: &PageRequest,
    ) -> Result<(), CacheError> {
        let nonce = request.nonce.as_deref().unwrap_or_default();
        if !self.nonces.verify(token, nonce) {
            return Err(CacheError::PrefetchRejected("Invalid nonce".to_string()));
        }
        if settings.strict_prefetch && !request.privileged {
            return Err(CacheError::PrefetchRejected(
                "Insufficient privilege for prefetch".to_string(),
            ));
        }
        Ok(())
    }

    async fn maybe_reconcile(&self) {
        if self.reconcile_every == 0 {
            return;
        }
        let n = self.decisions.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.reconcile_every == 0 {
            let dropped = self.registry.reconcile().await;
            if dropped > 0 {
                info!(dropped, "Dropped expired keys from registry");
            }
        }
    }

    fn passthrough(&self, reason: PassReason) -> Decision {
        debug!(reason = %reason, "Passing through");
        self.record(EngineStats::record_passthrough);
        Decision::Passthrough(reason)
    }

    fn record(&self, f: fn(&mut EngineStats)) {
        f(&mut mutex_lock(&self.stats, "engine.record"));
    }
}

/// Seconds left before a page captured per its marker expires, floored at 0.
/// A page without a marker counts as expired.
fn remaining_secs(page: &[u8], minutes: u32, now: i64) -> u64 {
    let Some(captured_at) = extract_timestamp(page) else {
        return 0;
    };
    let remaining = i64::from(minutes) * 60 - (now - captured_at);
    u64::try_from(remaining).unwrap_or(0)
}
