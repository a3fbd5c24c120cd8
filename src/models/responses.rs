//! Response DTOs for the operator API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{EngineStats, PurgeReport};
use crate::rules::{Rejection, SkippedPattern, MAX_PATTERN_LEN};
use crate::settings::{Settings, Snapshot};

/// Response body for POST /admin-cache/purge
pub type PurgeResponse = PurgeReport;

/// Response body for POST /admin-cache/events/:name
#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    pub event: String,
    /// The purge the event triggered, if it is bound to one
    pub purge: Option<PurgeReport>,
}

/// A regex rule left out of the active rule set.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPatternView {
    pub pattern: String,
    pub reason: String,
}

impl From<&SkippedPattern> for SkippedPatternView {
    fn from(skipped: &SkippedPattern) -> Self {
        let reason = match &skipped.reason {
            Rejection::TooLong(len) => {
                format!("pattern is {len} bytes, limit is {MAX_PATTERN_LEN}")
            }
            Rejection::Invalid(err) => err.clone(),
        };
        Self {
            pattern: skipped.pattern.clone(),
            reason,
        }
    }
}

/// Response body for GET and PUT /admin-cache/settings
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub settings: Settings,
    /// Manual lines dropped because they are not URLs or absolute paths
    pub invalid_manual_lines: Vec<String>,
    pub skipped_patterns: Vec<SkippedPatternView>,
}

impl From<&Snapshot> for SettingsResponse {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            settings: snapshot.settings.clone(),
            invalid_manual_lines: snapshot.invalid_manual_lines.clone(),
            skipped_patterns: snapshot.rules.skipped().iter().map(Into::into).collect(),
        }
    }
}

/// Response body for GET /admin-cache/prefetch
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchResponse {
    /// Value for the `x-admin-cache-nonce` header of each probe
    pub nonce: String,
    pub urls: Vec<String>,
}

/// Response body for the stats endpoint (GET /admin-cache/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub engine: EngineStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Keys currently in the registry
    pub registered_keys: usize,
    /// Current number of entries in the store
    pub total_entries: usize,
}

impl StatsResponse {
    pub fn new(engine: EngineStats, registered_keys: usize, total_entries: usize) -> Self {
        Self {
            hit_rate: engine.hit_rate(),
            engine,
            registered_keys,
            total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
