//! Configuration Module
//!
//! Handles loading the process-level server configuration from environment
//! variables. Cache rules live in the settings document (see `settings`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Absolute URL of the admin root every cached page lives under
    pub admin_root_url: String,
    /// Location of the JSON settings document
    pub settings_path: PathBuf,
    /// Maximum number of entries the in-memory store can hold
    pub max_entries: usize,
    /// Background sweep interval for expired store entries, in seconds
    pub cleanup_interval: u64,
    /// Registry lock acquisition attempts before writing unsynchronized
    pub lock_retries: u32,
    /// Pause between registry lock attempts, in milliseconds
    pub lock_backoff_ms: u64,
    /// Run a registry reconcile once every this many engine decisions (0 disables)
    pub reconcile_every: u64,
    /// Secret mixed into prefetch nonces
    pub nonce_secret: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ADMIN_ROOT_URL` - Admin root (default: http://localhost:3000/wp-admin/)
    /// - `SETTINGS_PATH` - Settings document (default: admin-cache.json)
    /// - `MAX_ENTRIES` - Maximum store entries (default: 10000)
    /// - `CLEANUP_INTERVAL` - Store sweep frequency in seconds (default: 30)
    /// - `LOCK_RETRIES` - Registry lock attempts (default: 10)
    /// - `LOCK_BACKOFF_MS` - Pause between lock attempts (default: 200)
    /// - `RECONCILE_EVERY` - Decisions between registry reconciles (default: 50)
    /// - `NONCE_SECRET` - Prefetch nonce secret (default: random per process)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            admin_root_url: env::var("ADMIN_ROOT_URL").unwrap_or(defaults.admin_root_url),
            settings_path: env::var("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            lock_retries: parse_var("LOCK_RETRIES").unwrap_or(defaults.lock_retries),
            lock_backoff_ms: parse_var("LOCK_BACKOFF_MS").unwrap_or(defaults.lock_backoff_ms),
            reconcile_every: parse_var("RECONCILE_EVERY").unwrap_or(defaults.reconcile_every),
            nonce_secret: env::var("NONCE_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(process_secret),
        }
    }

    /// Pause between registry lock attempts.
    pub fn lock_backoff(&self) -> Duration {
        Duration::from_millis(self.lock_backoff_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            admin_root_url: "http://localhost:3000/wp-admin/".to_string(),
            settings_path: PathBuf::from("admin-cache.json"),
            max_entries: 10_000,
            cleanup_interval: 30,
            lock_retries: 10,
            lock_backoff_ms: 200,
            reconcile_every: 50,
            nonce_secret: "admin-page-cache".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Per-process secret used when none is configured; nonces then only
/// survive until restart.
fn process_secret() -> String {
    let seed = format!(
        "{}:{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    crate::cache::sha256_hex(seed.as_bytes())
}
