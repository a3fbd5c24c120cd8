//! Settings Module
//!
//! The operator-edited settings document and the immutable per-request
//! snapshot built from it.
//!
//! A request takes one `Arc<Snapshot>` at its start and uses it throughout,
//! so an operator saving new settings mid-request never changes the rules a
//! request is already evaluating.

mod loader;
mod model;

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::info;

use crate::error::{CacheError, Result};
use crate::rules::RuleSet;
use crate::sync::{rw_read, rw_write};

pub use loader::{is_valid_manual_line, load_settings, parse_settings, prune_manual_lines, save_settings};
pub use model::{Mode, PageDuration, Settings};

/// Settings plus the rules compiled from them.
#[derive(Debug)]
pub struct Snapshot {
    pub settings: Settings,
    pub rules: RuleSet,
    /// Manual lines dropped during validation.
    pub invalid_manual_lines: Vec<String>,
}

impl Snapshot {
    /// Validates and compiles `settings`.
    pub fn build(mut settings: Settings) -> Self {
        let invalid_manual_lines = prune_manual_lines(&mut settings);
        let rules = RuleSet::compile(&settings.regex_rules);
        Self {
            settings,
            rules,
            invalid_manual_lines,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::build(Settings::default())
    }
}

/// Shared handle to the current snapshot, optionally backed by a file.
#[derive(Debug)]
pub struct SettingsHandle {
    path: Option<PathBuf>,
    current: RwLock<Arc<Snapshot>>,
    /// Serializes replacements so version, file and snapshot stay in step.
    writer: Mutex<()>,
}

impl SettingsHandle {
    /// In-memory handle, used by tests and embedders that persist elsewhere.
    pub fn new(settings: Settings) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(Snapshot::build(settings))),
            writer: Mutex::new(()),
        }
    }

    /// Loads the document at `path` and keeps writing replacements back to it.
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        let settings = load_settings(&path).await?;
        info!(path = %path.display(), version = settings.version, "Settings loaded");
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(Snapshot::build(settings))),
            writer: Mutex::new(()),
        })
    }

    /// The snapshot a new request should use.
    pub fn current(&self) -> Arc<Snapshot> {
        rw_read(&self.current, "settings.current").clone()
    }

    /// Replaces the settings, bumping the version and persisting when backed
    /// by a file.
    pub async fn replace(&self, mut settings: Settings) -> Result<Arc<Snapshot>> {
        let _writer = self.writer.lock().await;
        settings.version = self.current().settings.version.saturating_add(1);
        if let Some(path) = &self.path {
            save_settings(path, &settings)
                .await
                .map_err(|err| CacheError::Settings(format!("{err:#}")))?;
        }
        let snapshot = Arc::new(Snapshot::build(settings));
        *rw_write(&self.current, "settings.replace") = snapshot.clone();
        info!(version = snapshot.settings.version, "Settings replaced");
        Ok(snapshot)
    }
}
