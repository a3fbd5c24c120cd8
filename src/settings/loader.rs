//! Settings document loading and persistence.

use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};
use url::Url;

use super::model::Settings;

/// Parses a settings document, substituting defaults when the document is
/// not a JSON object of the expected shape.
pub fn parse_settings(raw: &str) -> Settings {
    if raw.trim().is_empty() {
        return Settings::default();
    }
    match serde_json::from_str::<Settings>(raw) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(error = %err, "Malformed settings document, using defaults");
            Settings::default()
        }
    }
}

/// Loads the settings document at `path`.
///
/// A missing file yields defaults; an unreadable one is an error.
pub async fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(parse_settings(&raw)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No settings document, using defaults");
            Ok(Settings::default())
        }
        Err(err) => {
            Err(err).with_context(|| format!("reading settings from {}", path.display()))
        }
    }
}

/// Writes the settings document to `path` as pretty JSON.
pub async fn save_settings(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(settings).context("serializing settings")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing settings to {}", path.display()))
}

/// Checks a manual list line.
///
/// Absolute URLs must parse with a host; relative paths must start with a
/// single `/` and carry at least one more character.
pub fn is_valid_manual_line(line: &str) -> bool {
    let line = line.trim();
    if let Ok(url) = Url::parse(line) {
        return url.has_host();
    }
    if !line.starts_with('/') || line.starts_with("//") {
        return false;
    }
    line.len() >= 2
}

/// Drops invalid manual lines from `settings`, returning them.
pub fn prune_manual_lines(settings: &mut Settings) -> Vec<String> {
    let (valid, invalid): (Vec<String>, Vec<String>) = settings
        .manual_list
        .drain(..)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .partition(|line| is_valid_manual_line(line));
    settings.manual_list = valid;
    if !invalid.is_empty() {
        warn!(lines = ?invalid, "Ignoring invalid manual cache lines");
    }
    invalid
}
