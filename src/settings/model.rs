//! Settings document model.
//!
//! Mirrors the JSON document operators edit. Every field has a default so a
//! partial document still deserializes.

use serde::{Deserialize, Serialize};

/// Default rule polarity outside manual-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Cache only what the allow list (or a regex rule) names.
    #[default]
    Whitelist,
    /// Cache everything except what the deny list (or a regex rule) names.
    Blacklist,
}

/// A per-page duration override: pages whose relative path contains
/// `pattern` are cached for `minutes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDuration {
    pub pattern: String,
    pub minutes: u32,
}

impl PageDuration {
    pub fn new(pattern: impl Into<String>, minutes: u32) -> Self {
        Self {
            pattern: pattern.into(),
            minutes,
        }
    }
}

/// Operator-editable cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Document version tag, bumped on each save.
    pub version: u32,
    /// Master switch.
    pub enabled: bool,
    pub mode: Mode,
    /// Exact relative paths cached in whitelist mode.
    pub allow_list: Vec<String>,
    /// Exact relative paths skipped in blacklist mode.
    pub deny_list: Vec<String>,
    /// Patterns consulted after the exact lists.
    pub regex_rules: Vec<String>,
    pub default_duration_minutes: u32,
    /// First substring match wins, in this order.
    pub per_page_durations: Vec<PageDuration>,
    /// Whitelist mode ignores regex rules when set.
    pub strict_whitelist: bool,
    /// Only `manual_list` governs caching when set.
    pub manual_only: bool,
    pub manual_list: Vec<String>,
    pub exact_manual_match: bool,
    /// Treat `/a/` and `/a` as equal in exact manual matching.
    pub exact_match_ignore_trailing_slash: bool,
    /// Inject a visible marker into pages served from cache.
    pub show_label: bool,
    /// Log rule decisions at info level.
    pub debug_mode: bool,
    /// Prefetch probes also require operator privilege.
    pub strict_prefetch: bool,
    /// Events that purge every session's pages.
    pub full_purge_events: Vec<String>,
    /// Events that purge the acting session's pages.
    pub user_purge_events: Vec<String>,
    /// Admin page slugs known to exist, used to build prefetch lists.
    pub known_pages: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            enabled: false,
            mode: Mode::Whitelist,
            allow_list: Vec::new(),
            deny_list: Vec::new(),
            regex_rules: Vec::new(),
            default_duration_minutes: 5,
            per_page_durations: Vec::new(),
            strict_whitelist: false,
            manual_only: false,
            manual_list: Vec::new(),
            exact_manual_match: false,
            exact_match_ignore_trailing_slash: false,
            show_label: false,
            debug_mode: false,
            strict_prefetch: false,
            full_purge_events: Vec::new(),
            user_purge_events: Vec::new(),
            known_pages: Vec::new(),
        }
    }
}

impl Settings {
    /// Default duration with zero clamped to one minute.
    pub fn default_duration(&self) -> u32 {
        self.default_duration_minutes.max(1)
    }
}
