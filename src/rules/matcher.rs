//! Cacheability decisions.

use std::fmt;

use tracing::{debug, info};

use super::normalize::{normalize, path_and_query};
use crate::settings::{Mode, Settings, Snapshot};

/// Admin screens that mutate content. Never cached, whatever the rules say.
pub const ALWAYS_SKIP: &[&str] = &[
    "post.php",
    "post-new.php",
    "media-new.php",
    "plugin-install.php",
    "theme-install.php",
    "customize.php",
    "user-edit.php",
    "profile.php",
];

/// Which rule settled the decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    ManualExact(String),
    ManualPartial(String),
    ManualNoMatch,
    AlwaysSkip(&'static str),
    DenyListed,
    RegexExcluded(String),
    BlacklistDefault,
    AllowListed,
    StrictWhitelist,
    RegexIncluded(String),
    NotListed,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::ManualExact(line) => write!(f, "exact manual match: {line}"),
            Reason::ManualPartial(line) => write!(f, "partial manual match: {line}"),
            Reason::ManualNoMatch => f.write_str("manual-only mode, no manual line matched"),
            Reason::AlwaysSkip(page) => write!(f, "always skipped: {page}"),
            Reason::DenyListed => f.write_str("in deny list"),
            Reason::RegexExcluded(pattern) => write!(f, "excluded by regex: {pattern}"),
            Reason::BlacklistDefault => f.write_str("blacklist mode default"),
            Reason::AllowListed => f.write_str("in allow list"),
            Reason::StrictWhitelist => f.write_str("strict whitelist, not in allow list"),
            Reason::RegexIncluded(pattern) => write!(f, "included by regex: {pattern}"),
            Reason::NotListed => f.write_str("not in allow list nor matched by regex"),
        }
    }
}

/// Outcome of `should_cache`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub cache: bool,
    pub reason: Reason,
}

impl Verdict {
    fn cache(reason: Reason) -> Self {
        Self { cache: true, reason }
    }

    fn skip(reason: Reason) -> Self {
        Self {
            cache: false,
            reason,
        }
    }
}

/// Decides whether the page at `relative` (full URL `full_url`) is cacheable.
pub fn should_cache(relative: &str, full_url: &str, snapshot: &Snapshot) -> Verdict {
    let settings = &snapshot.settings;
    let verdict = evaluate(relative, full_url, snapshot);
    if settings.debug_mode {
        info!(relative, cache = verdict.cache, reason = %verdict.reason, "Cache rule decision");
    } else {
        debug!(relative, cache = verdict.cache, reason = %verdict.reason, "Cache rule decision");
    }
    verdict
}

fn evaluate(relative: &str, full_url: &str, snapshot: &Snapshot) -> Verdict {
    let settings = &snapshot.settings;

    if settings.manual_only {
        return manual_verdict(relative, full_url, settings);
    }

    let path = without_query(relative);
    if let Some(page) = ALWAYS_SKIP.iter().copied().find(|page| path.contains(page)) {
        return Verdict::skip(Reason::AlwaysSkip(page));
    }

    let rules = &snapshot.rules;
    match settings.mode {
        Mode::Blacklist => {
            if listed(&settings.deny_list, relative) {
                return Verdict::skip(Reason::DenyListed);
            }
            if let Some(pattern) = rules.first_match(path) {
                return Verdict::skip(Reason::RegexExcluded(pattern.to_string()));
            }
            Verdict::cache(Reason::BlacklistDefault)
        }
        Mode::Whitelist => {
            if listed(&settings.allow_list, relative) {
                return Verdict::cache(Reason::AllowListed);
            }
            if settings.strict_whitelist {
                return Verdict::skip(Reason::StrictWhitelist);
            }
            if let Some(pattern) = rules.first_match(path) {
                return Verdict::cache(Reason::RegexIncluded(pattern.to_string()));
            }
            Verdict::skip(Reason::NotListed)
        }
    }
}

/// `relative` with any `?query` removed.
pub fn without_query(relative: &str) -> &str {
    relative.split_once('?').map_or(relative, |(path, _)| path)
}

/// A list entry names either the bare screen (`users.php`), matching it with
/// any query, or one exact variant (`edit.php?post_type=page`).
pub(crate) fn listed(list: &[String], relative: &str) -> bool {
    let path = without_query(relative);
    list.iter().any(|entry| entry == path || entry == relative)
}

fn manual_verdict(relative: &str, full_url: &str, settings: &Settings) -> Verdict {
    let full = normalize(full_url);
    for line in &settings.manual_list {
        let wanted = normalize(line);
        if wanted.is_empty() {
            continue;
        }
        let matched = if settings.exact_manual_match {
            exact_manual_match(full_url, wanted, settings.exact_match_ignore_trailing_slash)
        } else {
            contains_ci(full, wanted) || contains_ci(normalize(relative), wanted)
        };
        if matched {
            return Verdict::cache(if settings.exact_manual_match {
                Reason::ManualExact(line.clone())
            } else {
                Reason::ManualPartial(line.clone())
            });
        }
    }
    Verdict::skip(Reason::ManualNoMatch)
}

/// Path-style lines compare against the request path and query, URL lines
/// against the scheme-less full URL. No extra suffix is tolerated.
fn exact_manual_match(full_url: &str, wanted: &str, ignore_trailing_slash: bool) -> bool {
    let candidate = if wanted.starts_with('/') {
        path_and_query(full_url)
    } else {
        normalize(full_url).to_string()
    };
    if ignore_trailing_slash {
        candidate.trim_end_matches('/') == wanted.trim_end_matches('/')
    } else {
        candidate == wanted
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Cache lifetime in minutes for `relative`: the first per-page pattern
/// contained in the path, else the default.
pub fn resolve_duration(relative: &str, settings: &Settings) -> u32 {
    settings
        .per_page_durations
        .iter()
        .find(|rule| {
            let pattern = rule.pattern.trim();
            !pattern.is_empty() && relative.contains(pattern)
        })
        .map(|rule| rule.minutes.max(1))
        .unwrap_or_else(|| settings.default_duration())
}
