//! Prefetch list construction.

use url::Url;

use super::matcher::{listed, without_query};
use crate::settings::{Mode, Snapshot};

/// Joins an admin page slug onto the admin root.
pub fn admin_url(admin_root: &str, page: &str) -> String {
    format!(
        "{}/{}",
        admin_root.trim_end_matches('/'),
        page.trim_start_matches('/')
    )
}

/// URLs worth warming for an operator, given the current rules.
pub fn prefetch_urls(snapshot: &Snapshot, admin_root: &str) -> Vec<String> {
    let settings = &snapshot.settings;
    if !settings.enabled {
        return Vec::new();
    }

    let mut urls: Vec<String> = if settings.manual_only {
        settings
            .manual_list
            .iter()
            .map(|line| resolve_manual_line(admin_root, line))
            .collect()
    } else {
        match settings.mode {
            Mode::Blacklist => settings
                .known_pages
                .iter()
                .filter(|page| !listed(&settings.deny_list, page))
                .filter(|page| !snapshot.rules.is_match(without_query(page)))
                .map(|page| admin_url(admin_root, page))
                .collect(),
            Mode::Whitelist => settings
                .allow_list
                .iter()
                .chain(
                    settings
                        .known_pages
                        .iter()
                        .filter(|page| {
                            !settings.strict_whitelist && snapshot.rules.is_match(without_query(page))
                        }),
                )
                .map(|page| admin_url(admin_root, page))
                .collect(),
        }
    };

    let mut seen = std::collections::HashSet::new();
    urls.retain(|url| seen.insert(url.clone()));
    urls
}

/// Absolute lines pass through; path lines resolve against the admin root's
/// origin.
fn resolve_manual_line(admin_root: &str, line: &str) -> String {
    if line.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("http")) {
        return line.to_string();
    }
    Url::parse(admin_root)
        .and_then(|root| root.join(line))
        .map(String::from)
        .unwrap_or_else(|_| admin_url(admin_root, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    const ROOT: &str = "https://example.com/wp-admin/";

    fn pages(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn disabled_settings_prefetch_nothing() {
        let snap = Snapshot::build(Settings {
            allow_list: pages(&["index.php"]),
            ..Settings::default()
        });
        assert!(prefetch_urls(&snap, ROOT).is_empty());
    }

    #[test]
    fn whitelist_lists_allowed_and_regex_pages() {
        let snap = Snapshot::build(Settings {
            enabled: true,
            allow_list: pages(&["index.php", "tools.php"]),
            regex_rules: pages(&["^options"]),
            known_pages: pages(&["index.php", "options-general.php", "users.php"]),
            ..Settings::default()
        });
        assert_eq!(
            prefetch_urls(&snap, ROOT),
            vec![
                "https://example.com/wp-admin/index.php",
                "https://example.com/wp-admin/tools.php",
                "https://example.com/wp-admin/options-general.php",
            ]
        );
    }

    #[test]
    fn blacklist_lists_known_pages_minus_exclusions() {
        let snap = Snapshot::build(Settings {
            enabled: true,
            mode: Mode::Blacklist,
            deny_list: pages(&["users.php"]),
            regex_rules: pages(&["^tools"]),
            known_pages: pages(&["index.php", "tools.php", "users.php", "upload.php"]),
            ..Settings::default()
        });
        assert_eq!(
            prefetch_urls(&snap, ROOT),
            vec![
                "https://example.com/wp-admin/index.php",
                "https://example.com/wp-admin/upload.php",
            ]
        );
    }

    #[test]
    fn manual_lines_resolve_against_admin_origin() {
        let snap = Snapshot::build(Settings {
            enabled: true,
            manual_only: true,
            manual_list: pages(&["/wp-admin/edit.php", "http://other.example.com/wp-admin/x.php"]),
            ..Settings::default()
        });
        assert_eq!(
            prefetch_urls(&snap, ROOT),
            vec![
                "https://example.com/wp-admin/edit.php",
                "http://other.example.com/wp-admin/x.php",
            ]
        );
    }
}
