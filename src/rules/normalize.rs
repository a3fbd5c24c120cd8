//! URL normalization.
//!
//! Cache identities are scheme-agnostic: `https://host/a` and `http://host/a`
//! name the same page.

use url::Url;

/// Trims `raw` and strips a leading `scheme://`, case-insensitively.
///
/// Any RFC 3986 scheme token is accepted. Nothing else changes: the path
/// keeps its case and trailing slash.
pub fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();
    match scheme_len(trimmed) {
        Some(len) => &trimmed[len + 3..],
        None => trimmed,
    }
}

/// Length of the scheme token when `s` starts with `scheme://`.
fn scheme_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if !bytes.first()?.is_ascii_alphabetic() {
        return None;
    }
    let len = bytes
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')))?;
    s[len..].starts_with("://").then_some(len)
}

/// Parses a normalized URL (or bare path) into `(path, query)`.
fn split_url(normalized: &str) -> Option<(String, Option<String>)> {
    let candidate = if normalized.starts_with('/') {
        format!("http://localhost{normalized}")
    } else {
        format!("http://{normalized}")
    };
    let url = Url::parse(&candidate).ok()?;
    Some((url.path().to_string(), url.query().map(str::to_string)))
}

/// The URL minus scheme and authority, e.g. `/wp-admin/edit.php?x=1`.
pub fn path_and_query(full_url: &str) -> String {
    let normalized = normalize(full_url);
    match split_url(normalized) {
        Some((path, Some(query))) => format!("{path}?{query}"),
        Some((path, None)) => path,
        None => normalized.to_string(),
    }
}

/// Resolves `full_url` to a path relative to `admin_root`.
///
/// The admin-root path is stripped as a prefix; when it is not a prefix the
/// first occurrence is removed instead. A query string, if any, is kept so
/// that screens sharing a script name stay distinct.
pub fn relative_path(full_url: &str, admin_root: &str) -> String {
    let (current_path, query) = split_url(normalize(full_url)).unwrap_or_default();
    let (admin_path, _) = split_url(normalize(admin_root)).unwrap_or_default();

    let relative = if admin_path.is_empty() {
        current_path
    } else if let Some(rest) = current_path.strip_prefix(admin_path.as_str()) {
        rest.to_string()
    } else {
        current_path.replacen(admin_path.as_str(), "", 1)
    };

    match query {
        Some(query) => format!("{relative}?{query}"),
        None => relative,
    }
}
