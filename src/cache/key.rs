//! Cache key derivation.
//!
//! Page keys have the shape `admin-cache-<session>-<sha256(relative path)>`.
//! Session tokens are restricted to `[A-Za-z0-9_]` so the `-` separators stay
//! unambiguous and one session's prefix can never be a prefix of another's
//! keys.

use std::fmt;

use sha2::{Digest, Sha256};

/// Prefix shared by every page key.
pub const KEY_NAMESPACE: &str = "admin-cache-";

/// Longest session token kept after sanitization.
pub const MAX_TOKEN_LEN: usize = 64;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Strips an untrusted session value to the token alphabet.
///
/// Returns None when nothing usable remains.
pub fn sanitize_token(raw: &str) -> Option<String> {
    let token: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(MAX_TOKEN_LEN)
        .collect();
    (!token.is_empty()).then_some(token)
}

/// A parsed page key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    token: String,
    path_hash: String,
}

impl PageKey {
    /// Derives the key for `relative` within session `token`.
    ///
    /// `token` must already be sanitized.
    pub fn derive(token: &str, relative: &str) -> Self {
        Self {
            token: token.to_string(),
            path_hash: sha256_hex(relative.as_bytes()),
        }
    }

    /// Parses a key string produced by `Display`.
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(KEY_NAMESPACE)?;
        let (token, path_hash) = rest.rsplit_once('-')?;
        let token_ok = !token.is_empty()
            && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        let hash_ok = path_hash.len() == 64 && path_hash.chars().all(|c| c.is_ascii_hexdigit());
        (token_ok && hash_ok).then(|| Self {
            token: token.to_string(),
            path_hash: path_hash.to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the key string `key` belongs to session `token`.
    pub fn belongs_to(key: &str, token: &str) -> bool {
        Self::parse(key).is_some_and(|parsed| parsed.token == token)
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", KEY_NAMESPACE, self.token, self.path_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_token(" ab-c.d_e<script> ").as_deref(), Some("abcd_escript"));
        assert_eq!(sanitize_token("---"), None);
        assert_eq!(sanitize_token(""), None);
    }

    #[test]
    fn sanitize_truncates() {
        let token = sanitize_token(&"a".repeat(200)).unwrap();
        assert_eq!(token.len(), MAX_TOKEN_LEN);
    }

    #[test]
    fn derive_is_deterministic() {
        let a = PageKey::derive("tok", "index.php");
        let b = PageKey::derive("tok", "index.php");
        let c = PageKey::derive("tok", "tools.php");
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a.to_string(), c.to_string());
        assert!(a.to_string().starts_with("admin-cache-tok-"));
    }

    #[test]
    fn display_then_parse() {
        let key = PageKey::derive("session_1", "edit.php?post_type=page");
        assert_eq!(PageKey::parse(&key.to_string()), Some(key));
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        assert_eq!(PageKey::parse("admin-cache:registry"), None);
        assert_eq!(PageKey::parse("admin-cache-tok-nothex"), None);
        assert_eq!(PageKey::parse("other-tok-abc"), None);
    }

    #[test]
    fn belongs_to_compares_whole_tokens() {
        let key = PageKey::derive("ab", "index.php").to_string();
        assert!(PageKey::belongs_to(&key, "ab"));
        assert!(!PageKey::belongs_to(&key, "a"));
        assert!(!PageKey::belongs_to(&key, "abc"));
    }
}
