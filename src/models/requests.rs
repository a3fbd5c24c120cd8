//! Request DTOs for the operator API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::{sanitize_token, PurgeScope};

/// Request body for POST /admin-cache/purge
///
/// # Fields
/// - `scope`: `site` purges every session, `session` purges one
/// - `session`: token to purge; defaults to the caller's session cookie
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeRequest {
    pub scope: PurgeScope,
    #[serde(default)]
    pub session: Option<String>,
}

impl PurgeRequest {
    /// The sanitized session a session-scoped purge targets, preferring the
    /// body over `cookie_session`.
    ///
    /// Returns an error message when a session purge has no usable token.
    pub fn target_session(&self, cookie_session: Option<&str>) -> Result<Option<String>, String> {
        match self.scope {
            PurgeScope::Site => Ok(None),
            PurgeScope::Session => self
                .session
                .as_deref()
                .or(cookie_session)
                .and_then(sanitize_token)
                .map(Some)
                .ok_or_else(|| "Session purge needs a session token".to_string()),
        }
    }
}
