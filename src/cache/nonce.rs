//! Anti-forgery nonces for prefetch probes.
//!
//! A nonce binds a session to a 12-hour tick. The current and the previous
//! tick are accepted, so a nonce stays valid for 12 to 24 hours.

use subtle::ConstantTimeEq;

use crate::cache::key::sha256_hex;

const ACTION: &str = "admin-cache-prefetch";
const TICK_SECS: i64 = 12 * 60 * 60;

#[derive(Clone)]
pub struct NonceIssuer {
    secret: String,
}

impl NonceIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The nonce a page rendered now should embed for `session`.
    pub fn issue(&self, session: &str) -> String {
        self.issue_at(session, chrono::Utc::now().timestamp())
    }

    pub fn verify(&self, session: &str, nonce: &str) -> bool {
        self.verify_at(session, nonce, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, session: &str, now: i64) -> String {
        self.digest(session, now.div_euclid(TICK_SECS))
    }

    fn verify_at(&self, session: &str, nonce: &str, now: i64) -> bool {
        let tick = now.div_euclid(TICK_SECS);
        [tick, tick - 1].iter().any(|&t| {
            let expected = self.digest(session, t);
            bool::from(expected.as_bytes().ct_eq(nonce.as_bytes()))
        })
    }

    fn digest(&self, session: &str, tick: i64) -> String {
        sha256_hex(format!("{}:{}:{}:{}", self.secret, session, ACTION, tick).as_bytes())
    }
}
