//! Rules Module
//!
//! Turns a request URL into a relative page identity and decides whether
//! that page may be cached, and for how long.

mod matcher;
mod normalize;
mod pattern;
mod prefetch;

pub use matcher::{resolve_duration, should_cache, without_query, Reason, Verdict, ALWAYS_SKIP};
pub use normalize::{normalize, path_and_query, relative_path};
pub use pattern::{compile_pattern, Rejection, RuleSet, SkippedPattern, MAX_PATTERN_LEN};
pub use prefetch::{admin_url, prefetch_urls};
