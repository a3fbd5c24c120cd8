//! Regex rule compilation.
//!
//! Operators type patterns by hand, so each one is vetted on its own: an
//! oversized or broken pattern is skipped and the rest still apply.

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Patterns longer than this are never compiled.
pub const MAX_PATTERN_LEN: usize = 80;

/// Upper bound on a compiled program, keeps hostile patterns cheap.
const COMPILED_SIZE_LIMIT: usize = 256 * 1024;

/// Why a pattern was left out of the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooLong(usize),
    Invalid(String),
}

/// A pattern that failed validation, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPattern {
    pub pattern: String,
    pub reason: Rejection,
}

/// The usable regex rules, in configured order.
#[derive(Debug, Default)]
pub struct RuleSet {
    patterns: Vec<Regex>,
    skipped: Vec<SkippedPattern>,
}

impl RuleSet {
    /// Compiles every non-blank pattern, skipping the ones that fail validation.
    pub fn compile<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut set = Self::default();
        for pattern in raw.iter().map(|p| p.as_ref().trim()).filter(|p| !p.is_empty()) {
            match compile_pattern(pattern) {
                Ok(regex) => set.patterns.push(regex),
                Err(reason) => {
                    warn!(pattern, ?reason, "Skipping cache regex rule");
                    set.skipped.push(SkippedPattern {
                        pattern: pattern.to_string(),
                        reason,
                    });
                }
            }
        }
        set
    }

    /// The first pattern matching `subject`, if any.
    pub fn first_match(&self, subject: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|regex| regex.is_match(subject))
            .map(Regex::as_str)
    }

    pub fn is_match(&self, subject: &str) -> bool {
        self.first_match(subject).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedPattern] {
        &self.skipped
    }
}

/// Validates and compiles one pattern.
///
/// Accepts plain patterns and delimited ones such as `/edit\.php/i`. A
/// pattern that reads both ways, like `(users)|(tools)`, is taken as
/// delimited only when that reading compiles. Compilation under the size
/// limit is the whole syntax check; a built `Regex` cannot fail to match.
pub fn compile_pattern(pattern: &str) -> Result<Regex, Rejection> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(Rejection::TooLong(pattern.len()));
    }

    match split_delimited(pattern) {
        Some((body, flags)) => build(body, flags).or_else(|delimited_err| {
            build(pattern, "").map_err(|_| delimited_err)
        }),
        None => build(pattern, ""),
    }
}

fn build(body: &str, flags: &str) -> Result<Regex, Rejection> {
    let mut builder = RegexBuilder::new(body);
    builder.size_limit(COMPILED_SIZE_LIMIT);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'U' => builder.swap_greed(true),
            // Flags without a counterpart here only affect PCRE internals
            _ => &mut builder,
        };
    }
    builder
        .build()
        .map_err(|err| Rejection::Invalid(err.to_string()))
}

/// Splits `/body/flags` style patterns. Delimiters are the punctuation
/// commonly used for this plus bracket pairs, which close with their partner.
/// Regex metacharacters such as `.` or `^` never open a delimited pattern.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let open = pattern.chars().next()?;
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        '/' | '#' | '~' | '!' | '@' | '%' | ';' | ',' | '|' => open,
        _ => return None,
    };
    let end = pattern.rfind(close)?;
    if end == 0 {
        return None;
    }
    let flags = &pattern[end + close.len_utf8()..];
    if !flags.chars().all(|c| "imsxuADSUXJn".contains(c)) {
        return None;
    }
    Some((&pattern[open.len_utf8()..end], flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_pattern_compiles() {
        let regex = compile_pattern(r"^edit\.php").unwrap();
        assert!(regex.is_match("edit.php?post_type=page"));
        assert!(!regex.is_match("post-edit.php"));
    }

    #[test]
    fn delimited_pattern_with_flags() {
        let regex = compile_pattern(r"/EDIT\.php/i").unwrap();
        assert!(regex.is_match("edit.php"));

        let regex = compile_pattern(r"#^tools#").unwrap();
        assert!(regex.is_match("tools.php"));

        let regex = compile_pattern(r"{upload}").unwrap();
        assert!(regex.is_match("upload.php"));
    }

    #[test]
    fn matching_is_case_sensitive_by_default() {
        let regex = compile_pattern("/Edit/").unwrap();
        assert!(!regex.is_match("edit.php"));
    }

    #[test]
    fn oversized_pattern_rejected() {
        let pattern = "a".repeat(MAX_PATTERN_LEN + 1);
        assert_eq!(
            compile_pattern(&pattern).unwrap_err(),
            Rejection::TooLong(MAX_PATTERN_LEN + 1)
        );
        assert!(compile_pattern(&"a".repeat(MAX_PATTERN_LEN)).is_ok());
    }

    #[test]
    fn broken_pattern_rejected() {
        assert!(matches!(compile_pattern("/(unclosed/"), Err(Rejection::Invalid(_))));
        assert!(matches!(compile_pattern("a{2,1}"), Err(Rejection::Invalid(_))));
    }

    #[test]
    fn rule_set_skips_bad_patterns_and_keeps_order() {
        let set = RuleSet::compile(&["(", "", "/users/", "/user/"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.skipped().len(), 1);
        assert_eq!(set.first_match("users.php"), Some("users"));
        assert!(!set.is_match("index.php"));
    }

    #[test]
    fn grouped_alternation_is_a_plain_pattern() {
        let regex = compile_pattern("(users)|(tools)").unwrap();
        assert!(regex.is_match("users.php"));
        assert!(regex.is_match("tools.php"));
        assert!(!regex.is_match("index.php"));
    }

    #[test]
    fn metacharacter_start_is_a_plain_pattern() {
        let regex = compile_pattern(".*x.").unwrap();
        assert!(regex.is_match("index.php"));
        assert!(!regex.is_match("tools.php"));

        let regex = compile_pattern("^options-").unwrap();
        assert!(regex.is_match("options-general.php"));
    }

    #[test]
    fn rule_set_keeps_plain_grouped_patterns() {
        let set = RuleSet::compile(&["(users)|(tools)"]);
        assert_eq!(set.len(), 1);
        assert!(set.skipped().is_empty());
        assert!(set.is_match("tools.php"));
    }
}
