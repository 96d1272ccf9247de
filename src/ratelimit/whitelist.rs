//! Whitelist rules exempting keys from rate limiting.
//!
//! Entries starting with `regexp:` are regular expressions matched anywhere
//! in the key (anchor them with `^`/`$` for a full match). Every other entry
//! is an exact literal.

use regex::Regex;
use std::collections::HashSet;

use crate::error::{Result, TurnstileError};

/// Prefix marking a whitelist entry as a regular expression.
pub const REGEXP_PREFIX: &str = "regexp:";

/// A compiled pattern rule.
#[derive(Debug, Clone)]
struct PatternRule {
    /// The configured entry, prefix included
    rule: String,
    regex: Regex,
}

/// Compiled whitelist.
///
/// Immutable after construction. An empty whitelist exempts nothing.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    literals: HashSet<String>,
    patterns: Vec<PatternRule>,
}

impl Whitelist {
    /// A whitelist that exempts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile whitelist entries.
    ///
    /// Fails on the first pattern that does not compile.
    pub fn compile<I, S>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::new();

        for rule in rules {
            let rule = rule.as_ref();
            match rule.strip_prefix(REGEXP_PREFIX) {
                Some(pattern) => {
                    let regex = Regex::new(pattern).map_err(|source| TurnstileError::Pattern {
                        rule: rule.to_string(),
                        source,
                    })?;
                    whitelist.patterns.push(PatternRule {
                        rule: rule.to_string(),
                        regex,
                    });
                }
                None => {
                    whitelist.literals.insert(rule.to_string());
                }
            }
        }

        Ok(whitelist)
    }

    /// Whether `key` bypasses the limiter.
    ///
    /// Literals are checked first, then patterns in configuration order.
    pub fn is_exempt(&self, key: &str) -> bool {
        self.matching_rule(key).is_some()
    }

    /// The rule that exempts `key`, if any.
    pub fn matching_rule(&self, key: &str) -> Option<&str> {
        if let Some(literal) = self.literals.get(key) {
            return Some(literal.as_str());
        }
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(key))
            .map(|p| p.rule.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.patterns.is_empty()
    }

    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_whitelist_exempts_nothing() {
        let whitelist = Whitelist::new();
        assert!(whitelist.is_empty());
        assert!(!whitelist.is_exempt("example.com"));
        assert!(!whitelist.is_exempt(""));
    }

    #[test]
    fn test_literal_match_is_exact() {
        let whitelist = Whitelist::compile(["example.com"]).unwrap();

        assert!(whitelist.is_exempt("example.com"));
        assert!(!whitelist.is_exempt("www.example.com"));
        assert!(!whitelist.is_exempt("example.co"));
    }

    #[test]
    fn test_literal_is_not_a_pattern() {
        let whitelist = Whitelist::compile(["a.b"]).unwrap();

        assert!(whitelist.is_exempt("a.b"));
        assert!(!whitelist.is_exempt("axb"));
    }

    #[test]
    fn test_pattern_match() {
        let whitelist = Whitelist::compile([r"regexp:^.*\.internal$"]).unwrap();

        assert_eq!(whitelist.pattern_count(), 1);
        assert_eq!(whitelist.literal_count(), 0);
        assert!(whitelist.is_exempt("api.internal"));
        assert!(!whitelist.is_exempt("api.internal.example.com"));
    }

    #[test]
    fn test_unanchored_pattern_matches_substring() {
        let whitelist = Whitelist::compile(["regexp:health"]).unwrap();
        assert!(whitelist.is_exempt("healthcheck.local"));
    }

    #[test]
    fn test_mixed_rules() {
        let whitelist =
            Whitelist::compile(["static.example.com", "regexp:^10\\.", "regexp:^$"]).unwrap();

        assert!(whitelist.is_exempt("static.example.com"));
        assert!(whitelist.is_exempt("10.0.0.1"));
        assert!(whitelist.is_exempt(""));
        assert!(!whitelist.is_exempt("api.example.com"));
    }

    #[test]
    fn test_matching_rule_reports_first_match() {
        let whitelist = Whitelist::compile(["regexp:^a", "regexp:b$", "ab"]).unwrap();

        assert_eq!(whitelist.matching_rule("ab"), Some("ab"));
        assert_eq!(whitelist.matching_rule("axb"), Some("regexp:^a"));
        assert_eq!(whitelist.matching_rule("xb"), Some("regexp:b$"));
        assert_eq!(whitelist.matching_rule("x"), None);
    }

    #[test]
    fn test_invalid_pattern_fails_compile() {
        let err = Whitelist::compile(["ok.example.com", "regexp:(invalid"]).unwrap_err();

        match err {
            TurnstileError::Pattern { rule, .. } => assert_eq!(rule, "regexp:(invalid"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
