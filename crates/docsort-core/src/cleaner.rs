//! Boilerplate removal via user-supplied regex rules.
//!
//! Rules come in as free text, one pattern per line. Each pattern is
//! compiled case-insensitive with `.` matching newlines, so disclaimer
//! blocks spanning pages can be stripped with a non-greedy `.*?`.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[error("invalid cleaning pattern `{pattern}`: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// A compiled, ordered set of cleaning rules.
#[derive(Debug, Clone, Default)]
pub struct CleaningRules {
    patterns: Vec<Regex>,
}

impl CleaningRules {
    /// Compile one pattern per non-blank line of `rules_text`.
    ///
    /// Invalid patterns are skipped and returned alongside the compiled
    /// set so the caller can report them; the remaining patterns still
    /// apply.
    pub fn compile(rules_text: &str) -> (Self, Vec<PatternError>) {
        let mut patterns = Vec::new();
        let mut errors = Vec::new();

        for line in rules_text.lines() {
            let pattern = line.trim();
            if pattern.is_empty() {
                continue;
            }
            match RegexBuilder::new(pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
            {
                Ok(re) => patterns.push(re),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "skipping invalid cleaning pattern");
                    errors.push(PatternError {
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        (Self { patterns }, errors)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Delete every match of every pattern, in listed order, then
    /// collapse runs of whitespace to single spaces.
    pub fn apply(&self, text: &str) -> String {
        let mut cleaned = text.to_string();
        for re in &self.patterns {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_every_match() {
        let (rules, errors) = CleaningRules::compile(r"Disclaimer:.*?reserved\.");
        assert!(errors.is_empty());
        let out = rules.apply("intro Disclaimer: all rights reserved. body");
        assert_eq!(out, "intro body");
    }

    #[test]
    fn patterns_apply_in_listed_order() {
        // The first pattern consumes "ab"; the second would have matched
        // "abc" but no longer can.
        let (rules, _) = CleaningRules::compile("ab\nabc");
        assert_eq!(rules.apply("abc"), "c");
    }

    #[test]
    fn case_insensitive_and_multiline() {
        let (rules, _) = CleaningRules::compile(r"this document.*?only\.");
        let out = rules.apply("THIS DOCUMENT is for\ninformational purposes ONLY. Keep this.");
        assert_eq!(out, "Keep this.");
    }

    #[test]
    fn digit_classes_work() {
        let (rules, _) = CleaningRules::compile(r"Page \d+ of \d+");
        assert_eq!(rules.apply("text Page 3 of 12 more"), "text more");
    }

    #[test]
    fn invalid_pattern_is_reported_not_fatal() {
        let (rules, errors) = CleaningRules::compile("[unclosed\nfooter");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pattern, "[unclosed");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.apply("a footer b"), "a b");
    }

    #[test]
    fn blank_lines_ignored() {
        let (rules, errors) = CleaningRules::compile("\n\n  \nfoo\n\n");
        assert!(errors.is_empty());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn whitespace_collapses() {
        let (rules, _) = CleaningRules::compile("");
        assert_eq!(rules.apply("a  b\n\nc\t d"), "a b c d");
    }

    #[test]
    fn second_pass_is_idempotent() {
        let (rules, _) = CleaningRules::compile("Disclaimer:.*?reserved\\.\nPage \\d+");
        let once = rules.apply("x Disclaimer: rights reserved. y Page 9 z");
        let twice = rules.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "x y z");
    }
}
