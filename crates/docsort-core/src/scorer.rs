//! Naive relevance scoring.
//!
//! The score is a case-insensitive, non-overlapping count of the
//! category name within its snippet. Hints shape the prompt, not the
//! score.

/// Count occurrences of `keyword` in `snippet`, case-insensitively.
pub fn score_snippet(keyword: &str, snippet: &str) -> usize {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return 0;
    }
    let haystack = snippet.to_lowercase();
    let needle = keyword.to_lowercase();
    haystack.matches(needle.as_str()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_occurrences() {
        let snippet = "Earnings rose. Earnings guidance was cut, but earnings held.";
        assert_eq!(score_snippet("Earnings", snippet), 3);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(score_snippet("gold", "GOLD and Gold and gold"), 3);
    }

    #[test]
    fn zero_when_absent() {
        assert_eq!(score_snippet("Oil", "nothing relevant here"), 0);
    }

    #[test]
    fn empty_keyword_scores_zero() {
        assert_eq!(score_snippet("", "anything"), 0);
        assert_eq!(score_snippet("  ", "anything"), 0);
    }

    #[test]
    fn multiword_keyword() {
        assert_eq!(
            score_snippet("Fixed Income", "fixed income desks; Fixed Income outlook"),
            2
        );
    }
}
