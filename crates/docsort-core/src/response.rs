//! Parser for the model's completion text.
//!
//! The counterpart of [`crate::prompt`]: the completion is split on
//! heading lines of the form `#TOKEN` (alone on their line), and each
//! token is mapped back to the category it was derived from. Headings
//! the model invented despite the prompt fall into the `OTHER` bucket
//! rather than being dropped, so no extracted text is lost.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::OTHER_HEADING;
use crate::categories::CategoryDefinition;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#(\w+)\s*$").expect("heading regex"));

/// Content prefixes the prompt asks the model to emit for empty
/// categories. Blocks starting with these carry no extracted text.
const NO_CONTENT_MARKERS: [&str; 2] = ["No content found", "No other significant content"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no category headings found in response")]
    NoHeadings,
    #[error("response was empty")]
    EmptyResponse,
}

/// Parse a completion into (category name, snippet) pairs.
///
/// Pairs appear in order of first appearance in the response. A heading
/// repeated by the model merges its blocks (newline-joined) into the
/// first pair instead of overwriting it. Blocks that only state "no
/// content found" are dropped.
pub fn parse_response(
    completion: &str,
    definitions: &[CategoryDefinition],
) -> Result<Vec<(String, String)>, ParseError> {
    if completion.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let matches: Vec<(usize, usize, String)> = HEADING_RE
        .captures_iter(completion)
        .map(|c| {
            let m = c.get(0).expect("whole match");
            (m.start(), m.end(), c[1].to_uppercase())
        })
        .collect();

    if matches.is_empty() {
        return Err(ParseError::NoHeadings);
    }

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (i, (_, end, token)) in matches.iter().enumerate() {
        let block_end = matches
            .get(i + 1)
            .map(|(start, _, _)| *start)
            .unwrap_or(completion.len());
        let content = completion[*end..block_end].trim();
        if content.is_empty() || NO_CONTENT_MARKERS.iter().any(|m| content.starts_with(m)) {
            continue;
        }

        let category = resolve_category(token, definitions);
        match pairs.iter_mut().find(|(name, _)| *name == category) {
            Some((_, existing)) => {
                existing.push('\n');
                existing.push_str(content);
            }
            None => pairs.push((category, content.to_string())),
        }
    }

    Ok(pairs)
}

/// Map a heading token back to its category name. Tokens that match no
/// definition (including `OTHER` itself) land in the `OTHER` bucket.
fn resolve_category(token: &str, definitions: &[CategoryDefinition]) -> String {
    definitions
        .iter()
        .find(|d| d.heading() == token)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| OTHER_HEADING.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::parse_categories;

    fn defs() -> Vec<CategoryDefinition> {
        parse_categories("#Gold\n#Fixed Income")
    }

    #[test]
    fn two_blocks_parse_to_two_pairs() {
        let completion = "#GOLD\n- gold rallied\n#FIXED_INCOME\n- yields fell\n";
        let pairs = parse_response(completion, &defs()).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("Gold".to_string(), "- gold rallied".to_string()),
                ("Fixed Income".to_string(), "- yields fell".to_string()),
            ]
        );
    }

    #[test]
    fn missing_delimiters_is_a_parse_error() {
        let err = parse_response("gold rallied, yields fell", &defs()).unwrap_err();
        assert_eq!(err, ParseError::NoHeadings);
    }

    #[test]
    fn empty_response_is_a_parse_error() {
        assert_eq!(
            parse_response("  \n ", &defs()).unwrap_err(),
            ParseError::EmptyResponse
        );
    }

    #[test]
    fn unknown_heading_falls_back_to_other() {
        let completion = "#CRYPTO\n- bitcoin climbed\n";
        let pairs = parse_response(completion, &defs()).unwrap();
        assert_eq!(pairs, vec![("OTHER".to_string(), "- bitcoin climbed".to_string())]);
    }

    #[test]
    fn repeated_heading_merges_not_overwrites() {
        let completion = "#GOLD\nfirst block\n#GOLD\nsecond block\n";
        let pairs = parse_response(completion, &defs()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "first block\nsecond block");
    }

    #[test]
    fn no_content_blocks_are_dropped() {
        let completion =
            "#GOLD\nNo content found for GOLD.\n#FIXED_INCOME\n- spreads widened\n";
        let pairs = parse_response(completion, &defs()).unwrap();
        assert_eq!(pairs, vec![("Fixed Income".to_string(), "- spreads widened".to_string())]);
    }

    #[test]
    fn heading_case_is_normalized() {
        let completion = "#gold\n- content\n";
        let pairs = parse_response(completion, &defs()).unwrap();
        assert_eq!(pairs[0].0, "Gold");
    }

    #[test]
    fn text_before_first_heading_is_ignored() {
        let completion = "Sure, here is the breakdown:\n#GOLD\n- content\n";
        let pairs = parse_response(completion, &defs()).unwrap();
        assert_eq!(pairs.len(), 1);
    }
}
