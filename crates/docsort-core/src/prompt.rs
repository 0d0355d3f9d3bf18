//! System prompt construction.
//!
//! The prompt and the response parser share a textual contract: the
//! model may only answer with the `#HEADING` tokens listed here, one
//! per line, each followed by the extracted content. Changing the
//! heading format requires a matching change in [`crate::response`].

use crate::OTHER_HEADING;
use crate::categories::CategoryDefinition;

/// Build the restrictive extraction prompt from the category
/// definitions, in their listed order.
pub fn build_prompt(definitions: &[CategoryDefinition], include_other: bool) -> String {
    let base = "You are a highly specialized text extraction tool. Your one and only job \
is to find and extract text that is strictly relevant to the category headings provided below. \
DO NOT create any new category headings that are not in the list. \
DO NOT extract information for any topics not listed in the headings. \
For each heading, provide a summary. If no relevant text is found for a heading, \
you MUST write 'No content found for [HEADING_NAME].'";

    let mut headings: Vec<String> = definitions
        .iter()
        .map(|d| format!("#{}", d.heading()))
        .collect();
    if include_other {
        headings.push(format!("#{}", OTHER_HEADING));
    }
    let allowed = format!(
        "The ONLY category headings you are allowed to use in your response are: {}.",
        headings.join(", ")
    );

    let mut examples: Vec<String> = definitions
        .iter()
        .map(|d| {
            let heading = d.heading();
            let topic = if d.hint.is_empty() {
                d.name.clone()
            } else {
                format!("{} ({})", d.name, d.hint)
            };
            format!(
                "#{heading}\n[If you find any content related to {topic}, summarize it \
here as a bulleted list. If you find nothing, write 'No content found for {heading}.']"
            )
        })
        .collect();
    if include_other {
        examples.push(format!(
            "#{OTHER_HEADING}\n[If you find any other significant topics, summarize them here \
as a bulleted list. If not, write 'No other significant content found.']"
        ));
    }

    format!(
        "{base}\n\n{allowed}\n\n--- EXAMPLES OF REQUIRED FORMAT ---\n{}",
        examples.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::parse_categories;

    #[test]
    fn lists_all_headings_in_order() {
        let defs = parse_categories("#Gold\nspot and futures\n#Fixed Income");
        let prompt = build_prompt(&defs, false);
        assert!(prompt.contains("#GOLD, #FIXED_INCOME."));
        assert!(prompt.contains("Gold (spot and futures)"));
        assert!(!prompt.contains("#OTHER"));
    }

    #[test]
    fn other_bucket_is_optional() {
        let defs = parse_categories("#Oil");
        let with = build_prompt(&defs, true);
        let without = build_prompt(&defs, false);
        assert!(with.contains("#OIL, #OTHER."));
        assert!(!without.contains("#OTHER"));
    }

    #[test]
    fn format_example_per_heading() {
        let defs = parse_categories("#Bonds\n#Equities");
        let prompt = build_prompt(&defs, false);
        assert!(prompt.contains("#BONDS\n[If you find any content related to Bonds,"));
        assert!(prompt.contains("No content found for EQUITIES."));
    }
}
