//! Parser for the user's category instruction block.
//!
//! A line whose first non-space character is `#` starts a new category;
//! the remainder of the line (trimmed) is the category name. Following
//! non-marker lines accumulate into that category's hint. Text before
//! the first marker is discarded.

/// A user-defined topical bucket that document snippets are classified
/// into. Immutable once parsed; lives for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDefinition {
    pub name: String,
    pub hint: String,
}

impl CategoryDefinition {
    /// The heading token used in the prompt/response contract: the name
    /// uppercased, with runs of non-alphanumeric characters collapsed
    /// to a single underscore.
    pub fn heading(&self) -> String {
        heading_token(&self.name)
    }
}

/// Derive a `#HEADING` token from a category name.
pub fn heading_token(name: &str) -> String {
    let mut token = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            token.extend(c.to_uppercase());
            last_was_sep = false;
        } else if !last_was_sep {
            token.push('_');
            last_was_sep = true;
        }
    }
    while token.ends_with('_') {
        token.pop();
    }
    token
}

/// Parse the instruction text into an ordered list of category
/// definitions. Insertion order is preserved; it drives prompt
/// construction and thus the model's preference ordering.
///
/// A repeated category name does not create a second entry: its hint
/// lines are appended to the first occurrence.
pub fn parse_categories(instructions: &str) -> Vec<CategoryDefinition> {
    let mut definitions: Vec<CategoryDefinition> = Vec::new();
    // Index into `definitions` of the category hint lines currently
    // attach to. None until the first marker.
    let mut current: Option<usize> = None;

    for line in instructions.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix('#') {
            let name = rest.trim();
            if name.is_empty() {
                // A bare `#` line ends the previous hint without
                // starting a category.
                current = None;
                continue;
            }
            if let Some(idx) = definitions.iter().position(|d| d.name == name) {
                current = Some(idx);
            } else {
                definitions.push(CategoryDefinition {
                    name: name.to_string(),
                    hint: String::new(),
                });
                current = Some(definitions.len() - 1);
            }
        } else if let Some(idx) = current {
            if !trimmed.is_empty() {
                let def = &mut definitions[idx];
                if !def.hint.is_empty() {
                    def.hint.push(' ');
                }
                def.hint.push_str(trimmed);
            }
        }
        // Non-marker text before the first marker is discarded.
    }

    definitions
}
