//! Prompt template parsing and rendering
//!
//! A prompt under evaluation may reference the test-case input with the
//! `{input}` placeholder and the use case with `{use_case}`. Prompts without
//! an `{input}` placeholder get the input appended after a blank line.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex to match placeholder patterns: {name}
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").unwrap());

pub const INPUT_PLACEHOLDER: &str = "input";
pub const USE_CASE_PLACEHOLDER: &str = "use_case";

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Original template content
    content: String,
    /// Placeholder names in order of first appearance
    placeholders: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template string and extract placeholder names
    pub fn parse(content: impl Into<String>) -> Self {
        let content = content.into();
        let mut placeholders = Vec::new();
        let mut seen = HashSet::new();

        for cap in PLACEHOLDER_PATTERN.captures_iter(&content) {
            let name = cap[1].to_string();
            if seen.insert(name.clone()) {
                placeholders.push(name);
            }
        }

        Self {
            content,
            placeholders,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// Substitute known placeholders; unknown ones are left verbatim
    pub fn render(&self, values: &HashMap<&str, &str>) -> String {
        PLACEHOLDER_PATTERN
            .replace_all(&self.content, |caps: &regex::Captures<'_>| {
                values
                    .get(&caps[1])
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Build the exact text sent to the model for one test case
    pub fn render_for_case(&self, input: &str, use_case: &str) -> String {
        let values = HashMap::from([
            (INPUT_PLACEHOLDER, input),
            (USE_CASE_PLACEHOLDER, use_case),
        ]);
        let rendered = self.render(&values);

        if self.has_placeholder(INPUT_PLACEHOLDER) {
            rendered
        } else {
            format!("{}\n\n{}", rendered, input)
        }
    }
}
