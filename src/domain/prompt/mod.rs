//! Prompt templates with `{input}` placeholder support

mod template;

pub use template::{INPUT_PLACEHOLDER, PromptTemplate, USE_CASE_PLACEHOLDER};
