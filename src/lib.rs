//! Prompt evaluation engine
//!
//! Generates synthetic test cases for a prompt, runs the prompt against them
//! through an OpenAI-compatible model, grades every response with a
//! pluggable set of graders and aggregates the verdicts into reports.
//! Several prompt variants can be compared on one shared case set, and
//! rule-based suggestions are derived from the resulting statistics.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
