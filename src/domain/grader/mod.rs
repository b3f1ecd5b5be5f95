//! Grader capability - uniform scoring contract and the grader registry

mod grader;
mod registry;
mod verdict;

pub use grader::{FnGrader, Grader, GradingContext};
pub use registry::GraderRegistry;
pub use verdict::{DEFAULT_PASS_THRESHOLD, GraderVerdict, MAX_SCORE};
