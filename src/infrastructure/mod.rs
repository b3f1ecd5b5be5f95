//! Infrastructure layer - model clients, graders, report storage and services

pub mod grader;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod report;
pub mod services;
