//! Report persistence implementations

mod file_repository;
mod in_memory;

pub use file_repository::FileReportRepository;
pub use in_memory::InMemoryReportRepository;
