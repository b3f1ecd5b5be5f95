//! LLM provider implementations and the resilient completion client

mod completion;
mod http_client;
mod openai;
pub mod parsing;
mod rate_limiter;
mod retry;

pub use completion::CompletionClient;
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::{DEFAULT_BASE_URL, OpenAiProvider};
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use retry::RetryConfig;
