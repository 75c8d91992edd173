pub mod api;
pub mod retry;

#[cfg(test)]
mod tests;

pub use api::{ForumApi, ForumApiClient, PostOrder, DEFAULT_FORUM_API_BASE};
pub use retry::{classify_failure, failure_error, ForumRetryConfig, RetryState, RetryStrategy};
