use starwatch_core::ForumApiError;
use std::time::Duration;

/// Backoff settings for the forum's two throttling signals.
#[derive(Debug, Clone)]
pub struct ForumRetryConfig {
    /// Wait before repeating a request rejected by flood control
    pub flood_backoff: Duration,
    /// Wait after an HTTP 429 before giving up on the request
    pub rate_limit_backoff: Duration,
    /// Text the forum puts in a 403 body when flood control is active.
    /// The API exposes no structured code for this, so the body is matched.
    pub flood_marker: String,
}

impl Default for ForumRetryConfig {
    fn default() -> Self {
        Self {
            flood_backoff: Duration::from_secs(3),
            rate_limit_backoff: Duration::from_secs(10),
            flood_marker: "Необходимо подождать".to_string(),
        }
    }
}

impl ForumRetryConfig {
    pub fn with_flood_marker(flood_marker: impl Into<String>) -> Self {
        Self {
            flood_marker: flood_marker.into(),
            ..Default::default()
        }
    }

    pub fn is_flood_control(&self, status_code: u16, body: &str) -> bool {
        status_code == 403 && !self.flood_marker.is_empty() && body.contains(&self.flood_marker)
    }
}

/// A request is repeated at most once, so the policy only needs to know
/// whether the repeat has been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Fresh,
    Retried,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Sleep, then repeat the same request
    RetryAfter(Duration),
    /// Sleep, then report the failure to the caller
    BackoffThenFail(Duration),
    /// Report the failure immediately
    NoRetry,
}

/// Decide what to do with a non-success response.
pub fn classify_failure(
    status_code: u16,
    body: &str,
    state: RetryState,
    config: &ForumRetryConfig,
) -> RetryStrategy {
    if config.is_flood_control(status_code, body) {
        return match state {
            RetryState::Fresh => RetryStrategy::RetryAfter(config.flood_backoff),
            RetryState::Retried => RetryStrategy::NoRetry,
        };
    }

    if status_code == 429 {
        return RetryStrategy::BackoffThenFail(config.rate_limit_backoff);
    }

    RetryStrategy::NoRetry
}

/// Map a non-success response to a typed error.
pub fn failure_error(
    status_code: u16,
    body: &str,
    endpoint: &str,
    config: &ForumRetryConfig,
) -> ForumApiError {
    match status_code {
        401 => ForumApiError::AuthenticationFailed {
            reason: truncate(body),
        },
        403 if config.is_flood_control(status_code, body) => ForumApiError::FloodControl {
            message: truncate(body),
        },
        403 => ForumApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => ForumApiError::NotFound {
            resource: endpoint.to_string(),
        },
        429 => ForumApiError::RateLimitExceeded {
            retry_after: config.rate_limit_backoff.as_secs(),
        },
        500..=599 => ForumApiError::ServerError { status_code },
        _ => ForumApiError::RequestFailed {
            status_code,
            body: truncate(body),
        },
    }
}

fn truncate(body: &str) -> String {
    const MAX_CHARS: usize = 300;
    if body.chars().count() > MAX_CHARS {
        let mut short: String = body.chars().take(MAX_CHARS).collect();
        short.push('…');
        short
    } else {
        body.to_string()
    }
}
