use crate::error::*;
use std::fmt::Display;
use tracing::{error, warn};

/// Stable codes and operator-facing wording for every error type.
pub trait ErrorExt: Display {
    fn error_code(&self) -> &'static str;
    fn user_friendly_message(&self) -> String;

    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = self.error_code(), "{}", self);
        self
    }
}

impl ErrorExt for CoreError {
    /// Wrapped errors report their own, more specific code.
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::ForumApi(e) => e.error_code(),
            CoreError::Messaging(e) => e.error_code(),
            CoreError::Ledger(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::ForumApi(e) => e.user_friendly_message(),
            CoreError::Messaging(e) => e.user_friendly_message(),
            CoreError::Ledger(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Io(e) => format!("File access failed: {}", e),
            CoreError::Serialization(_) => "A stored file could not be read or written.".to_string(),
        }
    }
}

impl ErrorExt for ForumApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ForumApiError::AuthenticationFailed { .. } => "FORUM_AUTH_FAILED",
            ForumApiError::RateLimitExceeded { .. } => "FORUM_RATE_LIMIT",
            ForumApiError::FloodControl { .. } => "FORUM_FLOOD_CONTROL",
            ForumApiError::Forbidden { .. } => "FORUM_FORBIDDEN",
            ForumApiError::NotFound { .. } => "FORUM_NOT_FOUND",
            ForumApiError::RequestTimeout => "FORUM_TIMEOUT",
            ForumApiError::InvalidResponse { .. } => "FORUM_INVALID_RESPONSE",
            ForumApiError::ServerError { .. } => "FORUM_SERVER_ERROR",
            ForumApiError::RequestFailed { .. } => "FORUM_REQUEST_FAILED",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ForumApiError::AuthenticationFailed { .. } => {
                "Forum authentication failed. Please check your API token.".to_string()
            }
            ForumApiError::RateLimitExceeded { retry_after } => format!(
                "Too many forum requests. Waited {} seconds; the next check will try again.",
                retry_after
            ),
            ForumApiError::FloodControl { .. } => {
                "The forum is still asking us to slow down.".to_string()
            }
            ForumApiError::Forbidden { resource } => {
                format!("Access denied to {}. Check the token's permissions.", resource)
            }
            ForumApiError::NotFound { resource } => {
                format!("'{}' was not found on the forum.", resource)
            }
            ForumApiError::RequestTimeout => "Request to the forum timed out.".to_string(),
            _ => "Forum API error occurred. Please try again later.".to_string(),
        }
    }
}

impl ErrorExt for MessagingError {
    fn error_code(&self) -> &'static str {
        match self {
            MessagingError::FloodWait { .. } => "MSG_FLOOD_WAIT",
            MessagingError::PaidReactionsUnsupported => "MSG_PAID_REACTIONS_UNSUPPORTED",
            MessagingError::NoMessages { .. } => "MSG_NO_MESSAGES",
            MessagingError::SessionMissing { .. } => "MSG_SESSION_MISSING",
            MessagingError::AuthenticationFailed { .. } => "MSG_AUTH_FAILED",
            MessagingError::Rpc { .. } => "MSG_RPC_ERROR",
            MessagingError::Transport { .. } => "MSG_TRANSPORT",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            MessagingError::FloodWait { seconds } => {
                format!("Messaging flood control: waiting {} seconds.", seconds)
            }
            MessagingError::PaidReactionsUnsupported => {
                "Paid reactions are unavailable. Stars cannot be sent.".to_string()
            }
            MessagingError::NoMessages { channel } => {
                format!("Could not find any messages in @{}.", channel)
            }
            MessagingError::SessionMissing { .. } => {
                "No messaging session found. Run once to log in.".to_string()
            }
            MessagingError::AuthenticationFailed { .. } => {
                "Messaging login failed. Please check your credentials.".to_string()
            }
            _ => "The messaging gateway could not be reached or refused the call.".to_string(),
        }
    }
}

impl ErrorExt for LedgerError {
    fn error_code(&self) -> &'static str {
        match self {
            LedgerError::PersistFailed { .. } => "LEDGER_PERSIST_FAILED",
            LedgerError::Corrupt { .. } => "LEDGER_CORRUPT",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LedgerError::PersistFailed { path, .. } => format!(
                "Could not save processed posts to {}. Check disk space and permissions.",
                path
            ),
            LedgerError::Corrupt { path, .. } => {
                format!("Processed posts file {} is unreadable and was ignored.", path)
            }
        }
    }
}

impl ErrorExt for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT",
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => format!(
                "Configuration file '{}' not found. Run with --reset-config to create one.",
                path
            ),
            ConfigError::InvalidFormat { .. } | ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::ValidationFailed { reason } => format!("Invalid configuration: {}", reason),
        }
    }
}

/// Logs an error together with its code and the operator-facing message.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    context: &'static str,
}

impl ErrorReporter {
    /// `context` names what failed, e.g. "Monitoring cycle".
    pub fn new(context: &'static str) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    /// Text shown to the operator for `error`.
    pub fn summary(&self, error: &CoreError) -> String {
        format!(
            "{} failed [{}]: {}",
            self.context,
            error.error_code(),
            error.user_friendly_message()
        )
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        error!("{}", self.summary(error));
    }
}
