use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Forum API error: {0}")]
    ForumApi(#[from] ForumApiError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum ForumApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Flood control active: {message}")]
    FloodControl { message: String },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Request failed with status {status_code}: {body}")]
    RequestFailed { status_code: u16, body: String },
}

#[derive(Error, Debug, Clone)]
pub enum MessagingError {
    #[error("Flood wait of {seconds} seconds required")]
    FloodWait { seconds: u64 },

    #[error("Paid reactions are not supported by this client")]
    PaidReactionsUnsupported,

    #[error("No messages found in @{channel}")]
    NoMessages { channel: String },

    #[error("Session not found at {path}")]
    SessionMissing { path: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Remote call failed ({code}): {description}")]
    Rpc { code: i64, description: String },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to persist ledger to {path}: {reason}")]
    PersistFailed { path: String, reason: String },

    #[error("Ledger file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
