//! Error types for the Dayloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each collaborator
//! contract has its own error type ([`ProviderError`], [`StoreError`]);
//! the top-level [`Error`] is the taxonomy callers see, and every variant
//! carries a fixed user-facing message.

use thiserror::Error;

/// The classified error returned by request-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No credential, or the credential was rejected. User-actionable.
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// The provider kept throttling after all retries.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 5xx-class or network failure that outlived all retries.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Malformed input; never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The complexity router failed. Absorbed by the router, never surfaced.
    #[error("Routing degraded: {0}")]
    RoutingDegraded(String),

    /// Neither the remote nor the local store could serve the operation.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The caller abandoned the operation.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The message shown to the user for this failure class.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::AuthRequired(_) => {
                "The assistant could not authenticate with the model provider. Check your API key."
            }
            Error::RateLimited(_) => {
                "The assistant is receiving too many requests right now. Please try again in a minute."
            }
            Error::ProviderUnavailable(_) => {
                "The model provider is temporarily unavailable. Please try again shortly."
            }
            Error::Cancelled => "The request was cancelled.",
            Error::PersistenceUnavailable(_) => {
                "Your conversation history could not be saved or loaded right now."
            }
            Error::InvalidRequest(_) | Error::RoutingDegraded(_) | Error::Config { .. } => {
                "Something went wrong while talking to the assistant."
            }
        }
    }

    /// Whether this error was produced by cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// --- Bounded context errors ---

/// Failures of the language-model provider contract.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether the provider reported a 5xx-class status.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ProviderError::ApiError { status_code, .. } if *status_code >= 500)
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::AuthenticationFailed(msg) => Error::AuthRequired(msg),
            ProviderError::NotConfigured(msg) => Error::AuthRequired(msg),
            ProviderError::RateLimited { retry_after_secs } => {
                Error::RateLimited(format!("retry after {retry_after_secs}s"))
            }
            ProviderError::Timeout(msg) | ProviderError::Network(msg) => {
                Error::ProviderUnavailable(msg)
            }
            ProviderError::ApiError {
                status_code,
                message,
            } if status_code >= 500 || status_code == 408 => {
                Error::ProviderUnavailable(format!("{status_code}: {message}"))
            }
            ProviderError::ApiError {
                status_code,
                message,
            } => Error::InvalidRequest(format!("{status_code}: {message}")),
            ProviderError::InvalidRequest(msg) => Error::InvalidRequest(msg),
            ProviderError::ModelNotFound(model) => {
                Error::InvalidRequest(format!("model not found: {model}"))
            }
            ProviderError::Cancelled => Error::Cancelled,
        }
    }
}

/// Failures of the key-value persistence contract.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Store unreachable: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt value at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::PersistenceUnavailable(err.to_string())
    }
}
