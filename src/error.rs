//! Error types for the content-generation pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pipeline-level errors
///
/// Cancellation is represented as an error variant so that it flows through
/// the same per-item channels as failures, but it is not reported as one:
/// callers check [`ApiError::is_cancellation`] before surfacing a notification.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Prompt template not found: {0}")]
    TemplateNotFound(String),

    #[error("Task result not found: {0}")]
    ResultNotFound(Uuid),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Failed to parse provider response: {0}")]
    ParseError(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    /// User-initiated aborts are not failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Configuration errors are surfaced before any network call is made.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ApiError::ConfigError(_) | ApiError::TemplateNotFound(_)
        )
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
