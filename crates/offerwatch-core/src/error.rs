use thiserror::Error;

use crate::command::CommandError;

/// Application-wide error types for offerwatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (non-success status, unreadable body, bad URL).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Fetched content could not be parsed as markup, or a selector is invalid.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Notification or reply could not be delivered.
    #[error("Delivery error (HTTP {status_code}): {message}")]
    DeliveryError { message: String, status_code: u16 },

    /// Malformed command input.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Observed-state snapshot could not be read or written.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if this error came from fetching a source.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_) | AppError::Timeout(_) | AppError::NetworkError(_)
        )
    }

    /// Short machine-friendly label, used in logs and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::HttpError(_) | AppError::Timeout(_) | AppError::NetworkError(_) => "fetch",
            AppError::ParseError(_) => "parse",
            AppError::DeliveryError { .. } => "delivery",
            AppError::Command(_) => "command",
            AppError::StorageError(_) => "storage",
            AppError::SerializationError(_) => "serialization",
            AppError::ConfigError(_) => "config",
        }
    }
}
