//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream {provider} responded with status {status}")]
    Upstream { provider: String, status: u16 },

    #[error("Upstream {provider} rate limited, retry after {retry_after_ms}ms")]
    RateLimited { provider: String, retry_after_ms: u64 },

    #[error("Upstream {provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for "entity absent" conditions, including an empty query result.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::Database(rusqlite::Error::QueryReturnedNoRows)
        )
    }

    /// True when the failure came from a third-party provider.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Http(_)
                | AppError::Upstream { .. }
                | AppError::RateLimited { .. }
                | AppError::Unavailable { .. }
        )
    }
}

/// Serializable error response for the JSON API
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Unavailable { .. } => "UPSTREAM_UNAVAILABLE",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Queue(_) => "QUEUE_ERROR",
            AppError::Session(_) => "SESSION_ERROR",
            AppError::Encryption(_) => "ENCRYPTION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Invariant(_) => "INVARIANT_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_covers_empty_query() {
        assert!(AppError::Database(rusqlite::Error::QueryReturnedNoRows).is_not_found());
        assert!(AppError::NotFound("ticker AAPL".to_string()).is_not_found());
        assert!(!AppError::Internal("boom".to_string()).is_not_found());
    }

    #[test]
    fn test_error_response_code() {
        let response = ErrorResponse::from(AppError::Upstream {
            provider: "yhfinance".to_string(),
            status: 500,
        });
        assert_eq!(response.code, "UPSTREAM_ERROR");
        assert!(response.message.contains("500"));
    }
}
