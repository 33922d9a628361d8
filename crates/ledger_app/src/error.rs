//! Application error handling

use serde::Serialize;
use thiserror::Error;

use domain_ledger::{ErrorKind, FieldError, LedgerError};
use infra_db::DatabaseError;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl AppError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AppError::InvalidArgument(message.into())
    }

    /// HTTP-equivalent status for the failure
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Ledger(err) => err.status_code(),
            AppError::InvalidArgument(_) => 400,
            AppError::Config(_) | AppError::Database(_) | AppError::Serialization(_) => 500,
        }
    }

    pub fn response(&self) -> ErrorResponse {
        match self {
            AppError::Ledger(err) => ErrorResponse::from(err),
            AppError::InvalidArgument(msg) => ErrorResponse {
                error: "invalid_argument".to_string(),
                message: msg.clone(),
                details: Vec::new(),
            },
            AppError::Config(_) => ErrorResponse {
                error: "config_error".to_string(),
                message: self.to_string(),
                details: Vec::new(),
            },
            AppError::Database(_) | AppError::Serialization(_) => ErrorResponse {
                error: ErrorKind::StorageError.to_string(),
                message: self.to_string(),
                details: Vec::new(),
            },
        }
    }
}

impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        ErrorResponse {
            error: err.kind().to_string(),
            message: err.to_string(),
            details: err.field_errors().to_vec(),
        }
    }
}
