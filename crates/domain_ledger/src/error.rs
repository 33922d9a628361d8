//! Ledger domain errors
//!
//! Every failure carries a machine-readable [`ErrorKind`] and a human
//! description. Validation failures additionally carry one [`FieldError`]
//! per offending input field, addressed by path (`lines[2].debit`).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use core_kernel::{MoneyError, PortError};

/// A single offending input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path to the field, e.g. `lines[2].debit`
    pub path: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    InvalidState,
    AccountError,
    ConcurrencyConflict,
    StorageError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::AccountError => "account_error",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::StorageError => "storage_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input, unbalanced entry, or bad date
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    /// Entry or account absent
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Illegal state transition (double post, reversing a draft, reversing twice)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Posting to a header, inactive, or unknown account; or an illegal
    /// chart-of-accounts change
    #[error("Account constraint violated: {0}")]
    AccountConstraint(String),

    /// A concurrent writer changed the data this operation depended on
    #[error("Concurrent modification: {0}")]
    Concurrency(String),

    /// The storage backend failed
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        retryable: bool,
    },
}

impl LedgerError {
    /// Creates a validation error for a single field
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        let error = FieldError::new(path, message);
        LedgerError::Validation {
            message: error.to_string(),
            errors: vec![error],
        }
    }

    /// Creates a validation error from collected field errors
    pub fn validation(errors: Vec<FieldError>) -> Self {
        let message = match errors.as_slice() {
            [] => "invalid input".to_string(),
            [only] => only.to_string(),
            [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        };
        LedgerError::Validation { message, errors }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        LedgerError::InvalidState(message.into())
    }

    pub fn account(message: impl Into<String>) -> Self {
        LedgerError::AccountConstraint(message.into())
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        LedgerError::Concurrency(message.into())
    }

    /// Returns the machine-readable kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::ValidationError,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::InvalidState(_) => ErrorKind::InvalidState,
            LedgerError::AccountConstraint(_) => ErrorKind::AccountError,
            LedgerError::Concurrency(_) => ErrorKind::ConcurrencyConflict,
            LedgerError::Storage { .. } => ErrorKind::StorageError,
        }
    }

    /// Returns true if the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Concurrency(_) => true,
            LedgerError::Storage { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// HTTP-equivalent status code for surfacing the error
    pub fn status_code(&self) -> u16 {
        match self {
            LedgerError::Validation { .. } => 400,
            LedgerError::AccountConstraint(_) => 400,
            LedgerError::InvalidState(_) => 400,
            LedgerError::NotFound { .. } => 404,
            LedgerError::Concurrency(_) => 409,
            LedgerError::Storage { retryable: true, .. } => 503,
            LedgerError::Storage { .. } => 500,
        }
    }

    /// Field-level detail, empty for non-validation errors
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            LedgerError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Translates a port failure, naming the entity a NotFound refers to
    pub fn from_port(entity: &'static str) -> impl Fn(PortError) -> LedgerError {
        move |error| match error {
            PortError::NotFound { id, .. } => LedgerError::NotFound { entity, id },
            other => LedgerError::from(other),
        }
    }
}

impl From<PortError> for LedgerError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => LedgerError::NotFound {
                entity: entity_name(&entity_type),
                id,
            },
            PortError::Validation { message, field } => {
                LedgerError::field(field.unwrap_or_else(|| "input".to_string()), message)
            }
            PortError::Conflict { message } => LedgerError::Concurrency(message),
            error @ (PortError::Connection { .. } | PortError::Timeout { .. }) => {
                LedgerError::Storage {
                    message: error.to_string(),
                    retryable: true,
                }
            }
            error @ PortError::Internal { .. } => LedgerError::Storage {
                message: error.to_string(),
                retryable: false,
            },
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(error: MoneyError) -> Self {
        LedgerError::field("amount", error.to_string())
    }
}

fn entity_name(entity_type: &str) -> &'static str {
    match entity_type {
        "Account" => "Account",
        "JournalEntry" => "JournalEntry",
        _ => "Record",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status() {
        let err = LedgerError::field("lines[2].debit", "must be non-negative");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.field_errors()[0].path, "lines[2].debit");
        assert!(err.to_string().contains("lines[2].debit: must be non-negative"));

        let err = LedgerError::not_found("JournalEntry", "JNL-1");
        assert_eq!(err.status_code(), 404);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_maps_to_retryable_concurrency() {
        let err: LedgerError = PortError::conflict("version changed").into();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_connection_failure_is_retryable_storage() {
        let err: LedgerError = PortError::connection("reset by peer").into();
        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_message_summarises_multiple_fields() {
        let err = LedgerError::validation(vec![
            FieldError::new("lines", "at least 2 lines are required"),
            FieldError::new("description", "must not be empty"),
        ]);
        assert!(err.to_string().contains("(and 1 more)"));
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AccountError).unwrap();
        assert_eq!(json, "\"account_error\"");
    }
}
