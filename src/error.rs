//! Error types for vitalstore.
//!
//! All errors are strongly typed using thiserror. Storage failures live in
//! [`StorageError`](crate::storage::StorageError); input checks live in
//! [`ValidationError`]; [`VitalsError`] wraps both for operations that span
//! layers (the simulation cycle, read-modify-write updates).

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Vitals timestamp {next} precedes the latest recorded sample at {previous}")]
    NonMonotonicTimestamp {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("Document id cannot be empty")]
    EmptyDocumentId,

    #[error("Field '{field}' must be a finite number")]
    NonFiniteValue {
        field: String,
    },

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

/// Top-level error type for vitalstore.
#[derive(Debug, Error)]
pub enum VitalsError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl VitalsError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the operation addressed a document that does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound(_)))
    }

    /// Returns true if this error may clear up on retry.
    ///
    /// Nothing inside the crate retries; this is a hint for callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(StorageError::PersistenceUnavailable(_)))
    }
}

/// Result type alias for vitalstore operations.
pub type VitalsResult<T> = Result<T, VitalsError>;
