//! Error types for Rotalog core.

use crate::store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by writers and configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A write was attempted but no rotation state exists for the tag.
    ///
    /// Writers create the state when they open, so this means the state was
    /// removed out from under a live writer.
    #[error("rotation state for tag {tag:?} is not initialized")]
    Uninitialized {
        /// The stream tag.
        tag: String,
    },

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {field}: {message}")]
    Validation {
        /// The offending configuration field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The rotation state changed between load and replace.
    ///
    /// The write was aborted before the record was inserted. Retrying the
    /// whole write reloads the state.
    #[error("rotation state for tag {tag:?} changed concurrently (expected version {expected})")]
    StateConflict {
        /// The stream tag.
        tag: String,
        /// Version the aborted write was based on.
        expected: u64,
    },

    /// Underlying store failure, encoding failures
    /// ([`StoreError::Codec`]) included.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Creates an uninitialized-state error.
    pub fn uninitialized(tag: impl Into<String>) -> Self {
        Self::Uninitialized { tag: tag.into() }
    }

    /// Creates a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Creates a state conflict error.
    pub fn state_conflict(tag: impl Into<String>, expected: u64) -> Self {
        Self::StateConflict {
            tag: tag.into(),
            expected,
        }
    }

    /// Whether retrying the whole operation can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }
}
