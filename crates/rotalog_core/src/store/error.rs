//! Error types for store operations.

use crate::id::StateId;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`SegmentStore`](super::SegmentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] rotalog_codec::CodecError),

    /// A replace was based on a stale version.
    #[error("state {identity} is at version {actual}, replace expected {expected}")]
    Conflict {
        /// The state being replaced.
        identity: StateId,
        /// Version the caller loaded.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A state for this tag already exists.
    #[error("rotation state for tag {tag:?} already exists")]
    AlreadyExists {
        /// The duplicated tag.
        tag: String,
    },

    /// No state has this identity.
    #[error("rotation state {identity} not found")]
    StateNotFound {
        /// The identity that was looked up.
        identity: StateId,
    },

    /// Stored data is unreadable.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
