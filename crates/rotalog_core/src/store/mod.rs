//! Store capability consumed by the writer.
//!
//! A store keeps two kinds of things: named segments of log documents, and
//! one rotation state document per tag in a metadata collection kept apart
//! from the segments. Stores apply no rotation policy of their own.
//!
//! ## Available Stores
//!
//! - [`MemorySegmentStore`] - For testing and ephemeral logging
//! - [`FileSegmentStore`] - One directory per database, one file per segment

mod error;
mod file;
mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileSegmentStore;
pub use memory::MemorySegmentStore;

use crate::id::StateId;
use crate::rotation::RotationState;
use rotalog_codec::Document;
use std::sync::Arc;

/// Storage for segments and rotation metadata.
///
/// # Invariants
///
/// - `measure_size` uses the encoding `insert` stores, so the engine's byte
///   accounting matches what lands in a segment
/// - `create_state` never produces a second state for a tag
/// - `replace_state` only succeeds when `expected_version` is the stored
///   version, and bumps it by one
/// - Implementations must be `Send + Sync`; writers may share a store
pub trait SegmentStore: Send + Sync {
    /// Appends a document to `segment`, creating the segment if needed.
    ///
    /// No size or count checks happen here.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    fn insert(&self, segment: &str, document: &Document) -> StoreResult<()>;

    /// Deletes `segment` and everything in it. Dropping a segment that does
    /// not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment exists but cannot be removed.
    fn drop_segment(&self, segment: &str) -> StoreResult<()>;

    /// Serialized size of `document` in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded.
    fn measure_size(&self, document: &Document) -> StoreResult<u64> {
        Ok(rotalog_codec::encoded_len(document)?)
    }

    /// Loads the state for `tag`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata collection cannot be read.
    fn load_state(&self, tag: &str) -> StoreResult<Option<RotationState>>;

    /// Persists a new state and returns it with its assigned identity and
    /// version 0.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the tag already has a state.
    fn create_state(&self, initial: RotationState) -> StoreResult<RotationState>;

    /// Replaces the state `identity` wholesale. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the stored version is not
    /// `expected_version`, or [`StoreError::StateNotFound`] if `identity`
    /// does not exist.
    fn replace_state(
        &self,
        identity: StateId,
        expected_version: u64,
        state: &RotationState,
    ) -> StoreResult<u64>;

    /// The database this store is bound to, if it is bound to one.
    ///
    /// A writer refuses a store whose database differs from its configured
    /// `database_name`. Stores without a notion of database return `None`.
    fn database_name(&self) -> Option<&str> {
        None
    }
}

impl<S: SegmentStore + ?Sized> SegmentStore for Arc<S> {
    fn insert(&self, segment: &str, document: &Document) -> StoreResult<()> {
        (**self).insert(segment, document)
    }

    fn drop_segment(&self, segment: &str) -> StoreResult<()> {
        (**self).drop_segment(segment)
    }

    fn measure_size(&self, document: &Document) -> StoreResult<u64> {
        (**self).measure_size(document)
    }

    fn load_state(&self, tag: &str) -> StoreResult<Option<RotationState>> {
        (**self).load_state(tag)
    }

    fn create_state(&self, initial: RotationState) -> StoreResult<RotationState> {
        (**self).create_state(initial)
    }

    fn replace_state(
        &self,
        identity: StateId,
        expected_version: u64,
        state: &RotationState,
    ) -> StoreResult<u64> {
        (**self).replace_state(identity, expected_version, state)
    }

    fn database_name(&self) -> Option<&str> {
        (**self).database_name()
    }
}
