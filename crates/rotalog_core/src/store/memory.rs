//! In-memory store for testing.

use super::error::{StoreError, StoreResult};
use super::SegmentStore;
use crate::id::StateId;
use crate::rotation::RotationState;
use parking_lot::RwLock;
use rotalog_codec::{from_cbor, to_cbor, Document};
use std::collections::BTreeMap;

/// A store that keeps everything in memory.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral log streams that don't need persistence
///
/// Documents are kept in their encoded form, so byte counts reported by
/// [`segment_bytes`](Self::segment_bytes) are what a persistent store would
/// hold.
///
/// # Example
///
/// ```rust
/// use rotalog_core::{MemorySegmentStore, SegmentStore};
/// use rotalog_codec::{Document, FieldValue};
///
/// let store = MemorySegmentStore::new();
/// let mut doc = Document::new();
/// doc.insert("message".into(), FieldValue::from("hi"));
/// store.insert("logs_1", &doc).unwrap();
/// assert_eq!(store.document_count("logs_1"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    segments: RwLock<BTreeMap<String, Vec<Vec<u8>>>>,
    states: RwLock<BTreeMap<StateId, RotationState>>,
}

impl MemorySegmentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of segments that currently exist, sorted.
    #[must_use]
    pub fn segment_names(&self) -> Vec<String> {
        self.segments.read().keys().cloned().collect()
    }

    /// Whether `segment` exists.
    #[must_use]
    pub fn contains_segment(&self, segment: &str) -> bool {
        self.segments.read().contains_key(segment)
    }

    /// Number of documents in `segment` (0 if absent).
    #[must_use]
    pub fn document_count(&self, segment: &str) -> usize {
        self.segments.read().get(segment).map_or(0, Vec::len)
    }

    /// Encoded bytes held in `segment` (0 if absent).
    #[must_use]
    pub fn segment_bytes(&self, segment: &str) -> u64 {
        self.segments
            .read()
            .get(segment)
            .map_or(0, |docs| docs.iter().map(|d| d.len() as u64).sum())
    }

    /// Decodes every document in `segment`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored document fails to decode.
    pub fn documents(&self, segment: &str) -> StoreResult<Vec<Document>> {
        let segments = self.segments.read();
        let Some(docs) = segments.get(segment) else {
            return Ok(Vec::new());
        };
        docs.iter()
            .map(|bytes| from_cbor(bytes).map_err(StoreError::from))
            .collect()
    }

    /// Removes the state with `identity`, as an operator might.
    pub fn remove_state(&self, identity: StateId) -> Option<RotationState> {
        self.states.write().remove(&identity)
    }
}

impl SegmentStore for MemorySegmentStore {
    fn insert(&self, segment: &str, document: &Document) -> StoreResult<()> {
        let bytes = to_cbor(document)?;
        self.segments
            .write()
            .entry(segment.to_string())
            .or_default()
            .push(bytes);
        Ok(())
    }

    fn drop_segment(&self, segment: &str) -> StoreResult<()> {
        self.segments.write().remove(segment);
        Ok(())
    }

    fn load_state(&self, tag: &str) -> StoreResult<Option<RotationState>> {
        Ok(self
            .states
            .read()
            .values()
            .find(|s| s.tag == tag)
            .cloned())
    }

    fn create_state(&self, mut initial: RotationState) -> StoreResult<RotationState> {
        let mut states = self.states.write();
        if states.values().any(|s| s.tag == initial.tag) {
            return Err(StoreError::AlreadyExists { tag: initial.tag });
        }
        initial.identity = StateId::generate();
        initial.version = 0;
        states.insert(initial.identity, initial.clone());
        Ok(initial)
    }

    fn replace_state(
        &self,
        identity: StateId,
        expected_version: u64,
        state: &RotationState,
    ) -> StoreResult<u64> {
        let mut states = self.states.write();
        let stored = states
            .get_mut(&identity)
            .ok_or(StoreError::StateNotFound { identity })?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                identity,
                expected: expected_version,
                actual: stored.version,
            });
        }
        let mut next = state.clone();
        next.identity = identity;
        next.version = expected_version + 1;
        *stored = next;
        Ok(expected_version + 1)
    }
}
