//! Persisted rotation metadata.

use crate::id::StateId;
use serde::{Deserialize, Serialize};

/// One physical segment and its last recorded size.
///
/// `size` is bookkeeping kept by the engine, not a live query of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    /// Segment name, `<base>_<stamp>`.
    pub name: String,
    /// Occupied bytes as of the last write.
    pub size: u64,
}

impl SegmentRef {
    /// Creates a segment reference.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Builds `<base>_<stamp>`.
    #[must_use]
    pub fn name_for(base: &str, stamp: u64) -> String {
        format!("{base}_{stamp}")
    }

    /// The integer stamp after the last `_`, if the name has one.
    #[must_use]
    pub fn stamp(&self) -> Option<u64> {
        self.name
            .rsplit_once('_')
            .and_then(|(_, stamp)| stamp.parse().ok())
    }
}

/// The metadata document for one stream.
///
/// Invariants after every engine transition:
/// - `history.len() <= max_segments - 1`
/// - `remaining_slots + history.len() == max_segments - 1`
/// - `history` is in creation order, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// Identity assigned by the store when the state was created.
    pub identity: StateId,
    /// Bumped by the store on every successful replace.
    pub version: u64,
    /// Stream tag; one state per tag.
    pub tag: String,
    /// Maximum bytes per segment. Fixed at creation.
    pub capacity_bytes: u64,
    /// Maximum segments, current included. Fixed at creation.
    pub max_segments: u32,
    /// Archived segments that may still be added before eviction.
    pub remaining_slots: u32,
    /// Archived segments, oldest first.
    pub history: Vec<SegmentRef>,
    /// Segment receiving writes.
    pub current: SegmentRef,
}

impl RotationState {
    /// A fresh, not yet persisted state: empty history, empty current segment.
    ///
    /// `max_segments` must be at least 1; configuration validation enforces it.
    #[must_use]
    pub fn initial(
        tag: impl Into<String>,
        capacity_bytes: u64,
        max_segments: u32,
        current: SegmentRef,
    ) -> Self {
        Self {
            identity: StateId::UNASSIGNED,
            version: 0,
            tag: tag.into(),
            capacity_bytes,
            max_segments,
            remaining_slots: max_segments.saturating_sub(1),
            history: Vec::new(),
            current,
        }
    }

    /// Names of all live segments, oldest first, current last.
    #[must_use]
    pub fn segment_names(&self) -> Vec<String> {
        self.history
            .iter()
            .chain(std::iter::once(&self.current))
            .map(|s| s.name.clone())
            .collect()
    }

    /// Bytes recorded across all live segments.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.history.iter().map(|s| s.size).sum::<u64>() + self.current.size
    }

    /// Checks the slot bookkeeping. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let budget = u64::from(self.max_segments.saturating_sub(1));
        let history = self.history.len() as u64;
        if history > budget {
            return Err(format!(
                "history holds {history} segments, limit is {budget}"
            ));
        }
        if u64::from(self.remaining_slots) + history != budget {
            return Err(format!(
                "remaining_slots {} + history {history} != {budget}",
                self.remaining_slots
            ));
        }
        Ok(())
    }
}
