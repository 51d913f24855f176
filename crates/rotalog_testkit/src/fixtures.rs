//! Test fixtures and writer helpers.
//!
//! Provides writers on a manual clock, temporary file stores, and
//! documents whose stored size is known in advance.

use rotalog_codec::{encoded_len, Document, FieldValue};
use rotalog_core::{
    FileSegmentStore, LogRecord, ManualClock, MemorySegmentStore, RotatingWriter, RotationState,
    WriterConfig,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Fixed start time for manual clocks (2023-11-14T22:13:20Z).
pub const T0: u64 = 1_700_000_000;

/// Field used to pad documents to a target size.
pub const PAD_FIELD: &str = "pad";

/// A valid configuration with the given limits and tag `test`.
pub fn small_config(capacity_bytes: u64, max_segments: u32) -> WriterConfig {
    WriterConfig::new()
        .capacity_bytes(capacity_bytes)
        .max_segments(max_segments)
        .tag("test")
}

/// Fields whose stored record, `_id` included, encodes to exactly `target`
/// bytes.
///
/// # Panics
///
/// Panics if no padding length produces `target`. Sizes below 48 bytes are
/// never reachable, and a size is skipped wherever the CBOR length header
/// of the padding grows (72 and 305).
pub fn padded_fields(target: u64) -> Document {
    try_padded_fields(target)
        .unwrap_or_else(|| panic!("no padding yields a {target}-byte record"))
}

/// Like [`padded_fields`], returning `None` for unreachable sizes.
pub fn try_padded_fields(target: u64) -> Option<Document> {
    let mut pad = 0usize;
    loop {
        let mut fields = Document::new();
        fields.insert(PAD_FIELD.to_string(), FieldValue::Text("x".repeat(pad)));
        let size = encoded_len(&LogRecord::new(fields.clone()).to_document()).ok()?;
        if size == target {
            return Some(fields);
        }
        if size > target {
            return None;
        }
        pad += 1;
    }
}

/// Asserts that the store holds exactly the segments the state says were
/// written to.
///
/// Segments recorded with size 0 were never inserted into, so they are not
/// expected to exist.
///
/// # Panics
///
/// Panics with both lists if they differ.
pub fn assert_store_matches_state(state: &RotationState, mut stored: Vec<String>) {
    let mut expected: Vec<String> = state
        .history
        .iter()
        .chain(std::iter::once(&state.current))
        .filter(|s| s.size > 0)
        .map(|s| s.name.clone())
        .collect();
    expected.sort();
    stored.sort();
    assert_eq!(
        stored, expected,
        "store segments differ from rotation state {state:?}"
    );
}

/// A writer on an in-memory store and a manual clock.
pub struct MemoryHarness {
    /// The shared store.
    pub store: Arc<MemorySegmentStore>,
    /// The clock used for segment names.
    pub clock: Arc<ManualClock>,
    /// The writer under test.
    pub writer: RotatingWriter<Arc<MemorySegmentStore>>,
}

impl MemoryHarness {
    /// Opens a writer with `config` on a fresh store, clock at [`T0`].
    pub fn new(config: WriterConfig) -> Self {
        let store = Arc::new(MemorySegmentStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let writer = RotatingWriter::open_with_clock(config, store.clone(), clock.clone())
            .expect("Failed to open writer");
        Self {
            store,
            clock,
            writer,
        }
    }

    /// Opens a second writer on the same store and clock.
    pub fn reopen(&self, config: WriterConfig) -> RotatingWriter<Arc<MemorySegmentStore>> {
        RotatingWriter::open_with_clock(config, self.store.clone(), self.clock.clone())
            .expect("Failed to reopen writer")
    }

    /// Writes `count` records of exactly `size` bytes, advancing the clock
    /// one second before each.
    pub fn write_sized(&self, count: usize, size: u64) {
        for _ in 0..count {
            self.clock.advance(1);
            self.writer
                .write(padded_fields(size))
                .expect("Failed to write record");
        }
    }

    /// Asserts the store agrees with the writer's state.
    pub fn assert_consistent(&self) {
        let state = self.writer.state().expect("Failed to load state");
        state.check_invariants().expect("Slot bookkeeping is broken");
        assert_store_matches_state(&state, self.store.segment_names());
    }
}

/// A file store in a temporary directory that is removed on drop.
pub struct TempFileStore {
    /// The store instance.
    pub store: Arc<FileSegmentStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TempFileStore {
    /// Database name used under the temporary root.
    pub const DATABASE: &'static str = "rotalog";

    /// Creates a store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileSegmentStore::open(temp_dir.path(), Self::DATABASE)
            .expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }

    /// The temporary root directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens a new store instance on the same directory, as a restarted
    /// process would.
    pub fn reopen(&self) -> Arc<FileSegmentStore> {
        Arc::new(
            FileSegmentStore::open(self.root(), Self::DATABASE)
                .expect("Failed to reopen file store"),
        )
    }
}

impl Default for TempFileStore {
    fn default() -> Self {
        Self::new()
    }
}
