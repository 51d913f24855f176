//! Fault injection for store-failure tests.
//!
//! [`FaultyStore`] wraps any [`SegmentStore`] and fails selected calls on
//! demand. Each fault is armed for one call and disarms itself once it
//! fires.

use rotalog_codec::Document;
use rotalog_core::{RotationState, SegmentStore, StateId, StoreError, StoreResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A store wrapper that injects failures.
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    fail_insert: AtomicBool,
    fail_drop: AtomicBool,
    fail_replace: AtomicBool,
    race_load: AtomicBool,
    injected: AtomicU64,
}

impl<S: SegmentStore> FaultyStore<S> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_insert: AtomicBool::new(false),
            fail_drop: AtomicBool::new(false),
            fail_replace: AtomicBool::new(false),
            race_load: AtomicBool::new(false),
            injected: AtomicU64::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Makes the next `insert` fail with an I/O error.
    pub fn fail_next_insert(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    /// Makes the next `drop_segment` fail with an I/O error.
    pub fn fail_next_drop(&self) {
        self.fail_drop.store(true, Ordering::SeqCst);
    }

    /// Makes the next `replace_state` fail with an I/O error.
    pub fn fail_next_replace(&self) {
        self.fail_replace.store(true, Ordering::SeqCst);
    }

    /// Makes the next `load_state` return a state that another writer
    /// replaces right after it was read, so the caller's view is stale.
    pub fn race_next_load(&self) {
        self.race_load.store(true, Ordering::SeqCst);
    }

    /// Number of faults that have fired.
    pub fn injected_count(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    fn fire(&self, flag: &AtomicBool, operation: &str) -> StoreResult<()> {
        if flag.swap(false, Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Io(io::Error::other(format!(
                "injected {operation} failure"
            ))));
        }
        Ok(())
    }
}

impl<S: SegmentStore> SegmentStore for FaultyStore<S> {
    fn insert(&self, segment: &str, document: &Document) -> StoreResult<()> {
        self.fire(&self.fail_insert, "insert")?;
        self.inner.insert(segment, document)
    }

    fn drop_segment(&self, segment: &str) -> StoreResult<()> {
        self.fire(&self.fail_drop, "drop")?;
        self.inner.drop_segment(segment)
    }

    fn measure_size(&self, document: &Document) -> StoreResult<u64> {
        self.inner.measure_size(document)
    }

    fn load_state(&self, tag: &str) -> StoreResult<Option<RotationState>> {
        let loaded = self.inner.load_state(tag)?;
        if let Some(state) = &loaded {
            if self.race_load.swap(false, Ordering::SeqCst) {
                self.injected.fetch_add(1, Ordering::SeqCst);
                self.inner
                    .replace_state(state.identity, state.version, state)?;
            }
        }
        Ok(loaded)
    }

    fn create_state(&self, initial: RotationState) -> StoreResult<RotationState> {
        self.inner.create_state(initial)
    }

    fn replace_state(
        &self,
        identity: StateId,
        expected_version: u64,
        state: &RotationState,
    ) -> StoreResult<u64> {
        self.fire(&self.fail_replace, "replace")?;
        self.inner.replace_state(identity, expected_version, state)
    }

    fn database_name(&self) -> Option<&str> {
        self.inner.database_name()
    }
}
