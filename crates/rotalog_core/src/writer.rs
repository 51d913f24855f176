//! The rotating writer.

use crate::clock::{Clock, SystemClock};
use crate::config::WriterConfig;
use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::record::LogRecord;
use crate::rotation::{RotationEngine, RotationState, SegmentRef};
use crate::store::{SegmentStore, StoreError};
use parking_lot::Mutex;
use rotalog_codec::Document;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one record.
#[derive(Debug)]
pub struct WriteReceipt {
    /// Id assigned to the record.
    pub record_id: RecordId,
    /// Segment the record was inserted into.
    pub segment: String,
    /// Measured size of the stored document.
    pub size: u64,
    /// Whether this record opened a new segment.
    pub rolled_over: bool,
    /// Segment evicted to make room, if any.
    pub evicted: Option<SegmentRef>,
    /// Set when the evicted segment could not be dropped. The record was
    /// still written; the segment is orphaned in the store.
    pub eviction_error: Option<StoreError>,
}

/// Persists records into size- and count-bounded segments.
///
/// A writer is bound to one tag. Opening it loads the tag's rotation state,
/// or creates one if the tag is new, so two writers opened on the same tag
/// resume the same segments.
///
/// Every [`write`](Self::write) reloads the state, asks the
/// [`RotationEngine`] where the record goes, and then, in this order:
/// 1. drops the evicted segment, if any (failure is reported, not fatal)
/// 2. replaces the state, guarded by its version
/// 3. inserts the record
///
/// If step 3 fails the state already accounts for a record that is not in
/// the store. That record is lost; the gap is reported as an error and not
/// repaired.
///
/// Writes through one writer are serialized. Separate writers on the same
/// tag are not coordinated: the loser of a race gets
/// [`CoreError::StateConflict`] and may retry.
pub struct RotatingWriter<S: SegmentStore> {
    store: S,
    config: WriterConfig,
    engine: RotationEngine,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl<S: SegmentStore> RotatingWriter<S> {
    /// Opens a writer using wall-clock time for segment names.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a bad configuration or for a
    /// store bound to a database other than `config.database_name`, or a
    /// store error if the state cannot be loaded or created.
    pub fn open(config: WriterConfig, store: S) -> CoreResult<Self> {
        Self::open_with_clock(config, store, Arc::new(SystemClock))
    }

    /// Opens a writer with an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_clock(
        config: WriterConfig,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        config.validate()?;
        if let Some(database) = store.database_name() {
            if database != config.database_name {
                return Err(CoreError::validation(
                    "database_name",
                    format!(
                        "store is bound to {database:?}, config names {:?}",
                        config.database_name
                    ),
                ));
            }
        }
        let engine = RotationEngine::new(config.base_segment_name.clone());

        let state = match store.load_state(&config.tag)? {
            Some(existing) => {
                warn_on_mismatch(&config, &existing);
                info!(
                    tag = %config.tag,
                    segment = %existing.current.name,
                    archived = existing.history.len(),
                    "resuming rotation state"
                );
                existing
            }
            None => {
                let initial = engine.initial_state(
                    &config.tag,
                    config.capacity_bytes,
                    config.max_segments,
                    clock.now_secs(),
                );
                match store.create_state(initial) {
                    Ok(created) => {
                        info!(
                            tag = %config.tag,
                            segment = %created.current.name,
                            capacity_bytes = created.capacity_bytes,
                            max_segments = created.max_segments,
                            "created rotation state"
                        );
                        created
                    }
                    // Another writer created it between our load and create.
                    Err(StoreError::AlreadyExists { .. }) => store
                        .load_state(&config.tag)?
                        .ok_or_else(|| CoreError::uninitialized(&config.tag))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };
        debug!(
            tag = %config.tag,
            identity = %state.identity,
            version = state.version,
            "writer opened"
        );

        Ok(Self {
            store,
            config,
            engine,
            clock,
            write_lock: Mutex::new(()),
        })
    }

    /// Writes formatted fields as a new record.
    ///
    /// # Errors
    ///
    /// See [`write_record`](Self::write_record).
    pub fn write(&self, fields: Document) -> CoreResult<WriteReceipt> {
        self.write_record(LogRecord::new(fields))
    }

    /// Writes a record.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Uninitialized`] if the tag's state is gone
    /// - [`CoreError::StateConflict`] if the state changed since it was loaded
    /// - [`CoreError::Store`] if loading, persisting or inserting fails
    pub fn write_record(&self, record: LogRecord) -> CoreResult<WriteReceipt> {
        let _guard = self.write_lock.lock();
        let tag = &self.config.tag;

        let state = self
            .store
            .load_state(tag)?
            .ok_or_else(|| CoreError::uninitialized(tag))?;
        let document = record.to_document();
        let size = self.store.measure_size(&document)?;
        let decision = self.engine.apply(&state, size, self.clock.now_secs());

        if decision.rolled_over {
            info!(
                tag = %tag,
                archived = %state.current.name,
                archived_size = state.current.size,
                segment = %decision.target,
                "rolled over to new segment"
            );
        }

        let mut eviction_error = None;
        if let Some(evicted) = &decision.evicted {
            match self.store.drop_segment(&evicted.name) {
                Ok(()) => info!(tag = %tag, segment = %evicted.name, "evicted oldest segment"),
                Err(e) => {
                    warn!(
                        tag = %tag,
                        segment = %evicted.name,
                        error = %e,
                        "failed to drop evicted segment; continuing with write"
                    );
                    eviction_error = Some(e);
                }
            }
        }

        self.store
            .replace_state(state.identity, state.version, &decision.state)
            .map_err(|e| match e {
                StoreError::Conflict { .. } => {
                    warn!(tag = %tag, version = state.version, "rotation state changed concurrently");
                    CoreError::state_conflict(tag, state.version)
                }
                StoreError::StateNotFound { .. } => CoreError::uninitialized(tag),
                other => CoreError::Store(other),
            })?;

        // The state now counts this record. A failed insert below loses it.
        self.store.insert(&decision.target, &document)?;

        Ok(WriteReceipt {
            record_id: record.id(),
            segment: decision.target,
            size,
            rolled_over: decision.rolled_over,
            evicted: decision.evicted,
            eviction_error,
        })
    }

    /// Loads the current rotation state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Uninitialized`] if the state is gone, or a store
    /// error if it cannot be read.
    pub fn state(&self) -> CoreResult<RotationState> {
        self.store
            .load_state(&self.config.tag)?
            .ok_or_else(|| CoreError::uninitialized(&self.config.tag))
    }

    /// The segment currently receiving writes.
    ///
    /// # Errors
    ///
    /// Same as [`state`](Self::state).
    pub fn current_segment(&self) -> CoreResult<SegmentRef> {
        Ok(self.state()?.current)
    }

    /// All live segment names, oldest first.
    ///
    /// # Errors
    ///
    /// Same as [`state`](Self::state).
    pub fn segment_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.state()?.segment_names())
    }

    /// The stream tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    /// The configuration this writer was opened with.
    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The clock stamping new segments.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl<S: SegmentStore> std::fmt::Debug for RotatingWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingWriter")
            .field("tag", &self.config.tag)
            .field("base_segment_name", &self.engine.base_name())
            .finish_non_exhaustive()
    }
}

/// Capacity and segment count are fixed when a state is created; a resumed
/// state keeps its own values.
fn warn_on_mismatch(config: &WriterConfig, existing: &RotationState) {
    if existing.capacity_bytes != config.capacity_bytes
        || existing.max_segments != config.max_segments
    {
        warn!(
            tag = %config.tag,
            stored_capacity_bytes = existing.capacity_bytes,
            configured_capacity_bytes = config.capacity_bytes,
            stored_max_segments = existing.max_segments,
            configured_max_segments = config.max_segments,
            "configured limits differ from stored state; keeping stored limits"
        );
    }
}
