//! # Rotalog Core
//!
//! Size- and count-bounded rotating log persistence.
//!
//! Records are written into named segments. When a record would push the
//! current segment past its byte capacity, the segment is archived and a new
//! one opened; once the retention budget is spent, the oldest archived
//! segment is dropped. The bookkeeping lives in a [`RotationState`] document
//! kept next to the segments, so a writer can resume where a previous one
//! stopped.
//!
//! ## Layers
//!
//! - [`RotationEngine`] - pure rollover and eviction decisions
//! - [`SegmentStore`] - where segments and state live
//! - [`RotatingWriter`] - ties the two together, one record at a time
//! - [`RotatingLayer`] - feeds `tracing` events into a writer
//!
//! ## Example
//!
//! ```rust
//! use rotalog_core::{MemorySegmentStore, RotatingWriter, WriterConfig};
//! use rotalog_codec::{Document, FieldValue};
//!
//! let config = WriterConfig::new().capacity_bytes(64 * 1024).max_segments(4);
//! let writer = RotatingWriter::open(config, MemorySegmentStore::new()).unwrap();
//!
//! let mut fields = Document::new();
//! fields.insert("message".into(), FieldValue::from("service started"));
//! let receipt = writer.write(fields).unwrap();
//! assert!(!receipt.rolled_over);
//! assert_eq!(writer.segment_names().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod id;
mod layer;
mod record;
mod rotation;
mod store;
mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Credentials, WriterConfig, CAPACITY_CEILING, MAX_SEGMENTS_CEILING};
pub use error::{CoreError, CoreResult};
pub use id::{RecordId, StateId};
pub use layer::RotatingLayer;
pub use record::{LogRecord, RECORD_ID_FIELD};
pub use rotation::{Decision, RotationEngine, RotationState, SegmentRef};
pub use store::{FileSegmentStore, MemorySegmentStore, SegmentStore, StoreError, StoreResult};
pub use writer::{RotatingWriter, WriteReceipt};

pub use rotalog_codec::{Document, FieldValue};
