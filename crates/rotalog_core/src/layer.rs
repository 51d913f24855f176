//! A `tracing` layer that persists events through a [`RotatingWriter`].

use crate::store::SegmentStore;
use crate::writer::RotatingWriter;
use rotalog_codec::{Document, FieldValue};
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Targets under this prefix are the writer's own diagnostics.
const OWN_TARGET_PREFIX: &str = "rotalog";

thread_local! {
    static IN_WRITE: Cell<bool> = const { Cell::new(false) };
}

/// Forwards every `tracing` event to a [`RotatingWriter`].
///
/// Each event becomes one record with `level`, `target`, `timestamp`
/// (Unix milliseconds from the writer's clock) and the event's own fields;
/// the message is stored under `message`.
///
/// Events from rotalog's own crates are skipped, as is anything emitted
/// while this layer is already writing on the same thread.
///
/// A layer has nowhere to return errors to, so failed writes are only
/// counted; see [`failed_writes`](Self::failed_writes). Clones share the
/// writer and the counter.
///
/// # Example
///
/// ```rust
/// use rotalog_core::{MemorySegmentStore, RotatingLayer, RotatingWriter, WriterConfig};
/// use std::sync::Arc;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let writer = RotatingWriter::open(WriterConfig::new(), MemorySegmentStore::new()).unwrap();
/// let layer = RotatingLayer::new(Arc::new(writer));
/// let subscriber = tracing_subscriber::registry().with(layer);
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(user = "ada", "signed in");
/// });
/// ```
pub struct RotatingLayer<S: SegmentStore> {
    writer: Arc<RotatingWriter<S>>,
    failed: Arc<AtomicU64>,
}

impl<S: SegmentStore> Clone for RotatingLayer<S> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            failed: Arc::clone(&self.failed),
        }
    }
}

impl<S: SegmentStore> RotatingLayer<S> {
    /// Creates a layer writing through `writer`.
    pub fn new(writer: Arc<RotatingWriter<S>>) -> Self {
        Self {
            writer,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The writer events go to.
    #[must_use]
    pub fn writer(&self) -> &Arc<RotatingWriter<S>> {
        &self.writer
    }

    /// Events that could not be written.
    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn to_document(&self, event: &Event<'_>) -> Document {
        let meta = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut doc = visitor.fields;
        doc.insert("level".into(), FieldValue::from(meta.level().as_str()));
        doc.insert("target".into(), FieldValue::from(meta.target()));
        let millis = self.writer.clock().now_millis();
        doc.insert(
            "timestamp".into(),
            FieldValue::Integer(i64::try_from(millis).unwrap_or(i64::MAX)),
        );
        doc
    }
}

impl<S, Sub> Layer<Sub> for RotatingLayer<S>
where
    S: SegmentStore + 'static,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        if event.metadata().target().starts_with(OWN_TARGET_PREFIX) {
            return;
        }
        if IN_WRITE.with(|flag| flag.replace(true)) {
            return;
        }

        let result = self.writer.write(self.to_document(event));
        IN_WRITE.with(|flag| flag.set(false));

        if result.is_err() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<S: SegmentStore> fmt::Debug for RotatingLayer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingLayer")
            .field("writer", &self.writer)
            .field("failed", &self.failed_writes())
            .finish()
    }
}

#[derive(Default)]
struct FieldVisitor {
    fields: Document,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: FieldValue) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, FieldValue::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, FieldValue::Integer(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let value = i64::try_from(value)
            .map(FieldValue::Integer)
            .unwrap_or_else(|_| FieldValue::Text(value.to_string()));
        self.put(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, FieldValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, FieldValue::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, FieldValue::Text(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::WriterConfig;
    use crate::store::MemorySegmentStore;
    use tracing_subscriber::layer::SubscriberExt;

    fn setup() -> (Arc<MemorySegmentStore>, RotatingLayer<Arc<MemorySegmentStore>>) {
        let store = Arc::new(MemorySegmentStore::new());
        let config = WriterConfig::new().capacity_bytes(4096).max_segments(2);
        let writer = RotatingWriter::open(config, store.clone()).unwrap();
        (store, RotatingLayer::new(Arc::new(writer)))
    }

    fn all_documents(store: &MemorySegmentStore) -> Vec<Document> {
        store
            .segment_names()
            .iter()
            .flat_map(|name| store.documents(name).unwrap())
            .collect()
    }

    #[test]
    fn event_becomes_record() {
        let (store, layer) = setup();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app::auth", user = "ada", attempts = 3_u64, ok = false, "login failed");
        });

        let docs = all_documents(&store);
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc["message"], FieldValue::from("login failed"));
        assert_eq!(doc["level"], FieldValue::from("WARN"));
        assert_eq!(doc["target"], FieldValue::from("app::auth"));
        assert_eq!(doc["user"], FieldValue::from("ada"));
        assert_eq!(doc["attempts"], FieldValue::Integer(3));
        assert_eq!(doc["ok"], FieldValue::Bool(false));
        assert!(doc.contains_key("_id"));
        assert!(doc.contains_key("timestamp"));
        assert_eq!(layer.failed_writes(), 0);
    }

    #[test]
    fn own_events_are_skipped() {
        let (store, layer) = setup();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "rotalog_core::writer", "internal");
        });
        assert!(all_documents(&store).is_empty());
    }

    #[test]
    fn failed_writes_are_counted() {
        let (store, layer) = setup();
        let identity = layer.writer().state().unwrap().identity;
        store.remove_state(identity);

        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", "lost");
        });
        assert_eq!(layer.failed_writes(), 1);
    }

    #[test]
    fn huge_u64_is_kept_as_text() {
        let (store, layer) = setup();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", n = u64::MAX, small = 7_u64);
        });

        let docs = all_documents(&store);
        assert_eq!(docs[0]["n"], FieldValue::Text(u64::MAX.to_string()));
        assert_eq!(docs[0]["small"], FieldValue::Integer(7));
        assert!(!docs[0].contains_key("message"));
    }

    #[test]
    fn timestamp_comes_from_writer_clock() {
        let store = Arc::new(MemorySegmentStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let writer =
            RotatingWriter::open_with_clock(WriterConfig::new(), store.clone(), clock.clone())
                .unwrap();
        let layer = RotatingLayer::new(Arc::new(writer));

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", "first");
            clock.advance(3);
            tracing::info!(target: "app", "second");
        });

        let docs = all_documents(&store);
        assert_eq!(docs[0]["timestamp"], FieldValue::Integer(1_700_000_000_000));
        assert_eq!(docs[1]["timestamp"], FieldValue::Integer(1_700_000_003_000));
    }
}
