//! Log records as they are stored.

use crate::id::RecordId;
use rotalog_codec::{Document, FieldValue};

/// Field that carries the record id in the stored document.
pub const RECORD_ID_FIELD: &str = "_id";

/// A formatted log entry plus the id assigned at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    id: RecordId,
    fields: Document,
}

impl LogRecord {
    /// Wraps formatted fields with a fresh id.
    ///
    /// A caller-supplied `_id` field is discarded; the id is always ours.
    #[must_use]
    pub fn new(mut fields: Document) -> Self {
        fields.remove(RECORD_ID_FIELD);
        Self {
            id: RecordId::new(),
            fields,
        }
    }

    /// The record's id.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// The formatted fields, without the id.
    #[must_use]
    pub fn fields(&self) -> &Document {
        &self.fields
    }

    /// The document that gets measured and inserted.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = self.fields.clone();
        doc.insert(
            RECORD_ID_FIELD.to_string(),
            FieldValue::Text(self.id.to_string()),
        );
        doc
    }

    /// Rebuilds a record from a stored document.
    ///
    /// Returns `None` if the `_id` field is missing or malformed.
    #[must_use]
    pub fn from_document(mut doc: Document) -> Option<Self> {
        let id = doc
            .remove(RECORD_ID_FIELD)
            .and_then(|v| v.as_text().and_then(RecordId::parse))?;
        Some(Self { id, fields: doc })
    }
}
