//! # Rotalog Codec
//!
//! Document model and CBOR encoding for Rotalog.
//!
//! Every byte count the rotation engine reasons about comes from this crate.
//! The same encoder is used to size a document and to store it, so
//! capacity accounting matches what lands on disk exactly.
//!
//! ## Encoding Rules
//!
//! - Documents are maps with text keys, serialized in key order
//! - Integers use the shortest CBOR encoding
//! - All lengths are definite
//!
//! ## Usage
//!
//! ```
//! use rotalog_codec::{encoded_len, from_cbor, to_cbor, Document, FieldValue};
//!
//! let mut doc = Document::new();
//! doc.insert("level".to_string(), FieldValue::from("INFO"));
//! doc.insert("attempt".to_string(), FieldValue::from(3));
//!
//! let bytes = to_cbor(&doc).unwrap();
//! assert_eq!(encoded_len(&doc).unwrap(), bytes.len() as u64);
//!
//! let decoded: Document = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, from_reader};
pub use encoder::{encoded_len, to_cbor, to_writer, ByteCounter};
pub use error::{CodecError, CodecResult};
pub use value::{Document, FieldValue};
