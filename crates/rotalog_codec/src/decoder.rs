//! CBOR decoder.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use std::io;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    from_reader(bytes)
}

/// Decode one value from a reader.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if the reader ends mid-value, or
/// a decoding error for malformed input.
pub fn from_reader<T: DeserializeOwned, R: io::Read>(reader: R) -> CodecResult<T> {
    ciborium::from_reader(reader).map_err(|e| match e {
        ciborium::de::Error::Io(io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
            CodecError::UnexpectedEof
        }
        other => CodecError::decoding_failed(other.to_string()),
    })
}
