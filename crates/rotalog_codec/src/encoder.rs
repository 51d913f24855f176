//! CBOR encoder and size measurement.

use crate::error::{CodecError, CodecResult};
use serde::Serialize;
use std::io;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    to_writer(value, &mut buffer)?;
    Ok(buffer)
}

/// Encode a value to CBOR, streaming into `writer`.
///
/// # Errors
///
/// Returns an error if serialization fails or the writer fails.
pub fn to_writer<T: Serialize + ?Sized, W: io::Write>(value: &T, writer: W) -> CodecResult<()> {
    ciborium::into_writer(value, writer).map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Returns the number of bytes `value` occupies when encoded with [`to_cbor`].
///
/// Nothing is buffered; the encoder writes into a [`ByteCounter`].
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> CodecResult<u64> {
    let mut counter = ByteCounter::new();
    to_writer(value, &mut counter)?;
    Ok(counter.count())
}

/// An [`io::Write`] sink that only counts bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteCounter {
    count: u64,
}

impl ByteCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
