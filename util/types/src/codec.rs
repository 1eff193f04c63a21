//! Deterministic binary encoding.
//!
//! Every integer is big-endian and every field sits at a fixed offset from
//! the previous one; two encoders on two machines must produce the same
//! bytes for the same value. Buffers are capped at [`NETWORK_SIZE_LIMIT`] on
//! both sides so a peer cannot make us allocate past the transport envelope.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use fluxvm_error::{impl_error_conversion_with_kind, Error, ErrorKind};
use fluxvm_fixed_hash::H256;
use thiserror::Error as ThisError;

/// Hard cap on an encoded object, leaving headroom under the 2 MiB
/// transport frame for the outer envelope.
pub const NETWORK_SIZE_LIMIT: usize = 2_044_723;

/// The errors raised while encoding or decoding wire objects.
#[derive(ThisError, Debug, PartialEq, Eq, Clone)]
pub enum CodecError {
    /// The buffer grew past [`NETWORK_SIZE_LIMIT`].
    #[error("size {0} exceeds the network frame limit")]
    SizeLimitExceeded(usize),

    /// The input ended inside the named field.
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    /// The input decoded but is not a well-formed object.
    #[error("invalid object: {0}")]
    InvalidObject(&'static str),

    /// The registry has no decoder for this type id.
    #[error("unknown {registry} type id {id}")]
    UnknownTypeId {
        registry: &'static str,
        id: u8,
    },
}

impl_error_conversion_with_kind!(CodecError, ErrorKind::Codec, Error);

/// Appends fields to a growing buffer, enforcing the size limit.
pub struct Writer {
    buf: BytesMut,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            buf: BytesMut::with_capacity(64),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&mut self, additional: usize) -> Result<(), CodecError> {
        let total = self.buf.len().saturating_add(additional);
        if total > NETWORK_SIZE_LIMIT {
            return Err(CodecError::SizeLimitExceeded(total));
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.ensure(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.ensure(4)?;
        self.buf.put_u32(value);
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<(), CodecError> {
        self.ensure(8)?;
        self.buf.put_u64(value);
        Ok(())
    }

    pub fn put_i64(&mut self, value: i64) -> Result<(), CodecError> {
        self.ensure(8)?;
        self.buf.put_i64(value);
        Ok(())
    }

    pub fn put_hash(&mut self, hash: &H256) -> Result<(), CodecError> {
        self.put_slice(hash.as_bytes())
    }

    pub fn put_slice(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.ensure(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads fields off a borrowed input, tracking the cursor position.
pub struct Reader<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Result<Self, CodecError> {
        if input.len() > NETWORK_SIZE_LIMIT {
            return Err(CodecError::SizeLimitExceeded(input.len()));
        }
        Ok(Reader { input, position: 0 })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.position
    }

    fn take(&mut self, count: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < count {
            return Err(CodecError::UnexpectedEof(field));
        }
        let slice = &self.input[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn get_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, field)?[0])
    }

    pub fn get_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        Ok(BigEndian::read_u32(self.take(4, field)?))
    }

    pub fn get_u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        Ok(BigEndian::read_u64(self.take(8, field)?))
    }

    pub fn get_i64(&mut self, field: &'static str) -> Result<i64, CodecError> {
        Ok(BigEndian::read_i64(self.take(8, field)?))
    }

    pub fn get_hash(&mut self, field: &'static str) -> Result<H256, CodecError> {
        let mut inner = [0u8; 32];
        inner.copy_from_slice(self.take(32, field)?);
        Ok(H256::from(inner))
    }

    pub fn get_slice(&mut self, count: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        self.take(count, field)
    }

    /// The raw input consumed since `start`; used to cache canonical bytes.
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        &self.input[start..self.position]
    }

    /// Fails with `InvalidObject` unless the whole input was consumed.
    pub fn expect_empty(&self, object: &'static str) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::InvalidObject(object));
        }
        Ok(())
    }
}
