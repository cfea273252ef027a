//! Binary cursor
//!
//! Sequential big-endian reader/writer primitives shared by the header codec
//! and the archive preamble.
//!
//! ## Encodings
//! - `u32` / `u64`: fixed width, big-endian
//! - raw bytes: written as-is, length known from context
//! - len32-prefixed bytes: `[len: u32][bytes]`

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DumpError, Result};

// =============================================================================
// Writer
// =============================================================================

/// Appends fixed-width integers and byte strings to a growable buffer
#[derive(Debug, Default)]
pub struct BinWriter {
    buf: BytesMut,
}

impl BinWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    /// Write raw bytes with no length prefix
    pub fn write_bytes(&mut self, raw: &[u8]) {
        self.buf.put_slice(raw);
    }

    /// Write a 4-byte length followed by the bytes
    ///
    /// Fails with `InvalidParameter` if `raw` does not fit a u32 length.
    pub fn write_len32_prefixed(&mut self, raw: &[u8]) -> Result<()> {
        let len = u32::try_from(raw.len()).map_err(|_| {
            DumpError::InvalidParameter(format!(
                "byte string of {} bytes exceeds the len32 limit",
                raw.len()
            ))
        })?;
        self.buf.put_u32(len);
        self.buf.put_slice(raw);
        Ok(())
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Freeze into an immutable buffer
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reads fixed-width integers and byte strings from a borrowed slice
///
/// Every read checks the remaining length first and fails with
/// `TruncatedInput` without advancing when the input is too short.
#[derive(Debug, Clone)]
pub struct BinReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> BinReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DumpError::TruncatedInput { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        self.position += 4;
        Ok(self.buf.get_u32())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        self.position += 8;
        Ok(self.buf.get_u64())
    }

    /// Read exactly `len` raw bytes, borrowing from the input
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.position += len;
        Ok(head)
    }

    /// Read a fixed-size array (object ids, digests)
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a 4-byte length followed by that many bytes
    pub fn read_len32_prefixed(&mut self) -> Result<&'a [u8]> {
        // Peek the length so a short body leaves the cursor untouched
        let mut probe = self.clone();
        let len = probe.read_u32()? as usize;
        probe.ensure(len)?;
        self.read_u32()?;
        self.read_bytes(len)
    }
}
