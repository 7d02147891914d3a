//! Bounds-checked cursor over archive bytes
//!
//! Container structures are big-endian, catalog records are little-endian;
//! the cursor offers both. Every read checks the remaining length first so
//! a short record surfaces as `CorruptArchive` instead of a panic.

use crate::error::{CarError, Result};
use bytes::Buf;

/// Cursor over a byte slice that reports truncation as corruption
pub struct Decoder<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> Decoder<'a> {
    /// Create a decoder; `what` names the structure in error messages
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Decoder { buf, what }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(CarError::corrupt(format!(
                "truncated {}: need {} bytes, {} left",
                self.what,
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Borrow the next `n` bytes
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Read a fixed-size array
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Fail unless every byte was consumed
    pub fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(CarError::corrupt(format!(
                "{} has {} trailing bytes",
                self.what,
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}

/// Decode a NUL-padded fixed-width string field
pub fn fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Encode a string into a NUL-padded fixed-width field, truncating on a
/// character boundary so at least one NUL remains
pub fn put_fixed_str<const N: usize>(value: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let mut len = value.len().min(N.saturating_sub(1));
    while !value.is_char_boundary(len) {
        len -= 1;
    }
    out[..len].copy_from_slice(&value.as_bytes()[..len]);
    out
}
