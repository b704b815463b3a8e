//! Sequential little-endian reader over an immutable byte buffer.

use byteorder::{ByteOrder, LittleEndian};
use std::str::Utf8Error;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("truncated input: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("invalid UTF-8 text at offset {offset}: {source}")]
    InvalidText {
        offset: usize,
        #[source]
        source: Utf8Error,
    },
}

/// Read position over a borrowed buffer. The offset only moves forward and never passes the end.
#[derive(Debug)]
pub struct DecodeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DecodeCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        DecodeCursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        let available = self.remaining();
        if n > available {
            return Err(CursorError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CursorError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CursorError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16, CursorError> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CursorError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32, CursorError> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Next `n` bytes, copied so the result does not borrow the packet buffer.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, CursorError> {
        Ok(self.take(n)?.to_vec())
    }

    /// Reads `n` bytes and returns the text before the first NUL. Bytes after it are padding.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String, CursorError> {
        let offset = self.pos;
        let raw = self.take(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        std::str::from_utf8(&raw[..end])
            .map(str::to_owned)
            .map_err(|source| CursorError::InvalidText { offset, source })
    }
}
