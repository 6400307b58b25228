//! Bounded input cursor and the integer encodings shared by all formats.

use crate::error::{Error, Result};

/// Forward-only reader over a borrowed byte slice.
///
/// Every read is bounds checked; running off the end is reported as
/// [`Error::Truncated`] rather than panicking.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current offset from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read one byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(Error::Truncated { needed: 1 }),
        }
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(Error::Truncated { needed: 1 })
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-end-first 7-bits-per-byte integer.
    pub fn read_uint7(&mut self) -> Result<u32> {
        let mut value: u64 = 0;
        for _ in 0..5 {
            let c = self.read_u8()?;
            value = (value << 7) | u64::from(c & 0x7f);
            if c & 0x80 == 0 {
                return u32::try_from(value).map_err(|_| Error::Malformed("uint7 overflows 32 bits"));
            }
        }
        Err(Error::Malformed("uint7 longer than 5 bytes"))
    }

    /// Read a uint7 used as a length or count.
    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_uint7()? as usize)
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated {
                needed: n - self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Borrow everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }
}

/// Append `value` as a big-end-first 7-bits-per-byte integer.
pub fn put_uint7(out: &mut Vec<u8>, value: u32) {
    let mut s = 0;
    let mut x = value;
    loop {
        s += 7;
        x >>= 7;
        if x == 0 {
            break;
        }
    }
    loop {
        s -= 7;
        let more = if s > 0 { 0x80 } else { 0 };
        out.push(((value >> s) & 0x7f) as u8 | more);
        if s == 0 {
            break;
        }
    }
}

/// Append a length as uint7, rejecting lengths the format cannot carry.
pub fn put_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let value = u32::try_from(len).map_err(|_| Error::Unsupported("length above u32::MAX"))?;
    put_uint7(out, value);
    Ok(())
}
