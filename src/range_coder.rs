//! Byte-oriented range coder with carry propagation.
//!
//! 32-bit `low`/`range` registers; whenever `range` falls below 2^24 the top
//! byte is shifted out (encoder) or a fresh byte shifted in (decoder). The
//! encoder defers runs of 0xFF bytes until it knows whether a carry reaches
//! them. Decoding primes `code` with five bytes, the first of which is the
//! encoder's initial cache byte and always falls off the top.

use crate::cursor::ByteReader;
use crate::error::{Error, Result};

const TOP: u32 = 1 << 24;

/// Range encoder.
pub struct RangeEncoder {
    low: u32,
    range: u32,
    carry: bool,
    cache: u8,
    ff_count: usize,
    output: Vec<u8>,
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeEncoder {
    /// Create an encoder.
    pub fn new() -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            carry: false,
            cache: 0,
            ff_count: 0,
            output: Vec::new(),
        }
    }

    /// Encode the slice `[cum_freq, cum_freq + freq)` of `[0, total)`.
    #[inline]
    pub fn encode(&mut self, cum_freq: u32, freq: u32, total: u32) {
        let old_low = self.low;
        self.range /= total;
        self.low = self.low.wrapping_add(cum_freq * self.range);
        self.range *= freq;
        if self.low < old_low {
            self.carry = true;
        }
        while self.range < TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.carry {
            let carry = u8::from(self.carry);
            self.output.push(self.cache.wrapping_add(carry));
            for _ in 0..self.ff_count {
                self.output.push(carry.wrapping_sub(1));
            }
            self.ff_count = 0;
            self.cache = (self.low >> 24) as u8;
            self.carry = false;
        } else {
            self.ff_count += 1;
        }
        self.low <<= 8;
    }

    /// Flush the registers and return the coded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.output
    }
}

/// Range decoder over a borrowed cursor.
pub struct RangeDecoder<'r, 'a> {
    range: u32,
    code: u32,
    input: &'r mut ByteReader<'a>,
}

impl<'r, 'a> RangeDecoder<'r, 'a> {
    /// Prime the decoder from the first five input bytes.
    pub fn new(input: &'r mut ByteReader<'a>) -> Result<Self> {
        let mut code = 0u32;
        for _ in 0..5 {
            code = (code << 8) | u32::from(input.read_u8()?);
        }
        Ok(Self {
            range: u32::MAX,
            code,
            input,
        })
    }

    /// Scale `range` to `total` and return the target cumulative frequency.
    #[inline]
    pub fn get_freq(&mut self, total: u32) -> Result<u32> {
        self.range /= total;
        let target = self.code / self.range;
        if target >= total {
            return Err(Error::Malformed("range coder overshot its model"));
        }
        Ok(target)
    }

    /// Consume the slice chosen after [`RangeDecoder::get_freq`].
    #[inline]
    pub fn decode(&mut self, cum_freq: u32, freq: u32) -> Result<()> {
        self.code = self.code.wrapping_sub(cum_freq.wrapping_mul(self.range));
        self.range = self.range.wrapping_mul(freq);
        while self.range < TOP {
            self.code = (self.code << 8) | u32::from(self.input.read_u8()?);
            self.range <<= 8;
        }
        Ok(())
    }
}
