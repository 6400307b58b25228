//! Limits and encoder knobs shared by every engine.

use crate::error::{Error, Result};

/// Default allocation guard for a single decoded buffer (256 MiB).
pub const DEFAULT_MAX_OUTPUT_LEN: usize = 1 << 28;

/// Default recursion guard for stripe sub-streams.
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Default number of stripes written by the stripe transform.
pub const DEFAULT_STRIPE_WAYS: u8 = 4;

/// Lowest order-1 Nx16 precision the encoder accepts. Below 8 bits a
/// context followed by many distinct symbols has fewer slots than symbols.
pub const MIN_ORDER1_SHIFT: u32 = 8;

/// Codec configuration.
///
/// Decode limits protect against hostile headers; the remaining fields only
/// influence what the encoders emit. Every stream produced under any
/// configuration decodes under the default one, provided it fits the limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecConfig {
    /// Largest output buffer a decoder will allocate.
    pub max_output_len: usize,
    /// Deepest chain of nested container streams a decoder will follow.
    pub max_depth: usize,
    /// Number of sub-streams the stripe encoder splits into.
    pub stripe_ways: u8,
    /// Frequency precision, in bits, of order-1 rANS Nx16 tables. The
    /// encoder accepts 8..=12; decoders read any 1..=12 from the stream.
    pub order1_shift: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_output_len: DEFAULT_MAX_OUTPUT_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
            stripe_ways: DEFAULT_STRIPE_WAYS,
            order1_shift: crate::rans::TOTAL_FREQ_SHIFT,
        }
    }
}

impl CodecConfig {
    /// Set the allocation guard.
    pub fn with_max_output_len(mut self, len: usize) -> Self {
        self.max_output_len = len;
        self
    }

    /// Set the recursion guard.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the stripe count used when encoding; must be non-zero.
    pub fn with_stripe_ways(mut self, ways: u8) -> Self {
        self.stripe_ways = ways;
        self
    }

    /// Set the order-1 Nx16 frequency precision used when encoding.
    ///
    /// Values outside 8..=12 make order-1 compression fail with
    /// `Error::Unsupported`.
    pub fn with_order1_shift(mut self, shift: u32) -> Self {
        self.order1_shift = shift;
        self
    }

    /// Reject an order-1 encoder precision that cannot hold every alphabet.
    pub(crate) fn check_order1_shift(&self) -> Result<u32> {
        if !(MIN_ORDER1_SHIFT..=crate::rans::TOTAL_FREQ_SHIFT).contains(&self.order1_shift) {
            return Err(Error::Unsupported("order-1 precision must be 8..=12 bits"));
        }
        Ok(self.order1_shift)
    }

    /// Reject a declared output length above the guard.
    pub(crate) fn check_output_len(&self, len: usize) -> Result<()> {
        if len > self.max_output_len {
            return Err(Error::OutputTooLarge {
                len,
                limit: self.max_output_len,
            });
        }
        Ok(())
    }

    /// Reject a nesting depth above the guard.
    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep(self.max_depth));
        }
        Ok(())
    }
}
