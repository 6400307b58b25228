//! Adaptive frequency model for the range coder.
//!
//! Every coded symbol gains [`STEP`] counts; once the total passes
//! [`MAX_FREQ`] all counts are halved (never below 1). Symbols are kept
//! roughly sorted by frequency with a single swap per update, so frequent
//! symbols are found early in the linear scan. Encoder and decoder apply the
//! identical update and therefore evolve in lockstep.

use crate::error::{Error, Result};
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Total above which the model rescales.
pub const MAX_FREQ: u32 = (1 << 16) - 17;

/// Increment applied to a symbol each time it is coded.
pub const STEP: u32 = 16;

/// Adaptive model over the symbols `0..n`.
#[derive(Clone, Debug)]
pub struct FrequencyModel {
    total: u32,
    symbols: Vec<u8>,
    freqs: Vec<u32>,
}

impl FrequencyModel {
    /// Create a model over `n` symbols (1..=256), each starting at frequency 1.
    pub fn new(n: usize) -> Self {
        let n = n.clamp(1, 256);
        Self {
            total: n as u32,
            symbols: (0..n).map(|s| s as u8).collect(),
            freqs: vec![1; n],
        }
    }

    /// Number of symbols the model covers.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; a model covers at least one symbol.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Current total.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Decode one symbol.
    pub fn decode(&mut self, rc: &mut RangeDecoder<'_, '_>) -> Result<u8> {
        let target = rc.get_freq(self.total)?;
        let mut acc = 0;
        let mut x = 0;
        while acc + self.freqs[x] <= target {
            acc += self.freqs[x];
            x += 1;
        }
        rc.decode(acc, self.freqs[x])?;
        let sym = self.symbols[x];
        self.update(x);
        Ok(sym)
    }

    /// Encode one symbol.
    pub fn encode(&mut self, rc: &mut RangeEncoder, sym: u8) -> Result<()> {
        let x = self
            .symbols
            .iter()
            .position(|&s| s == sym)
            .ok_or(Error::Unsupported("symbol outside model alphabet"))?;
        let acc: u32 = self.freqs[..x].iter().sum();
        rc.encode(acc, self.freqs[x], self.total);
        self.update(x);
        Ok(())
    }

    fn update(&mut self, x: usize) {
        self.freqs[x] += STEP;
        self.total += STEP;
        if self.total > MAX_FREQ {
            self.rescale();
        }
        if x > 0 && self.freqs[x] > self.freqs[x - 1] {
            self.freqs.swap(x, x - 1);
            self.symbols.swap(x, x - 1);
        }
    }

    fn rescale(&mut self) {
        self.total = 0;
        for f in &mut self.freqs {
            *f -= *f >> 1;
            self.total += *f;
        }
    }
}
