//! Range Asymmetric Numeral Systems (rANS) over byte streams.
//!
//! CRAM uses static-model rANS in two renormalisation widths: the 4x8 codec
//! keeps 32-bit states in `[2^23, 2^31)` and moves single bytes, the Nx16
//! codecs keep states in `[2^15, 2^31)` and move little-endian 16-bit words.
//! Both encode backwards into a buffer that is reversed on completion, so the
//! decoder reads forwards: N little-endian u32 states, then renormalisation
//! bytes in exactly the order the lanes consume them.
//!
//! All lanes share one input cursor, which makes the lane visiting order part
//! of the format. The order-0 and order-1 drivers below fix that order.

use std::marker::PhantomData;

use crate::cursor::ByteReader;
use crate::error::{Error, Result};

/// Precision of the frequency tables, in bits.
pub const TOTAL_FREQ_SHIFT: u32 = 12;

/// Normalised frequency total.
pub const TOTAL_FREQ: u32 = 1 << TOTAL_FREQ_SHIFT;

/// Renormalisation capability: state bounds and I/O width of one family.
pub trait Renorm {
    /// Smallest legal state after renormalisation.
    const LOWER_BOUND: u32;

    /// Bits moved per renormalisation step.
    const IO_BITS: u32;

    /// Pull input until `state` is back above the lower bound.
    fn pull(state: u32, input: &mut ByteReader<'_>) -> Result<u32>;

    /// Push output so that encoding a symbol of `freq` keeps the state in range.
    ///
    /// `out` is written back to front and reversed by the caller.
    fn push(state: u32, freq: u32, scale_bits: u32, out: &mut Vec<u8>) -> u32;
}

/// Byte-wise renormalisation of the rANS 4x8 codec.
#[derive(Debug)]
pub enum Byte {}

/// 16-bit renormalisation of the rANS Nx16 codec.
#[derive(Debug)]
pub enum Word {}

impl Renorm for Byte {
    const LOWER_BOUND: u32 = 1 << 23;
    const IO_BITS: u32 = 8;

    #[inline]
    fn pull(mut state: u32, input: &mut ByteReader<'_>) -> Result<u32> {
        while state < Self::LOWER_BOUND {
            state = (state << 8) | u32::from(input.read_u8()?);
        }
        Ok(state)
    }

    #[inline]
    fn push(mut state: u32, freq: u32, scale_bits: u32, out: &mut Vec<u8>) -> u32 {
        let x_max = ((Self::LOWER_BOUND >> scale_bits) << Self::IO_BITS) * freq;
        while state >= x_max {
            out.push(state as u8);
            state >>= Self::IO_BITS;
        }
        state
    }
}

impl Renorm for Word {
    const LOWER_BOUND: u32 = 1 << 15;
    const IO_BITS: u32 = 16;

    #[inline]
    fn pull(state: u32, input: &mut ByteReader<'_>) -> Result<u32> {
        // One word always suffices: the decode step never leaves the state below 8.
        if state < Self::LOWER_BOUND {
            return Ok((state << Self::IO_BITS) | u32::from(input.read_u16_le()?));
        }
        Ok(state)
    }

    #[inline]
    fn push(mut state: u32, freq: u32, scale_bits: u32, out: &mut Vec<u8>) -> u32 {
        let x_max = ((Self::LOWER_BOUND >> scale_bits) << Self::IO_BITS) * freq;
        if state >= x_max {
            // Reversed later, so the high byte goes first.
            out.push((state >> 8) as u8);
            out.push(state as u8);
            state >>= Self::IO_BITS;
        }
        state
    }
}

/// Static per-context table: frequencies, cumulative frequencies and the
/// reverse lookup from slot to symbol.
#[derive(Clone, Debug)]
pub struct ContextTable {
    freq: [u32; 256],
    cum: [u32; 256],
    lookup: Vec<u8>,
    total: u32,
    scale_bits: u32,
}

impl Default for ContextTable {
    fn default() -> Self {
        Self {
            freq: [0; 256],
            cum: [0; 256],
            lookup: Vec::new(),
            total: 0,
            scale_bits: TOTAL_FREQ_SHIFT,
        }
    }
}

impl ContextTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous contents. The lookup allocation is kept.
    pub fn reset(&mut self) {
        self.freq = [0; 256];
        self.cum = [0; 256];
        self.total = 0;
    }

    /// Load normalised frequencies summing to at most `1 << scale_bits`.
    ///
    /// The reverse lookup is only filled when `with_lookup` is set, since
    /// encoders never need it.
    pub fn load(&mut self, freqs: &[u32; 256], scale_bits: u32, with_lookup: bool) -> Result<()> {
        if scale_bits == 0 || scale_bits > TOTAL_FREQ_SHIFT {
            return Err(Error::Malformed("frequency precision out of range"));
        }
        let limit = 1u32 << scale_bits;
        let mut cum = 0u32;
        for (sym, &f) in freqs.iter().enumerate() {
            self.cum[sym] = cum;
            self.freq[sym] = f;
            cum = cum.saturating_add(f);
            if cum > limit {
                return Err(Error::Malformed("frequencies exceed table total"));
            }
        }
        self.total = cum;
        self.scale_bits = scale_bits;

        if with_lookup {
            self.lookup.clear();
            self.lookup.resize(limit as usize, 0);
            for (sym, &f) in freqs.iter().enumerate() {
                if f > 0 {
                    let start = self.cum[sym] as usize;
                    self.lookup[start..start + f as usize].fill(sym as u8);
                }
            }
        }
        Ok(())
    }

    /// Frequency of `sym`.
    #[inline]
    pub fn freq(&self, sym: u8) -> u32 {
        self.freq[sym as usize]
    }

    /// Cumulative frequency of the symbols below `sym`.
    #[inline]
    pub fn cum_freq(&self, sym: u8) -> u32 {
        self.cum[sym as usize]
    }

    /// Sum of all frequencies.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Precision of the table, in bits.
    pub fn scale_bits(&self) -> u32 {
        self.scale_bits
    }

    /// Symbol owning `slot`. Slots past the total (legacy 4095 tables, or
    /// contexts that were never loaded) are malformed input.
    #[inline]
    pub fn symbol_at(&self, slot: u32) -> Result<u8> {
        if slot >= self.total {
            return Err(Error::Malformed("slot outside frequency table"));
        }
        Ok(self.lookup[slot as usize])
    }
}

/// Arena of 256 context tables indexed by the previous symbol.
///
/// Owned by one engine and reset at the start of every call.
#[derive(Debug, Default)]
pub struct ContextArena {
    tables: Vec<ContextTable>,
}

impl ContextArena {
    /// Create an arena; tables are allocated on first reset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make all 256 tables present and empty.
    pub fn reset(&mut self) {
        if self.tables.len() != 256 {
            self.tables = vec![ContextTable::new(); 256];
        } else {
            for table in &mut self.tables {
                table.reset();
            }
        }
    }

    /// Table for context `ctx`.
    #[inline]
    pub fn table(&self, ctx: u8) -> &ContextTable {
        &self.tables[ctx as usize]
    }

    /// Mutable table for context `ctx`.
    pub fn table_mut(&mut self, ctx: u8) -> &mut ContextTable {
        &mut self.tables[ctx as usize]
    }
}

/// N-way interleaved rANS encoder.
pub struct InterleavedRansEncoder<R: Renorm> {
    states: Vec<u32>,
    output: Vec<u8>,
    _renorm: PhantomData<R>,
}

impl<R: Renorm> InterleavedRansEncoder<R> {
    /// Create an encoder with `lanes` states.
    pub fn new(lanes: usize) -> Self {
        Self {
            states: vec![R::LOWER_BOUND; lanes],
            output: Vec::new(),
            _renorm: PhantomData,
        }
    }

    /// Encode a symbol on one lane.
    ///
    /// # Errors
    /// Returns `Error::Malformed` if `freq` is 0.
    #[inline]
    pub fn encode(&mut self, lane: usize, cum_freq: u32, freq: u32, scale_bits: u32) -> Result<()> {
        if freq == 0 {
            return Err(Error::Malformed("symbol has zero frequency"));
        }
        let x = R::push(self.states[lane], freq, scale_bits, &mut self.output);
        self.states[lane] = ((x / freq) << scale_bits) + (x % freq) + cum_freq;
        Ok(())
    }

    /// Encode `sym` on one lane using `table`.
    #[inline]
    pub fn encode_symbol(&mut self, lane: usize, table: &ContextTable, sym: u8) -> Result<()> {
        self.encode(lane, table.cum_freq(sym), table.freq(sym), table.scale_bits())
    }

    /// Flush the states and return the stream in decoder order.
    pub fn finish(mut self) -> Vec<u8> {
        for &state in self.states.iter().rev() {
            self.output.extend(state.to_le_bytes().iter().rev());
        }
        self.output.reverse();
        self.output
    }
}

/// N-way interleaved rANS decoder over a shared cursor.
pub struct InterleavedRansDecoder<'r, 'a, R: Renorm> {
    states: Vec<u32>,
    input: &'r mut ByteReader<'a>,
    _renorm: PhantomData<R>,
}

impl<'r, 'a, R: Renorm> InterleavedRansDecoder<'r, 'a, R> {
    /// Read `lanes` initial states from `input`.
    pub fn new(lanes: usize, input: &'r mut ByteReader<'a>) -> Result<Self> {
        let states = (0..lanes)
            .map(|_| input.read_u32_le())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            states,
            input,
            _renorm: PhantomData,
        })
    }

    /// Current slot of a lane.
    #[inline]
    pub fn get_cum_freq(&self, lane: usize, scale_bits: u32) -> u32 {
        self.states[lane] & ((1 << scale_bits) - 1)
    }

    /// Advance a lane past a symbol and renormalise it.
    #[inline]
    pub fn decode(&mut self, lane: usize, cum_freq: u32, freq: u32, scale_bits: u32) -> Result<()> {
        let x = self.states[lane];
        let slot = x & ((1 << scale_bits) - 1);
        let x = freq
            .wrapping_mul(x >> scale_bits)
            .wrapping_add(slot)
            .wrapping_sub(cum_freq);
        self.states[lane] = R::pull(x, self.input)?;
        Ok(())
    }

    /// Decode one symbol from a lane using `table`.
    #[inline]
    pub fn decode_symbol(&mut self, lane: usize, table: &ContextTable) -> Result<u8> {
        let bits = table.scale_bits();
        let sym = table.symbol_at(self.get_cum_freq(lane, bits))?;
        self.decode(lane, table.cum_freq(sym), table.freq(sym), bits)?;
        Ok(sym)
    }

    /// Check that every lane is back at the encoder's starting state.
    ///
    /// # Errors
    /// Returns `Error::Malformed` otherwise, as happens when a stream is read
    /// with the wrong lane count or table.
    pub fn finish(self) -> Result<()> {
        if self.states.iter().any(|&x| x != R::LOWER_BOUND) {
            return Err(Error::Malformed("rANS states did not return to the initial value"));
        }
        Ok(())
    }
}

/// Encode `data` with one table. Symbol `i` goes to lane `i % lanes`; the
/// tail that does not fill a round goes to lanes `0..rem`.
pub fn encode_order0<R: Renorm>(data: &[u8], table: &ContextTable, lanes: usize) -> Result<Vec<u8>> {
    let mut encoder = InterleavedRansEncoder::<R>::new(lanes);
    let body = data.len() - data.len() % lanes;
    for lane in (0..data.len() - body).rev() {
        encoder.encode_symbol(lane, table, data[body + lane])?;
    }
    for chunk in data[..body].chunks_exact(lanes).rev() {
        for (lane, &sym) in chunk.iter().enumerate().rev() {
            encoder.encode_symbol(lane, table, sym)?;
        }
    }
    Ok(encoder.finish())
}

/// Inverse of [`encode_order0`].
pub fn decode_order0<R: Renorm>(
    input: &mut ByteReader<'_>,
    table: &ContextTable,
    lanes: usize,
    len: usize,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    let mut decoder = InterleavedRansDecoder::<R>::new(lanes, input)?;
    let body = len - len % lanes;
    for chunk in out[..body].chunks_exact_mut(lanes) {
        for (lane, slot) in chunk.iter_mut().enumerate() {
            *slot = decoder.decode_symbol(lane, table)?;
        }
    }
    for (lane, slot) in out[body..].iter_mut().enumerate() {
        *slot = decoder.decode_symbol(lane, table)?;
    }
    decoder.finish()?;
    Ok(out)
}

/// Length of each order-1 lane segment. Lane `r` owns
/// `[r * seg, (r + 1) * seg)`; the last lane also owns the tail.
#[inline]
pub fn order1_segment(len: usize, lanes: usize) -> usize {
    len / lanes
}

/// Context in force when coding `data[idx]` on a lane whose segment starts
/// at `start`.
#[inline]
fn order1_context(data: &[u8], idx: usize, start: usize) -> u8 {
    if idx == start {
        0
    } else {
        data[idx - 1]
    }
}

/// Order-1 counts `counts[ctx][sym]` under the lane segmentation.
pub fn order1_counts(data: &[u8], lanes: usize) -> Vec<[u32; 256]> {
    let mut counts = vec![[0u32; 256]; 256];
    let seg = order1_segment(data.len(), lanes);
    for lane in 0..lanes {
        let start = lane * seg;
        let end = if lane == lanes - 1 { data.len() } else { start + seg };
        for idx in start..end {
            counts[order1_context(data, idx, start) as usize][data[idx] as usize] += 1;
        }
    }
    counts
}

/// Encode `data` with a table per previous symbol.
pub fn encode_order1<R: Renorm>(data: &[u8], arena: &ContextArena, lanes: usize) -> Result<Vec<u8>> {
    let mut encoder = InterleavedRansEncoder::<R>::new(lanes);
    let seg = order1_segment(data.len(), lanes);
    let last = lanes - 1;
    let last_start = last * seg;
    for idx in (lanes * seg..data.len()).rev() {
        let ctx = order1_context(data, idx, last_start);
        encoder.encode_symbol(last, arena.table(ctx), data[idx])?;
    }
    for k in (0..seg).rev() {
        for lane in (0..lanes).rev() {
            let start = lane * seg;
            let idx = start + k;
            let ctx = order1_context(data, idx, start);
            encoder.encode_symbol(lane, arena.table(ctx), data[idx])?;
        }
    }
    Ok(encoder.finish())
}

/// Inverse of [`encode_order1`].
pub fn decode_order1<R: Renorm>(
    input: &mut ByteReader<'_>,
    arena: &ContextArena,
    lanes: usize,
    len: usize,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    let mut decoder = InterleavedRansDecoder::<R>::new(lanes, input)?;
    let seg = order1_segment(len, lanes);
    let mut context = vec![0u8; lanes];
    for k in 0..seg {
        for (lane, ctx) in context.iter_mut().enumerate() {
            let sym = decoder.decode_symbol(lane, arena.table(*ctx))?;
            out[lane * seg + k] = sym;
            *ctx = sym;
        }
    }
    let last = lanes - 1;
    let mut ctx = context[last];
    for slot in out[lanes * seg..].iter_mut() {
        let sym = decoder.decode_symbol(last, arena.table(ctx))?;
        *slot = sym;
        ctx = sym;
    }
    decoder.finish()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flat_table(symbols: &[u8], with_lookup: bool) -> ContextTable {
        let mut freqs = [0u32; 256];
        let share = TOTAL_FREQ / symbols.len() as u32;
        for &s in symbols {
            freqs[s as usize] = share;
        }
        freqs[symbols[0] as usize] += TOTAL_FREQ - share * symbols.len() as u32;
        let mut table = ContextTable::new();
        table.load(&freqs, TOTAL_FREQ_SHIFT, with_lookup).unwrap();
        table
    }

    #[test]
    fn test_interleaved_rans_basic() {
        let total_bits = 8;
        let symbols = [(0u32, 128u32), (128, 128)];
        let input_per_lane = [0usize, 1, 0];

        let mut encoder = InterleavedRansEncoder::<Word>::new(4);
        for &val in input_per_lane.iter().rev() {
            for lane in (0..4).rev() {
                let (cf, f) = symbols[val];
                encoder.encode(lane, cf, f, total_bits).unwrap();
            }
        }
        let stream = encoder.finish();
        let mut reader = ByteReader::new(&stream);
        let mut decoder = InterleavedRansDecoder::<Word>::new(4, &mut reader).unwrap();

        for &expected in &input_per_lane {
            for lane in 0..4 {
                let cf = decoder.get_cum_freq(lane, total_bits);
                let val = if cf < 128 { 0 } else { 1 };
                assert_eq!(val, expected);
                let (cf, f) = symbols[val];
                decoder.decode(lane, cf, f, total_bits).unwrap();
            }
        }
        decoder.finish().unwrap();
    }

    #[test]
    fn test_finish_rejects_displaced_states() {
        let table = flat_table(&[1, 2, 3], true);
        let data: Vec<u8> = (0..64u32).map(|i| (i * 7 % 3 + 1) as u8).collect();
        let stream = encode_order0::<Word>(&data, &table, 4).unwrap();

        // Decoding fewer symbols than were encoded leaves the states mid-stream.
        let mut reader = ByteReader::new(&stream);
        let mut decoder = InterleavedRansDecoder::<Word>::new(4, &mut reader).unwrap();
        for lane in 0..4 {
            decoder.decode_symbol(lane, &table).unwrap();
        }
        assert!(matches!(decoder.finish(), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_wrong_lane_count_is_an_error() {
        let mut x = 12_345u32;
        let data: Vec<u8> = (0..20_000)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((x >> 16) % 3 + 1) as u8
            })
            .collect();
        let table = flat_table(&[1, 2, 3], true);
        for (enc, dec) in [(4, 32), (32, 4)] {
            let stream = encode_order0::<Word>(&data, &table, enc).unwrap();
            let mut reader = ByteReader::new(&stream);
            assert!(decode_order0::<Word>(&mut reader, &table, dec, data.len()).is_err());
        }
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let mut encoder = InterleavedRansEncoder::<Byte>::new(4);
        assert!(encoder.encode(0, 0, 0, 12).is_err());
    }

    #[test]
    fn test_single_symbol_states_do_not_move() {
        // A symbol owning the whole table costs nothing: the states stay at
        // the lower bound and nothing but the states is written.
        let table = flat_table(&[b'A'], true);
        let stream = encode_order0::<Word>(b"AAAA", &table, 4).unwrap();
        assert_eq!(stream, [0u8, 0x80, 0, 0].repeat(4));
    }

    #[test]
    fn test_unloaded_context_is_malformed() {
        let arena = {
            let mut arena = ContextArena::new();
            arena.reset();
            arena
        };
        let stream = [0u8; 16];
        let mut reader = ByteReader::new(&stream);
        assert!(matches!(
            decode_order1::<Word>(&mut reader, &arena, 4, 8),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_truncated_renormalisation() {
        let table = flat_table(&[1, 2, 3, 4, 5, 6, 7], true);
        let data: Vec<u8> = (0..400).map(|i| (i % 7 + 1) as u8).collect();
        let stream = encode_order0::<Byte>(&data, &table, 4).unwrap();
        let mut reader = ByteReader::new(&stream[..stream.len() - 3]);
        assert!(matches!(
            decode_order0::<Byte>(&mut reader, &table, 4, data.len()),
            Err(Error::Truncated { .. })
        ));
    }

    fn counts_table(counts: &[u32; 256]) -> Option<[u32; 256]> {
        let mut f = *counts;
        if f.iter().all(|&c| c == 0) {
            return None;
        }
        crate::freq::normalise_ratio(&mut f, TOTAL_FREQ).ok()?;
        Some(f)
    }

    fn roundtrip_order1<R: Renorm>(data: &[u8], lanes: usize) -> Vec<u8> {
        let mut arena = ContextArena::new();
        arena.reset();
        for (ctx, row) in order1_counts(data, lanes).iter().enumerate() {
            if let Some(f) = counts_table(row) {
                arena.table_mut(ctx as u8).load(&f, TOTAL_FREQ_SHIFT, true).unwrap();
            }
        }
        let stream = encode_order1::<R>(data, &arena, lanes).unwrap();
        let mut reader = ByteReader::new(&stream);
        let out = decode_order1::<R>(&mut reader, &arena, lanes, data.len()).unwrap();
        assert_eq!(reader.remaining(), 0);
        out
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_lookup_partitions_slots(counts in prop::collection::vec(0u32..500, 256)) {
            let mut f = [0u32; 256];
            f.copy_from_slice(&counts);
            prop_assume!(f.iter().any(|&c| c > 0));
            crate::freq::normalise_ratio(&mut f, TOTAL_FREQ).unwrap();
            let mut table = ContextTable::new();
            table.load(&f, TOTAL_FREQ_SHIFT, true).unwrap();
            prop_assert_eq!(table.total(), TOTAL_FREQ);
            for slot in 0..TOTAL_FREQ {
                let sym = table.symbol_at(slot).unwrap();
                prop_assert!(table.cum_freq(sym) <= slot);
                prop_assert!(slot < table.cum_freq(sym) + table.freq(sym));
            }
        }

        #[test]
        fn prop_order0_roundtrip(
            data in prop::collection::vec(0u8..12, 0..600),
            wide in any::<bool>(),
        ) {
            let lanes = if wide { 32 } else { 4 };
            let mut counts = [0u32; 256];
            for &b in &data {
                counts[b as usize] += 1;
            }
            let f = counts_table(&counts).unwrap_or_else(|| {
                let mut f = [0u32; 256];
                f[0] = TOTAL_FREQ;
                f
            });
            let mut table = ContextTable::new();
            table.load(&f, TOTAL_FREQ_SHIFT, true).unwrap();

            let stream = encode_order0::<Word>(&data, &table, lanes).unwrap();
            let mut reader = ByteReader::new(&stream);
            prop_assert_eq!(decode_order0::<Word>(&mut reader, &table, lanes, data.len()).unwrap(), data.clone());

            let stream = encode_order0::<Byte>(&data, &table, lanes).unwrap();
            let mut reader = ByteReader::new(&stream);
            prop_assert_eq!(decode_order0::<Byte>(&mut reader, &table, lanes, data.len()).unwrap(), data);
        }

        #[test]
        fn prop_order1_roundtrip(data in prop::collection::vec(0u8..6, 0..500)) {
            prop_assert_eq!(roundtrip_order1::<Word>(&data, 4), data.clone());
            prop_assert_eq!(roundtrip_order1::<Word>(&data, 32), data.clone());
            prop_assert_eq!(roundtrip_order1::<Byte>(&data, 4), data);
        }
    }
}
