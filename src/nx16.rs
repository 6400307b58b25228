//! rANS Nx16, the CRAM 3.1 static-model codec.
//!
//! Payload layout after the container header:
//!
//! ```text
//! RLE:      [uint7 meta_len<<1 | raw][uint7 literal count]
//!           raw:        [meta]
//!           compressed: [uint7 clen][order-0 4-way stream of meta]
//! CAT:      [bytes]
//! order-0:  [table][N x u32 states][renormalisation words]
//! order-1:  [shift<<4 | compressed][table or packed table][states][words]
//! ```
//!
//! Nested streams (compressed RLE metadata and compressed order-1 tables)
//! are bare order-0 4-way streams: a table, four states and the words, with
//! no flags byte.

use std::borrow::Cow;

use crate::config::CodecConfig;
use crate::container::{self, EntropyStage};
use crate::cursor::{put_len, ByteReader};
use crate::error::{Error, Result};
use crate::flags::{Family, FormatFlags, Order};
use crate::freq;
use crate::rans::{self, ContextArena, ContextTable, Word, TOTAL_FREQ_SHIFT};
use crate::transform::{self, RleSplit};

/// Lanes of the nested order-0 streams.
const NESTED_LANES: usize = 4;

/// rANS Nx16 engine.
///
/// Holds the per-context tables between calls; every call resets them, so
/// one engine can serve any number of sequential calls. Use one engine per
/// thread.
#[derive(Debug, Default)]
pub struct RansNx16 {
    config: CodecConfig,
    arena: ContextArena,
    table: ContextTable,
}

impl RansNx16 {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with `config`.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Compress `data` as requested by `flags`.
    ///
    /// Transforms that would not apply (PACK with more than 16 symbols, RLE
    /// with no repeated symbols) are dropped from the flags byte.
    ///
    /// # Errors
    /// `Error::Unsupported` if `flags` requests external compression.
    pub fn compress(&mut self, data: &[u8], flags: FormatFlags) -> Result<Vec<u8>> {
        container::compress(self, data, flags, 0)
    }

    /// Decompress a stream that records its size.
    pub fn uncompress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        container::uncompress(self, data, None, 0)
    }

    /// Decompress a stream, supplying the size for streams written with the
    /// no-size flag.
    pub fn uncompress_with_len(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        container::uncompress(self, data, Some(len), 0)
    }

    fn encode_order0(&mut self, data: &[u8], lanes: usize, out: &mut Vec<u8>) -> Result<()> {
        let freqs = freq::write_order0_nx16(&freq::byte_counts(data), out)?;
        self.table.load(&freqs, TOTAL_FREQ_SHIFT, false)?;
        out.extend(rans::encode_order0::<Word>(data, &self.table, lanes)?);
        Ok(())
    }

    fn decode_order0(&mut self, input: &mut ByteReader<'_>, lanes: usize, len: usize) -> Result<Vec<u8>> {
        let freqs = freq::read_order0_nx16(input)?;
        self.table.load(&freqs, TOTAL_FREQ_SHIFT, true)?;
        rans::decode_order0::<Word>(input, &self.table, lanes, len)
    }

    fn encode_order1(&mut self, data: &[u8], lanes: usize, out: &mut Vec<u8>) -> Result<()> {
        let shift = self.config.check_order1_shift()?;
        let mut table = Vec::new();
        let rows = freq::write_order1_nx16(&rans::order1_counts(data, lanes), shift, &mut table)?;

        let mut packed = Vec::new();
        self.encode_order0(&table, NESTED_LANES, &mut packed)?;
        let header = (shift << 4) as u8;
        if packed.len() < table.len() {
            out.push(header | 1);
            put_len(out, table.len())?;
            put_len(out, packed.len())?;
            out.extend_from_slice(&packed);
        } else {
            out.push(header);
            out.extend_from_slice(&table);
        }
        log::trace!(
            "order-1 table: {} bytes, {} packed",
            table.len(),
            packed.len()
        );

        self.arena.reset();
        for (ctx, row) in rows.iter().enumerate() {
            if row.iter().any(|&f| f > 0) {
                self.arena.table_mut(ctx as u8).load(row, shift, false)?;
            }
        }
        out.extend(rans::encode_order1::<Word>(data, &self.arena, lanes)?);
        Ok(())
    }

    fn decode_order1(&mut self, input: &mut ByteReader<'_>, lanes: usize, len: usize) -> Result<Vec<u8>> {
        let header = input.read_u8()?;
        let shift = u32::from(header >> 4);
        self.arena.reset();
        if header & 1 != 0 {
            let raw_len = input.read_len()?;
            let clen = input.read_len()?;
            self.config.check_output_len(raw_len)?;
            let mut packed = ByteReader::new(input.take(clen)?);
            let table = self.decode_order0(&mut packed, NESTED_LANES, raw_len)?;
            let arena = &mut self.arena;
            freq::read_order1_nx16(&mut ByteReader::new(&table), shift, |ctx, row| {
                arena.table_mut(ctx).load(row, shift, true)
            })?;
        } else {
            let arena = &mut self.arena;
            freq::read_order1_nx16(input, shift, |ctx, row| arena.table_mut(ctx).load(row, shift, true))?;
        }
        rans::decode_order1::<Word>(input, &self.arena, lanes, len)
    }

    fn write_rle_meta(&mut self, split: &RleSplit, out: &mut Vec<u8>) -> Result<()> {
        let mut packed = Vec::new();
        self.encode_order0(&split.meta, NESTED_LANES, &mut packed)?;
        if packed.len() < split.meta.len() {
            put_len(out, split.meta.len() << 1)?;
            put_len(out, split.literals.len())?;
            put_len(out, packed.len())?;
            out.extend_from_slice(&packed);
        } else {
            put_len(out, (split.meta.len() << 1) | 1)?;
            put_len(out, split.literals.len())?;
            out.extend_from_slice(&split.meta);
        }
        Ok(())
    }

    /// Returns the literal count and the run metadata.
    fn read_rle_meta<'a>(&mut self, input: &mut ByteReader<'a>, len: usize) -> Result<(usize, Cow<'a, [u8]>)> {
        let field = input.read_len()?;
        let literals = input.read_len()?;
        if literals > len {
            return Err(Error::Malformed("more literals than output"));
        }
        let meta_len = field >> 1;
        let meta = if field & 1 != 0 {
            Cow::Borrowed(input.take(meta_len)?)
        } else {
            let clen = input.read_len()?;
            self.config.check_output_len(meta_len)?;
            let mut packed = ByteReader::new(input.take(clen)?);
            Cow::Owned(self.decode_order0(&mut packed, NESTED_LANES, meta_len)?)
        };
        Ok((literals, meta))
    }
}

impl EntropyStage for RansNx16 {
    const FAMILY: Family = Family::RansNx16;

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn encode_payload(&mut self, data: &[u8], flags: &mut FormatFlags, out: &mut Vec<u8>) -> Result<()> {
        let split;
        let mut body = data;
        if flags.rle {
            let chosen = transform::rle_candidates(data);
            if chosen.iter().any(|&c| c) {
                split = transform::rle_split(data, &chosen)?;
                self.write_rle_meta(&split, out)?;
                body = &split.literals;
            } else {
                log::trace!("rle: no symbol repeats enough, dropped");
                flags.rle = false;
            }
        }

        if flags.cat {
            out.extend_from_slice(body);
            return Ok(());
        }
        let lanes = flags.interleave.lanes();
        match flags.order {
            Order::Zero => self.encode_order0(body, lanes, out),
            Order::One => self.encode_order1(body, lanes, out),
        }
    }

    fn decode_payload(&mut self, input: &mut ByteReader<'_>, flags: &FormatFlags, len: usize) -> Result<Vec<u8>> {
        let (body_len, meta) = if flags.rle {
            let (literals, meta) = self.read_rle_meta(input, len)?;
            (literals, Some(meta))
        } else {
            (len, None)
        };

        let lanes = flags.interleave.lanes();
        let body = if flags.cat {
            container::read_cat(input, body_len)?
        } else {
            match flags.order {
                Order::Zero => self.decode_order0(input, lanes, body_len)?,
                Order::One => self.decode_order1(input, lanes, body_len)?,
            }
        };

        match meta {
            Some(meta) => transform::rle_expand(&body, &mut ByteReader::new(&meta), len),
            None => Ok(body),
        }
    }
}
