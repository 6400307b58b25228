//! rANS 4x8, the CRAM 3.0 static-model codec.
//!
//! ```text
//! [order: 0 | 1][u32 LE compressed length][u32 LE raw length]
//! [frequency table][4 x u32 LE states][renormalisation bytes]
//! ```
//!
//! The compressed length counts everything after the nine-byte header.
//! There are no transforms; four interleaved states with byte-wise
//! renormalisation and 12-bit tables.

use crate::config::CodecConfig;
use crate::cursor::ByteReader;
use crate::error::{Error, Result};
use crate::flags::Order;
use crate::freq;
use crate::rans::{self, Byte, ContextArena, ContextTable, TOTAL_FREQ_SHIFT};

const LANES: usize = 4;
const HEADER_LEN: usize = 9;

/// rANS 4x8 engine.
#[derive(Debug, Default)]
pub struct Rans4x8 {
    config: CodecConfig,
    arena: ContextArena,
    table: ContextTable,
}

impl Rans4x8 {
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

    /// Compress `data` with an order-0 or order-1 model.
    pub fn compress(&mut self, data: &[u8], order: Order) -> Result<Vec<u8>> {
        let raw_len = u32::try_from(data.len()).map_err(|_| Error::Unsupported("input above u32::MAX bytes"))?;
        let mut out = vec![0u8; HEADER_LEN];
        out[0] = match order {
            Order::Zero => 0,
            Order::One => 1,
        };
        out[5..9].copy_from_slice(&raw_len.to_le_bytes());

        if !data.is_empty() {
            match order {
                Order::Zero => self.encode_order0(data, &mut out)?,
                Order::One => self.encode_order1(data, &mut out)?,
            }
        }

        let body_len = u32::try_from(out.len() - HEADER_LEN)
            .map_err(|_| Error::Unsupported("compressed body above u32::MAX bytes"))?;
        out[1..5].copy_from_slice(&body_len.to_le_bytes());
        log::debug!("rANS 4x8 order {}: {} -> {} bytes", out[0], data.len(), out.len());
        Ok(out)
    }

    /// Decompress a stream.
    pub fn uncompress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut input = ByteReader::new(data);
        let order = match input.read_u8()? {
            0 => Order::Zero,
            1 => Order::One,
            _ => return Err(Error::Malformed("rANS 4x8 order above 1")),
        };
        let body_len = input.read_u32_le()? as usize;
        let len = input.read_u32_le()? as usize;
        self.config.check_output_len(len)?;
        log::debug!("rANS 4x8 order {:?}: {} -> {} bytes", order, data.len(), len);
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut body = ByteReader::new(input.take(body_len)?);
        match order {
            Order::Zero => {
                let freqs = freq::read_order0_4x8(&mut body)?;
                self.table.load(&freqs, TOTAL_FREQ_SHIFT, true)?;
                rans::decode_order0::<Byte>(&mut body, &self.table, LANES, len)
            }
            Order::One => {
                self.arena.reset();
                let arena = &mut self.arena;
                freq::read_order1_4x8(&mut body, |ctx, row| arena.table_mut(ctx).load(row, TOTAL_FREQ_SHIFT, true))?;
                rans::decode_order1::<Byte>(&mut body, &self.arena, LANES, len)
            }
        }
    }

    fn encode_order0(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let freqs = freq::normalise_4x8(&freq::byte_counts(data))?;
        freq::write_order0_4x8(&freqs, out)?;
        self.table.load(&freqs, TOTAL_FREQ_SHIFT, false)?;
        out.extend(rans::encode_order0::<Byte>(data, &self.table, LANES)?);
        Ok(())
    }

    fn encode_order1(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let mut rows = rans::order1_counts(data, LANES);
        self.arena.reset();
        for (ctx, row) in rows.iter_mut().enumerate() {
            if row.iter().any(|&c| c > 0) {
                *row = freq::normalise_4x8(row)?;
                self.arena.table_mut(ctx as u8).load(row, TOTAL_FREQ_SHIFT, false)?;
            }
        }
        freq::write_order1_4x8(&rows, out)?;
        out.extend(rans::encode_order1::<Byte>(data, &self.arena, LANES)?);
        Ok(())
    }
}
