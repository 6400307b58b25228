//! The CRAM 3.1 adaptive arithmetic codec.
//!
//! Shares the container (flags, size, stripe, pack) with rANS Nx16. The
//! payload is CAT bytes, an external compressor's output, or a range coded
//! body:
//!
//! ```text
//! [max symbol + 1 (0 = 256)][range coder bytes]
//! ```
//!
//! Literals are coded with one adaptive model (order 0) or one per previous
//! symbol (order 1). With RLE every literal is followed by its run length,
//! sent as parts of 0..=3 where 3 means "add and continue". The first part
//! uses a model selected by the literal, the second context 256 and every
//! later part context 257.

use std::fmt;

use crate::config::CodecConfig;
use crate::container::{self, EntropyStage};
use crate::cursor::ByteReader;
use crate::error::{Error, Result};
use crate::external::{self, ExternalCompressor};
use crate::flags::{Family, FormatFlags, Order};
use crate::model::FrequencyModel;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Run models: one per literal, then the two continuation contexts.
const RUN_MODELS: usize = 258;
const RUN_SYMBOLS: usize = 4;

/// Adaptive arithmetic codec engine.
pub struct RangeCodec {
    config: CodecConfig,
    external: Box<dyn ExternalCompressor + Send>,
}

impl fmt::Debug for RangeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeCodec")
            .field("config", &self.config)
            .field("external", &self.external.name())
            .finish()
    }
}

impl Default for RangeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeCodec {
    /// Create an engine with the default configuration and bzip2 (when
    /// built in) as the external compressor.
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Create an engine with `config`.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            external: external::default_compressor(),
        }
    }

    /// Replace the compressor used for streams with the EXT flag.
    pub fn with_external(mut self, external: Box<dyn ExternalCompressor + Send>) -> Self {
        self.external = external;
        self
    }

    /// Compress `data` as requested by `flags`.
    ///
    /// # Errors
    /// `Error::Unsupported` if `flags` asks for 32-way interleaving, or for
    /// external compression the configured compressor cannot encode.
    pub fn compress(&mut self, data: &[u8], flags: FormatFlags) -> Result<Vec<u8>> {
        container::compress(self, data, flags, 0)
    }

    /// Decompress a stream that records its size.
    pub fn uncompress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        container::uncompress(self, data, None, 0)
    }

    /// Decompress a stream, supplying the size for no-size streams.
    pub fn uncompress_with_len(&mut self, data: &[u8], len: usize) -> Result<Vec<u8>> {
        container::uncompress(self, data, Some(len), 0)
    }
}

impl EntropyStage for RangeCodec {
    const FAMILY: Family = Family::Range;

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn encode_payload(&mut self, data: &[u8], flags: &mut FormatFlags, out: &mut Vec<u8>) -> Result<()> {
        if flags.cat {
            out.extend_from_slice(data);
            return Ok(());
        }
        if flags.external {
            let packed = self.external.compress(data)?;
            log::trace!("{}: {} -> {} bytes", self.external.name(), data.len(), packed.len());
            out.extend(packed);
            return Ok(());
        }

        let max_sym = data.iter().max().map_or(1, |&m| usize::from(m) + 1);
        out.push(max_sym as u8);
        let mut rc = RangeEncoder::new();
        match (flags.rle, flags.order) {
            (false, Order::Zero) => encode_order0(data, max_sym, &mut rc)?,
            (false, Order::One) => encode_order1(data, max_sym, &mut rc)?,
            (true, order) => encode_rle(data, max_sym, order, &mut rc)?,
        }
        out.extend(rc.finish());
        Ok(())
    }

    fn decode_payload(&mut self, input: &mut ByteReader<'_>, flags: &FormatFlags, len: usize) -> Result<Vec<u8>> {
        if flags.cat {
            return container::read_cat(input, len);
        }
        if flags.external {
            let out = self.external.uncompress(input.rest(), len)?;
            if out.len() != len {
                return Err(Error::External(format!(
                    "{} produced {} bytes, expected {}",
                    self.external.name(),
                    out.len(),
                    len
                )));
            }
            return Ok(out);
        }

        let max_sym = match input.read_u8()? {
            0 => 256,
            n => usize::from(n),
        };
        let mut rc = RangeDecoder::new(input)?;
        match (flags.rle, flags.order) {
            (false, Order::Zero) => decode_order0(&mut rc, max_sym, len),
            (false, Order::One) => decode_order1(&mut rc, max_sym, len),
            (true, order) => decode_rle(&mut rc, max_sym, order, len),
        }
    }
}

fn literal_models(max_sym: usize, order: Order) -> Vec<FrequencyModel> {
    let contexts = match order {
        Order::Zero => 1,
        Order::One => max_sym,
    };
    vec![FrequencyModel::new(max_sym); contexts]
}

fn encode_order0(data: &[u8], max_sym: usize, rc: &mut RangeEncoder) -> Result<()> {
    let mut model = FrequencyModel::new(max_sym);
    for &b in data {
        model.encode(rc, b)?;
    }
    Ok(())
}

fn decode_order0(rc: &mut RangeDecoder<'_, '_>, max_sym: usize, len: usize) -> Result<Vec<u8>> {
    let mut model = FrequencyModel::new(max_sym);
    (0..len).map(|_| model.decode(rc)).collect()
}

fn encode_order1(data: &[u8], max_sym: usize, rc: &mut RangeEncoder) -> Result<()> {
    let mut models = literal_models(max_sym, Order::One);
    let mut last = 0;
    for &b in data {
        models[last].encode(rc, b)?;
        last = usize::from(b);
    }
    Ok(())
}

fn decode_order1(rc: &mut RangeDecoder<'_, '_>, max_sym: usize, len: usize) -> Result<Vec<u8>> {
    let mut models = literal_models(max_sym, Order::One);
    let mut out = Vec::with_capacity(len);
    let mut last = 0;
    for _ in 0..len {
        let b = models[last].decode(rc)?;
        out.push(b);
        last = usize::from(b);
    }
    Ok(out)
}

fn encode_rle(data: &[u8], max_sym: usize, order: Order, rc: &mut RangeEncoder) -> Result<()> {
    let mut literals = literal_models(max_sym, order);
    let mut runs = vec![FrequencyModel::new(RUN_SYMBOLS); RUN_MODELS];
    let mut last = 0;
    let mut i = 0;
    while i < data.len() {
        let sym = data[i];
        literals[last].encode(rc, sym)?;
        if order == Order::One {
            last = usize::from(sym);
        }

        let run = data[i + 1..].iter().take_while(|&&b| b == sym).count();
        let mut left = run;
        let mut ctx = usize::from(sym);
        loop {
            let part = left.min(3);
            runs[ctx].encode(rc, part as u8)?;
            left -= part;
            ctx = if ctx < 256 { 256 } else { 257 };
            if part != 3 {
                break;
            }
        }
        i += run + 1;
    }
    Ok(())
}

fn decode_rle(rc: &mut RangeDecoder<'_, '_>, max_sym: usize, order: Order, len: usize) -> Result<Vec<u8>> {
    let mut literals = literal_models(max_sym, order);
    let mut runs = vec![FrequencyModel::new(RUN_SYMBOLS); RUN_MODELS];
    let mut out = Vec::with_capacity(len);
    let mut last = 0;
    while out.len() < len {
        let sym = literals[last].decode(rc)?;
        if order == Order::One {
            last = usize::from(sym);
        }

        let room = len - out.len() - 1;
        let mut run = 0;
        let mut ctx = usize::from(sym);
        loop {
            let part = usize::from(runs[ctx].decode(rc)?);
            run += part;
            if run > room {
                return Err(Error::Malformed("run overflows output"));
            }
            ctx = if ctx < 256 { 256 } else { 257 };
            if part != 3 {
                break;
            }
        }
        out.resize(out.len() + run + 1, sym);
    }
    Ok(out)
}
