//! The flagged container format shared by rANS Nx16 and the range codec.
//!
//! ```text
//! [flags][uint7 size]?  stripe: [K][uint7 clen]*K [sub-stream]*K
//!                       else:   [pack map][uint7 packed len]? [payload]
//! ```
//!
//! The container owns everything up to the payload: flags, size, stripe
//! recursion and bit-packing. What the payload looks like (CAT, RLE,
//! order-0/1 bodies, external data) is up to the [`EntropyStage`] of each
//! family. Encoders may drop transforms that do not pay off; the flags
//! byte is written last so that it describes what was actually emitted.

use crate::config::CodecConfig;
use crate::cursor::{put_len, ByteReader};
use crate::error::{Error, Result};
use crate::flags::{Family, FormatFlags};
use crate::transform::{self, PackMap};

/// The family-specific part of a container: everything after the pack
/// header.
pub(crate) trait EntropyStage {
    /// Bit table of the flags byte.
    const FAMILY: Family;

    /// Limits and encoder knobs.
    fn config(&self) -> &CodecConfig;

    /// Append the payload for `data`, clearing any flag that was not applied.
    fn encode_payload(&mut self, data: &[u8], flags: &mut FormatFlags, out: &mut Vec<u8>) -> Result<()>;

    /// Decode a payload that expands to exactly `len` bytes.
    fn decode_payload(&mut self, input: &mut ByteReader<'_>, flags: &FormatFlags, len: usize) -> Result<Vec<u8>>;
}

/// Encode `data` as a container stream.
pub(crate) fn compress<S: EntropyStage>(
    stage: &mut S,
    data: &[u8],
    mut flags: FormatFlags,
    depth: usize,
) -> Result<Vec<u8>> {
    stage.config().check_depth(depth)?;
    // Reject flags the family cannot express before doing any work.
    flags.to_byte(S::FAMILY)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = vec![0u8];
    if !flags.no_size {
        put_len(&mut out, data.len())?;
    }

    if flags.stripe {
        encode_stripe(stage, data, flags, depth, &mut out)?;
        out[0] = flags.to_byte(S::FAMILY)?;
        return Ok(out);
    }

    let packed;
    let mut payload = data;
    if flags.pack {
        match transform::pack(data) {
            Some((map, bytes)) => {
                map.write(&mut out);
                put_len(&mut out, bytes.len())?;
                log::trace!("pack: {} symbols at {} bits", map.symbols().len(), map.bits());
                packed = bytes;
                payload = &packed;
            }
            None => {
                log::trace!("pack: more than 16 symbols, dropped");
                flags.pack = false;
            }
        }
    }

    if payload.is_empty() {
        flags.cat = true;
        flags.rle = false;
        flags.external = false;
    }
    stage.encode_payload(payload, &mut flags, &mut out)?;
    out[0] = flags.to_byte(S::FAMILY)?;

    log::debug!(
        "{:?} compress: flags {:#04x}, {} -> {} bytes",
        S::FAMILY,
        out[0],
        data.len(),
        out.len()
    );
    Ok(out)
}

fn encode_stripe<S: EntropyStage>(
    stage: &mut S,
    data: &[u8],
    flags: FormatFlags,
    depth: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    let ways = stage.config().stripe_ways;
    if ways == 0 {
        return Err(Error::Unsupported("stripe count must be non-zero"));
    }
    let sub_flags = flags.stripe(false).no_size(true);
    let mut streams = Vec::with_capacity(usize::from(ways));
    for part in transform::stripe_split(data, usize::from(ways)) {
        streams.push(compress(stage, &part, sub_flags, depth + 1)?);
    }
    out.push(ways);
    for stream in &streams {
        put_len(out, stream.len())?;
    }
    for stream in &streams {
        out.extend_from_slice(stream);
    }
    log::trace!("stripe: {} ways", ways);
    Ok(())
}

/// Decode a container stream. `len` is used only when the stream omits its
/// size.
pub(crate) fn uncompress<S: EntropyStage>(
    stage: &mut S,
    data: &[u8],
    len: Option<usize>,
    depth: usize,
) -> Result<Vec<u8>> {
    stage.config().check_depth(depth)?;
    if data.is_empty() {
        return match len {
            None | Some(0) => Ok(Vec::new()),
            Some(_) => Err(Error::Truncated { needed: 1 }),
        };
    }

    let mut input = ByteReader::new(data);
    let flags = FormatFlags::parse(input.read_u8()?, S::FAMILY)?;
    let len = if flags.no_size {
        len.ok_or(Error::Malformed("stream omits its size"))?
    } else {
        input.read_len()?
    };
    stage.config().check_output_len(len)?;
    log::debug!(
        "{:?} uncompress: flags {:#04x}, {} -> {} bytes",
        S::FAMILY,
        data[0],
        data.len(),
        len
    );

    if flags.stripe {
        return decode_stripe(stage, &mut input, len, depth);
    }

    let map = if flags.pack {
        let map = PackMap::read(&mut input)?;
        let packed_len = input.read_len()?;
        if packed_len != map.packed_len(len) {
            return Err(Error::Malformed("packed length does not match output"));
        }
        Some(map)
    } else {
        None
    };
    let body_len = map.as_ref().map_or(len, |m| m.packed_len(len));

    let body = stage.decode_payload(&mut input, &flags, body_len)?;
    match map {
        Some(map) => map.unpack(&body, len),
        None => Ok(body),
    }
}

fn decode_stripe<S: EntropyStage>(
    stage: &mut S,
    input: &mut ByteReader<'_>,
    len: usize,
    depth: usize,
) -> Result<Vec<u8>> {
    let ways = usize::from(input.read_u8()?);
    if ways == 0 {
        return Err(Error::Malformed("zero stripes"));
    }
    let clens = (0..ways)
        .map(|_| input.read_len())
        .collect::<Result<Vec<_>>>()?;
    let mut parts = Vec::with_capacity(ways);
    for (j, &clen) in clens.iter().enumerate() {
        let sub = input.take(clen)?;
        let ulen = transform::stripe_len(len, ways, j);
        parts.push(uncompress(stage, sub, Some(ulen), depth + 1)?);
    }
    transform::stripe_join(&parts, len)
}

/// Read a verbatim payload.
pub(crate) fn read_cat(input: &mut ByteReader<'_>, len: usize) -> Result<Vec<u8>> {
    Ok(input.take(len)?.to_vec())
}
