//! Byte-level transforms applied around the entropy coders.
//!
//! - **RLE** splits a buffer into a literal stream and a metadata stream of
//!   run lengths for a chosen set of symbols.
//! - **Stripe** deals bytes round-robin into K sub-streams (`data[i*K + j]`
//!   goes to sub-stream `j`) and transposes them back.
//! - **Pack** stores up to 16 distinct symbols in 4, 2, 1 or 0 bits each,
//!   low bits first, behind a small symbol map.

use crate::cursor::{put_len, ByteReader};
use crate::error::{Error, Result};

/// Pick the symbols that shrink when run-length coded.
///
/// Every repeat of the previous byte saves one literal; every run that is
/// started costs one run-length entry.
pub fn rle_candidates(data: &[u8]) -> [bool; 256] {
    let mut saved = [0i64; 256];
    let mut last = None;
    for &b in data {
        if last == Some(b) {
            saved[b as usize] += 1;
        } else {
            saved[b as usize] -= 1;
            last = Some(b);
        }
    }
    let mut chosen = [false; 256];
    for (c, &s) in chosen.iter_mut().zip(&saved) {
        *c = s > 0;
    }
    chosen
}

/// Run-length split of a buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RleSplit {
    /// One byte per run of a chosen symbol, every other byte verbatim.
    pub literals: Vec<u8>,
    /// `[n (0 = 256)][symbols][uint7 run - 1 ...]`.
    pub meta: Vec<u8>,
}

/// Split `data` into literals and run metadata for the symbols in `chosen`.
///
/// # Errors
/// Returns `Error::Unsupported` if `chosen` is empty: a symbol count of 0
/// stands for all 256 symbols.
pub fn rle_split(data: &[u8], chosen: &[bool; 256]) -> Result<RleSplit> {
    let symbols: Vec<u8> = (0..=255u8).filter(|&s| chosen[s as usize]).collect();
    if symbols.is_empty() {
        return Err(Error::Unsupported("rle needs at least one run symbol"));
    }
    let mut meta = Vec::with_capacity(symbols.len() + 1 + data.len() / 4);
    meta.push(symbols.len() as u8);
    meta.extend_from_slice(&symbols);

    let mut literals = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let sym = data[i];
        literals.push(sym);
        if chosen[sym as usize] {
            let run = data[i + 1..].iter().take_while(|&&b| b == sym).count();
            put_len(&mut meta, run)?;
            i += run;
        }
        i += 1;
    }
    log::trace!(
        "rle: {} symbols, {} -> {} literals, {} meta bytes",
        symbols.len(),
        data.len(),
        literals.len(),
        meta.len()
    );
    Ok(RleSplit { literals, meta })
}

/// Read the symbol set at the head of RLE metadata, leaving `meta` at the
/// first run length.
pub fn rle_read_symbols(meta: &mut ByteReader<'_>) -> Result<[bool; 256]> {
    let n = match meta.read_u8()? {
        0 => 256,
        n => usize::from(n),
    };
    let mut chosen = [false; 256];
    for &s in meta.take(n)? {
        chosen[s as usize] = true;
    }
    Ok(chosen)
}

/// Expand literals back to `len` bytes, taking run lengths from `meta`.
pub fn rle_expand(literals: &[u8], meta: &mut ByteReader<'_>, len: usize) -> Result<Vec<u8>> {
    let chosen = rle_read_symbols(meta)?;
    let mut out = Vec::with_capacity(len);
    for &sym in literals {
        let copies = if chosen[sym as usize] {
            meta.read_len()?.saturating_add(1)
        } else {
            1
        };
        if copies > len - out.len() {
            return Err(Error::Malformed("run overflows output"));
        }
        out.resize(out.len() + copies, sym);
    }
    if out.len() != len {
        return Err(Error::Malformed("runs fall short of output"));
    }
    Ok(out)
}

/// Uncompressed length of stripe `j` out of `ways` for a `total`-byte buffer.
#[inline]
pub fn stripe_len(total: usize, ways: usize, j: usize) -> usize {
    total / ways + usize::from(j < total % ways)
}

/// Deal `data` into `ways` sub-streams.
pub fn stripe_split(data: &[u8], ways: usize) -> Vec<Vec<u8>> {
    (0..ways)
        .map(|j| data.iter().skip(j).step_by(ways).copied().collect())
        .collect()
}

/// Interleave sub-streams back into one buffer of `total` bytes.
pub fn stripe_join(parts: &[Vec<u8>], total: usize) -> Result<Vec<u8>> {
    let ways = parts.len();
    if ways == 0 {
        return Err(Error::Malformed("zero stripes"));
    }
    let mut out = vec![0u8; total];
    for (j, part) in parts.iter().enumerate() {
        if part.len() != stripe_len(total, ways, j) {
            return Err(Error::Malformed("stripe length mismatch"));
        }
        for (slot, &b) in out.iter_mut().skip(j).step_by(ways).zip(part) {
            *slot = b;
        }
    }
    Ok(out)
}

/// Symbol map of a packed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackMap {
    symbols: Vec<u8>,
}

impl PackMap {
    /// Bits per packed symbol.
    pub fn bits(&self) -> u32 {
        match self.symbols.len() {
            0 | 1 => 0,
            2 => 1,
            3 | 4 => 2,
            _ => 4,
        }
    }

    /// Packed size of `len` symbols.
    pub fn packed_len(&self, len: usize) -> usize {
        match self.bits() {
            0 => 0,
            bits => {
                let per_byte = (8 / bits) as usize;
                len.div_ceil(per_byte)
            }
        }
    }

    /// Symbols in code order.
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Append `[n][symbols]`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(self.symbols.len() as u8);
        out.extend_from_slice(&self.symbols);
    }

    /// Parse `[n (0 = 256)][symbols]`; maps above 16 symbols are malformed.
    pub fn read(input: &mut ByteReader<'_>) -> Result<Self> {
        let n = match input.read_u8()? {
            0 => 256,
            n => usize::from(n),
        };
        let symbols = input.take(n)?.to_vec();
        if n > 16 {
            return Err(Error::Malformed("pack map above 16 symbols"));
        }
        Ok(Self { symbols })
    }

    /// Expand `packed` into `len` symbols.
    pub fn unpack(&self, packed: &[u8], len: usize) -> Result<Vec<u8>> {
        if packed.len() != self.packed_len(len) {
            return Err(Error::Malformed("packed length does not match output"));
        }
        let bits = self.bits();
        if bits == 0 {
            let fill = self.symbols.first().copied().unwrap_or(0);
            return Ok(vec![fill; len]);
        }
        let per_byte = (8 / bits) as usize;
        let mask = (1u8 << bits) - 1;
        let mut out = Vec::with_capacity(len);
        for &byte in packed {
            for k in 0..per_byte {
                if out.len() == len {
                    break;
                }
                let code = (byte >> (k as u32 * bits)) & mask;
                let sym = self
                    .symbols
                    .get(code as usize)
                    .copied()
                    .ok_or(Error::Malformed("packed code outside symbol map"))?;
                out.push(sym);
            }
        }
        Ok(out)
    }
}

/// Pack `data` if it uses at most 16 distinct symbols.
pub fn pack(data: &[u8]) -> Option<(PackMap, Vec<u8>)> {
    let mut seen = [false; 256];
    for &b in data {
        seen[b as usize] = true;
    }
    let mut symbols = Vec::new();
    let mut codes = [0u8; 256];
    for (sym, &present) in seen.iter().enumerate() {
        if present {
            if symbols.len() == 16 {
                return None;
            }
            codes[sym] = symbols.len() as u8;
            symbols.push(sym as u8);
        }
    }
    let map = PackMap { symbols };
    let bits = map.bits();
    if bits == 0 {
        return Some((map, Vec::new()));
    }
    let per_byte = (8 / bits) as usize;
    let packed = data
        .chunks(per_byte)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (k, &b)| acc | (codes[b as usize] << (k as u32 * bits)))
        })
        .collect();
    Some((map, packed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rle_candidates() {
        let chosen = rle_candidates(b"aaaabcbcbczzz");
        assert!(chosen[b'a' as usize]);
        assert!(chosen[b'z' as usize]);
        assert!(!chosen[b'b' as usize]);
        assert!(!chosen[b'c' as usize]);
    }

    #[test]
    fn test_rle_layout() {
        let mut chosen = [false; 256];
        chosen[b'A' as usize] = true;
        let split = rle_split(b"AAAAxA", &chosen).unwrap();
        assert_eq!(split.literals, b"AxA");
        assert_eq!(split.meta, [1, b'A', 3, 0]);

        let out = rle_expand(&split.literals, &mut ByteReader::new(&split.meta), 6).unwrap();
        assert_eq!(out, b"AAAAxA");
    }

    #[test]
    fn test_rle_split_needs_a_symbol() {
        assert!(matches!(
            rle_split(b"abc", &[false; 256]),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(rle_split(&[], &[false; 256]), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_rle_single_value_thousand() {
        let data = vec![7u8; 1000];
        let split = rle_split(&data, &rle_candidates(&data)).unwrap();
        assert_eq!(split.literals, [7]);
        assert_eq!(split.meta, [1, 7, 0x87, 0x67]);
    }

    #[test]
    fn test_rle_expand_guards() {
        let meta = [1, b'A', 10];
        assert!(matches!(
            rle_expand(b"A", &mut ByteReader::new(&meta), 5),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            rle_expand(b"A", &mut ByteReader::new(&meta), 20),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            rle_expand(b"A", &mut ByteReader::new(&[1, b'A']), 2),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_stripe_lengths() {
        let lens: Vec<usize> = (0..4).map(|j| stripe_len(10, 4, j)).collect();
        assert_eq!(lens, [3, 3, 2, 2]);
        let parts = stripe_split(b"0123456789", 4);
        assert_eq!(parts[0], b"048");
        assert_eq!(parts[3], b"37");
        assert_eq!(stripe_join(&parts, 10).unwrap(), b"0123456789");
        assert!(stripe_join(&parts, 11).is_err());
    }

    #[test]
    fn test_pack_layout() {
        let (map, packed) = pack(b"ACGTTGCA").unwrap();
        assert_eq!(map.symbols(), b"ACGT");
        assert_eq!(map.bits(), 2);
        // Codes 0,1,2,3 then 3,2,1,0, low bits first.
        assert_eq!(packed, [0b1110_0100, 0b0001_1011]);
        assert_eq!(map.unpack(&packed, 8).unwrap(), b"ACGTTGCA");
    }

    #[test]
    fn test_pack_widths() {
        let (map, packed) = pack(b"xxxx").unwrap();
        assert_eq!((map.bits(), packed.len()), (0, 0));
        assert_eq!(map.unpack(&[], 4).unwrap(), b"xxxx");

        let (map, packed) = pack(b"ababababa").unwrap();
        assert_eq!((map.bits(), packed.len()), (1, 2));

        let data: Vec<u8> = (0..16).collect();
        let (map, packed) = pack(&data).unwrap();
        assert_eq!((map.bits(), packed.len()), (4, 8));

        let data: Vec<u8> = (0..17).collect();
        assert!(pack(&data).is_none());
    }

    #[test]
    fn test_pack_map_read() {
        let mut out = Vec::new();
        PackMap { symbols: vec![3, 9] }.write(&mut out);
        assert_eq!(out, [2, 3, 9]);
        let map = PackMap::read(&mut ByteReader::new(&out)).unwrap();
        assert_eq!(map.symbols(), [3, 9]);

        let wide: Vec<u8> = std::iter::once(17).chain(0..17).collect();
        assert!(matches!(
            PackMap::read(&mut ByteReader::new(&wide)),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_unpack_code_outside_map() {
        let map = PackMap { symbols: vec![1, 2, 3] };
        assert!(matches!(map.unpack(&[0xff], 4), Err(Error::Malformed(_))));
    }

    proptest! {
        #[test]
        fn prop_rle_inverse(data in prop::collection::vec(0u8..4, 0..800)) {
            let chosen = rle_candidates(&data);
            prop_assume!(chosen.iter().any(|&c| c));
            let split = rle_split(&data, &chosen).unwrap();
            let out = rle_expand(&split.literals, &mut ByteReader::new(&split.meta), data.len()).unwrap();
            prop_assert_eq!(out, data);
        }

        #[test]
        fn prop_stripe_inverse(data in prop::collection::vec(any::<u8>(), 0..300), ways in 1usize..9) {
            prop_assert_eq!(stripe_join(&stripe_split(&data, ways), data.len()).unwrap(), data);
        }

        #[test]
        fn prop_pack_inverse(data in prop::collection::vec(0u8..16, 0..300), spread in 1u8..16) {
            let data: Vec<u8> = data.iter().map(|&b| b.wrapping_mul(spread)).collect();
            if let Some((map, packed)) = pack(&data) {
                prop_assert_eq!(packed.len(), map.packed_len(data.len()));
                prop_assert_eq!(map.unpack(&packed, data.len()).unwrap(), data);
            }
        }
    }
}
