//! Frequency table serialisation and normalisation.
//!
//! Both rANS families describe sparse alphabets with the same trick: present
//! symbols are listed in ascending order, and whenever a listed symbol
//! directly follows its predecessor the next byte counts how many further
//! consecutive symbols are implied. A zero byte ends the list.
//!
//! The 4x8 codec interleaves each symbol's frequency with the list and stores
//! normalised totals. The Nx16 codec stores the alphabet first, then raw
//! frequencies that were scaled to a power of two and are shifted up to the
//! table total on read.

use crate::cursor::{put_uint7, ByteReader};
use crate::error::{Error, Result};
use crate::rans::{TOTAL_FREQ, TOTAL_FREQ_SHIFT};

/// Longest zero run written in an order-1 Nx16 row. Readers that take the
/// run count as a plain byte and readers that take it as a uint7 agree on
/// values below 128.
const MAX_ZERO_RUN: usize = 127;

/// Byte histogram.
pub fn byte_counts(data: &[u8]) -> [u32; 256] {
    let mut counts = [0u32; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

/// Scale non-zero counts so they sum to exactly `target`.
///
/// Each count is multiplied by a fixed-point `target / total`; results that
/// round to zero become 1 and the most frequent symbol absorbs the residual.
/// An all-zero table is left untouched.
pub fn normalise_ratio(freqs: &mut [u32; 256], target: u32) -> Result<()> {
    let total: u64 = freqs.iter().map(|&f| u64::from(f)).sum();
    if total == 0 {
        return Ok(());
    }
    let present = freqs.iter().filter(|&&f| f > 0).count() as u64;
    if present > u64::from(target) {
        return Err(Error::Unsupported("more symbols than frequency slots"));
    }

    let tr = (u64::from(target) << 31) / total + (1u64 << 30) / total;
    let mut max = 0;
    let mut max_sym = 0;
    let mut sum = 0u64;
    for (sym, f) in freqs.iter_mut().enumerate() {
        if *f == 0 {
            continue;
        }
        if *f > max {
            max = *f;
            max_sym = sym;
        }
        *f = ((u64::from(*f) * tr) >> 31).max(1) as u32;
        sum += u64::from(*f);
    }

    let target = u64::from(target);
    if sum < target {
        freqs[max_sym] += (target - sum) as u32;
    } else if sum > target {
        let mut excess = (sum - target) as u32;
        if freqs[max_sym] > excess {
            freqs[max_sym] -= excess;
        } else {
            // Too many symbols were forced up to 1; take from the largest.
            while excess > 0 {
                let (sym, f) = freqs
                    .iter()
                    .copied()
                    .enumerate()
                    .max_by_key(|&(_, f)| f)
                    .unwrap_or((0, 0));
                if f <= 1 {
                    return Err(Error::Unsupported("more symbols than frequency slots"));
                }
                let cut = (f - 1).min(excess);
                freqs[sym] -= cut;
                excess -= cut;
            }
        }
    }
    Ok(())
}

/// Shift frequencies up so they sum to exactly `1 << bits`.
///
/// The stored total must divide the target by a power of two. An all-zero
/// table is left untouched.
pub fn normalise_shift(freqs: &mut [u32; 256], bits: u32) -> Result<()> {
    let target = 1u64 << bits;
    let mut total: u64 = freqs.iter().map(|&f| u64::from(f)).sum();
    if total == 0 || total == target {
        return Ok(());
    }
    if total > target {
        return Err(Error::Malformed("frequency total above table size"));
    }
    let mut shift = 0;
    while total < target {
        total <<= 1;
        shift += 1;
    }
    if total != target {
        return Err(Error::Malformed("frequency total is not a power-of-two fraction"));
    }
    for f in freqs.iter_mut() {
        *f <<= shift;
    }
    Ok(())
}

/// Normalisation target used before storing Nx16 counts: the total rounded
/// up to a power of two, capped at `1 << bits`.
fn stored_total(total: u64, bits: u32) -> u32 {
    total.next_power_of_two().min(1u64 << bits) as u32
}

/// Write the run-compacted list of symbols with `present[s]` set, calling
/// `emit` after each symbol's marker (or implied position).
pub fn write_symbol_runs<F>(present: &[bool; 256], out: &mut Vec<u8>, mut emit: F) -> Result<()>
where
    F: FnMut(u8, &mut Vec<u8>) -> Result<()>,
{
    let mut rle = 0;
    for sym in 0..256 {
        if !present[sym] {
            continue;
        }
        if rle > 0 {
            rle -= 1;
        } else {
            out.push(sym as u8);
            if sym > 0 && present[sym - 1] {
                rle = present[sym + 1..].iter().take_while(|&&p| p).count();
                out.push(rle as u8);
            }
        }
        emit(sym as u8, out)?;
    }
    out.push(0);
    Ok(())
}

/// Read a list written by [`write_symbol_runs`], calling `visit` for each
/// symbol with the cursor positioned just after its marker.
pub fn read_symbol_runs<'a, F>(input: &mut ByteReader<'a>, mut visit: F) -> Result<()>
where
    F: FnMut(u8, &mut ByteReader<'a>) -> Result<()>,
{
    let mut sym = usize::from(input.read_u8()?);
    let mut rle = 0usize;
    loop {
        visit(sym as u8, input)?;
        let last = sym;
        if rle > 0 {
            rle -= 1;
            sym += 1;
            if sym > 255 {
                return Err(Error::Malformed("symbol run past 255"));
            }
        } else {
            sym = usize::from(input.read_u8()?);
            if sym == last + 1 {
                rle = usize::from(input.read_u8()?);
            } else if sym != 0 && sym <= last {
                return Err(Error::Malformed("symbols out of order"));
            }
        }
        if sym == 0 {
            return Ok(());
        }
    }
}

fn presence(freqs: &[u32; 256]) -> [bool; 256] {
    let mut present = [false; 256];
    for (p, &f) in present.iter_mut().zip(freqs) {
        *p = f > 0;
    }
    present
}

/// Write an Nx16 alphabet.
pub fn write_alphabet(present: &[bool; 256], out: &mut Vec<u8>) -> Result<()> {
    write_symbol_runs(present, out, |_, _| Ok(()))
}

/// Read an Nx16 alphabet.
pub fn read_alphabet(input: &mut ByteReader<'_>) -> Result<[bool; 256]> {
    let mut present = [false; 256];
    read_symbol_runs(input, |sym, _| {
        present[sym as usize] = true;
        Ok(())
    })?;
    Ok(present)
}

fn put_freq_nx16(out: &mut Vec<u8>, f: u32) {
    if f < 0x80 {
        out.push(f as u8);
    } else {
        out.push(0x80 | (f >> 7) as u8);
        out.push((f & 0x7f) as u8);
    }
}

fn read_freq_nx16(input: &mut ByteReader<'_>) -> Result<u32> {
    let b = u32::from(input.read_u8()?);
    if b < 0x80 {
        return Ok(b);
    }
    Ok(((b & 0x7f) << 7) | u32::from(input.read_u8()? & 0x7f))
}

fn put_freq_4x8(out: &mut Vec<u8>, f: u32) {
    if f < 0x80 {
        out.push(f as u8);
    } else {
        out.push(0x80 | (f >> 8) as u8);
        out.push(f as u8);
    }
}

fn read_freq_4x8(input: &mut ByteReader<'_>) -> Result<u32> {
    let b = u32::from(input.read_u8()?);
    if b < 0x80 {
        return Ok(b);
    }
    Ok(((b & 0x7f) << 8) | u32::from(input.read_u8()?))
}

/// Write an order-0 Nx16 table for `counts`; returns the frequencies the
/// decoder will reconstruct (summing to [`TOTAL_FREQ`]).
pub fn write_order0_nx16(counts: &[u32; 256], out: &mut Vec<u8>) -> Result<[u32; 256]> {
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    let mut freqs = *counts;
    normalise_ratio(&mut freqs, stored_total(total, TOTAL_FREQ_SHIFT))?;
    write_alphabet(&presence(&freqs), out)?;
    for &f in freqs.iter().filter(|&&f| f > 0) {
        put_freq_nx16(out, f);
    }
    normalise_shift(&mut freqs, TOTAL_FREQ_SHIFT)?;
    log::trace!(
        "order-0 Nx16 table: {} symbols, {} bytes",
        freqs.iter().filter(|&&f| f > 0).count(),
        out.len()
    );
    Ok(freqs)
}

/// Read an order-0 Nx16 table, scaled to [`TOTAL_FREQ`].
pub fn read_order0_nx16(input: &mut ByteReader<'_>) -> Result<[u32; 256]> {
    let present = read_alphabet(input)?;
    let mut freqs = [0u32; 256];
    for (f, _) in freqs.iter_mut().zip(present).filter(|&(_, p)| p) {
        *f = read_freq_nx16(input)?;
    }
    normalise_shift(&mut freqs, TOTAL_FREQ_SHIFT)?;
    Ok(freqs)
}

/// Write the alphabet and rows of an order-1 Nx16 table (without the leading
/// shift byte). Returns the reconstructed rows, indexed by context.
pub fn write_order1_nx16(counts: &[[u32; 256]], shift: u32, out: &mut Vec<u8>) -> Result<Vec<[u32; 256]>> {
    let mut present = [false; 256];
    present[0] = true;
    for (ctx, row) in counts.iter().enumerate() {
        for (sym, &c) in row.iter().enumerate() {
            if c > 0 {
                present[ctx] = true;
                present[sym] = true;
            }
        }
    }
    write_alphabet(&present, out)?;
    let columns: Vec<usize> = (0..256).filter(|&s| present[s]).collect();

    let mut rows = vec![[0u32; 256]; 256];
    for &ctx in &columns {
        let mut row = counts[ctx];
        let total: u64 = row.iter().map(|&c| u64::from(c)).sum();
        if total > 0 {
            normalise_ratio(&mut row, stored_total(total, shift))?;
        }

        let mut i = 0;
        while i < columns.len() {
            let f = row[columns[i]];
            put_uint7(out, f);
            i += 1;
            if f == 0 {
                let run = columns[i..]
                    .iter()
                    .take_while(|&&c| row[c] == 0)
                    .take(MAX_ZERO_RUN)
                    .count();
                put_uint7(out, run as u32);
                i += run;
            }
        }

        normalise_shift(&mut row, shift)?;
        rows[ctx] = row;
    }
    Ok(rows)
}

/// Read the alphabet and rows of an order-1 Nx16 table, handing each
/// context's row (scaled to `1 << shift`) to `load`.
pub fn read_order1_nx16<F>(input: &mut ByteReader<'_>, shift: u32, mut load: F) -> Result<()>
where
    F: FnMut(u8, &[u32; 256]) -> Result<()>,
{
    let present = read_alphabet(input)?;
    let columns: Vec<usize> = (0..256).filter(|&s| present[s]).collect();
    for &ctx in &columns {
        let mut row = [0u32; 256];
        let mut run = 0;
        for &col in &columns {
            if run > 0 {
                run -= 1;
                continue;
            }
            let f = input.read_uint7()?;
            if f == 0 {
                run = input.read_len()?;
            } else {
                row[col] = f;
            }
        }
        normalise_shift(&mut row, shift)?;
        load(ctx as u8, &row)?;
    }
    Ok(())
}

/// Write an order-0 4x8 table of already normalised frequencies.
pub fn write_order0_4x8(freqs: &[u32; 256], out: &mut Vec<u8>) -> Result<()> {
    write_symbol_runs(&presence(freqs), out, |sym, out| {
        put_freq_4x8(out, freqs[sym as usize]);
        Ok(())
    })
}

/// Read an order-0 4x8 table.
pub fn read_order0_4x8(input: &mut ByteReader<'_>) -> Result<[u32; 256]> {
    let mut freqs = [0u32; 256];
    read_symbol_runs(input, |sym, input| {
        freqs[sym as usize] = read_freq_4x8(input)?;
        Ok(())
    })?;
    Ok(freqs)
}

/// Write an order-1 4x8 table: a context list whose entries each carry an
/// order-0 table. Rows that are all zero are omitted.
pub fn write_order1_4x8(rows: &[[u32; 256]], out: &mut Vec<u8>) -> Result<()> {
    let mut present = [false; 256];
    for (p, row) in present.iter_mut().zip(rows) {
        *p = row.iter().any(|&f| f > 0);
    }
    write_symbol_runs(&present, out, |ctx, out| write_order0_4x8(&rows[ctx as usize], out))
}

/// Read an order-1 4x8 table, handing each context's row to `load`.
pub fn read_order1_4x8<F>(input: &mut ByteReader<'_>, mut load: F) -> Result<()>
where
    F: FnMut(u8, &[u32; 256]) -> Result<()>,
{
    read_symbol_runs(input, |ctx, input| {
        let row = read_order0_4x8(input)?;
        load(ctx, &row)
    })
}

/// Normalise counts for the 4x8 codec: exact ratio scaling to [`TOTAL_FREQ`].
pub fn normalise_4x8(counts: &[u32; 256]) -> Result<[u32; 256]> {
    let mut freqs = *counts;
    normalise_ratio(&mut freqs, TOTAL_FREQ)?;
    Ok(freqs)
}
