//! Tight encode/decode loop for profiling with a flamegraph tool.

use cram_entropy::{FormatFlags, Interleave, Order, RansNx16};

fn main() -> cram_entropy::Result<()> {
    let input: Vec<u8> = (0..100_000u32).map(|i| b"IIIIHHG#"[(i * i % 8) as usize]).collect();
    let flags = FormatFlags::new().order(Order::One).interleave(Interleave::ThirtyTwo);
    let mut codec = RansNx16::new();

    for _ in 0..200 {
        let stream = codec.compress(&input, flags)?;
        let output = codec.uncompress(&stream)?;
        assert_eq!(output.len(), input.len());
    }
    Ok(())
}
