#![no_main]
use cram_entropy::{CodecConfig, FormatFlags, Interleave, Order, Rans4x8, RangeCodec, RansNx16};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (Vec<u8>, u8)| {
    let (input, bits) = data;
    let order = if bits & 0x01 != 0 { Order::One } else { Order::Zero };
    let flags = FormatFlags::new()
        .order(order)
        .stripe(bits & 0x08 != 0)
        .cat(bits & 0x20 != 0)
        .rle(bits & 0x40 != 0)
        .pack(bits & 0x80 != 0);

    let nx16_flags = flags.interleave(if bits & 0x04 != 0 {
        Interleave::ThirtyTwo
    } else {
        Interleave::Four
    });
    let mut nx16 = RansNx16::new();
    let stream = nx16.compress(&input, nx16_flags).unwrap();
    assert_eq!(nx16.uncompress(&stream).unwrap(), input);

    let mut arith = RangeCodec::new();
    let stream = arith.compress(&input, flags).unwrap();
    assert_eq!(arith.uncompress(&stream).unwrap(), input);

    let mut r4x8 = Rans4x8::new();
    let stream = r4x8.compress(&input, order).unwrap();
    assert_eq!(r4x8.uncompress(&stream).unwrap(), input);

    // Arbitrary bytes must decode or fail, never panic.
    let config = CodecConfig::default().with_max_output_len(1 << 20);
    let _ = RansNx16::with_config(config.clone()).uncompress(&input);
    let _ = RangeCodec::with_config(config.clone()).uncompress(&input);
    let _ = Rans4x8::with_config(config).uncompress(&input);
});
