use cram_entropy::cursor::ByteReader;
use cram_entropy::rans::{Byte, Renorm, Word};
use cram_entropy::{CodecConfig, FormatFlags, Interleave, Order, Rans4x8, RangeCodec, RansNx16};
use cram_entropy::{InterleavedRansDecoder, InterleavedRansEncoder};
use proptest::prelude::*;

/// Three symbols at 50%, 25% and 25% of a power-of-two total.
fn three_symbols(total_bits: u32) -> [(u32, u32); 3] {
    let total = 1u32 << total_bits;
    [(0, total / 2), (total / 2, total / 4), (total / 2 + total / 4, total / 4)]
}

fn lane_roundtrip<R: Renorm>(input: &[u32], lanes: usize, total_bits: u32) -> Vec<u32> {
    let symbols = three_symbols(total_bits);
    let mut encoder = InterleavedRansEncoder::<R>::new(lanes);
    for (i, &sym) in input.iter().enumerate().rev() {
        let (cum_freq, freq) = symbols[sym as usize];
        encoder.encode(i % lanes, cum_freq, freq, total_bits).unwrap();
    }
    let stream = encoder.finish();

    let mut reader = ByteReader::new(&stream);
    let mut decoder = InterleavedRansDecoder::<R>::new(lanes, &mut reader).unwrap();
    let mut output = Vec::with_capacity(input.len());
    for i in 0..input.len() {
        let lane = i % lanes;
        let cf = decoder.get_cum_freq(lane, total_bits);
        let sym = symbols.iter().rposition(|&(start, _)| start <= cf).unwrap();
        let (cum_freq, freq) = symbols[sym];
        decoder.decode(lane, cum_freq, freq, total_bits).unwrap();
        output.push(sym as u32);
    }
    decoder.finish().unwrap();
    output
}

/// Small alphabets with runs, like quality or base streams.
fn genomic_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec((prop::sample::select(b"ACGTN#I".to_vec()), 1..20usize), 0..200)
        .prop_map(|runs| runs.into_iter().flat_map(|(b, n)| std::iter::repeat(b).take(n)).collect())
}

fn any_input() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![genomic_bytes(), prop::collection::vec(any::<u8>(), 0..600)]
}

fn flags_from(bits: u8) -> FormatFlags {
    FormatFlags::new()
        .order(if bits & 0x01 != 0 { Order::One } else { Order::Zero })
        .stripe(bits & 0x08 != 0)
        .cat(bits & 0x20 != 0)
        .rle(bits & 0x40 != 0)
        .pack(bits & 0x80 != 0)
}

proptest! {
    #[test]
    fn test_rans_lanes_roundtrip(
        input in prop::collection::vec(0..3u32, 1..100),
        total_bits in 8..=12u32,
        lanes in prop::sample::select(vec![1usize, 4, 32]),
    ) {
        prop_assert_eq!(lane_roundtrip::<Byte>(&input, lanes, total_bits), input.clone());
        prop_assert_eq!(lane_roundtrip::<Word>(&input, lanes, total_bits), input);
    }

    #[test]
    fn test_nx16_roundtrip(input in any_input(), bits in any::<u8>()) {
        let interleave = if bits & 0x04 != 0 { Interleave::ThirtyTwo } else { Interleave::Four };
        let mut codec = RansNx16::new();
        let stream = codec.compress(&input, flags_from(bits).interleave(interleave)).unwrap();
        prop_assert_eq!(codec.uncompress(&stream).unwrap(), input);
    }

    #[test]
    fn test_nx16_no_size_roundtrip(input in genomic_bytes(), bits in any::<u8>()) {
        let mut codec = RansNx16::new();
        let stream = codec.compress(&input, flags_from(bits).no_size(true)).unwrap();
        prop_assert_eq!(codec.uncompress_with_len(&stream, input.len()).unwrap(), input);
    }

    #[test]
    fn test_range_codec_roundtrip(input in any_input(), bits in any::<u8>()) {
        let mut codec = RangeCodec::new();
        let stream = codec.compress(&input, flags_from(bits)).unwrap();
        prop_assert_eq!(codec.uncompress(&stream).unwrap(), input);
    }

    #[test]
    fn test_rans4x8_roundtrip(input in any_input(), order_one in any::<bool>()) {
        let order = if order_one { Order::One } else { Order::Zero };
        let mut codec = Rans4x8::new();
        let stream = codec.compress(&input, order).unwrap();
        prop_assert_eq!(codec.uncompress(&stream).unwrap(), input);
    }

    #[test]
    fn test_decoders_reject_garbage_without_panicking(data in prop::collection::vec(any::<u8>(), 0..300)) {
        // Keep declared sizes small so adaptive models cannot spin on long outputs.
        let config = CodecConfig::default().with_max_output_len(1 << 16);
        let _ = RansNx16::with_config(config.clone()).uncompress(&data);
        let _ = RansNx16::with_config(config.clone()).uncompress_with_len(&data, 100);
        let _ = RangeCodec::with_config(config.clone()).uncompress(&data);
        let _ = Rans4x8::with_config(config).uncompress(&data);
    }

    #[test]
    fn test_corrupted_streams_never_panic(input in genomic_bytes(), bits in any::<u8>(), at in any::<usize>(), xor in 1..=255u8) {
        let mut codec = RansNx16::new();
        let mut stream = codec.compress(&input, flags_from(bits)).unwrap();
        if !stream.is_empty() {
            let i = at % stream.len();
            stream[i] ^= xor;
            let _ = codec.uncompress(&stream);
        }
    }
}
