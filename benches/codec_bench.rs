use cram_entropy::rans::{ContextTable, Word, TOTAL_FREQ_SHIFT};
use cram_entropy::{FormatFlags, Interleave, Order, Rans4x8, RangeCodec, RansNx16};
use cram_entropy::{cursor::ByteReader, freq, rans};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Quality-score-like input: long plateaus with occasional dips.
fn qualities(len: usize) -> Vec<u8> {
    let mut x = 7u32;
    (0..len)
        .map(|i| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            match (x >> 16) % 16 {
                0 => b'#',
                1..=3 => b'5' + (i % 3) as u8,
                _ => b'I',
            }
        })
        .collect()
}

fn bench_interleaved(c: &mut Criterion) {
    let mut group = c.benchmark_group("rans_interleaved");
    let input = qualities(100_000);
    group.throughput(Throughput::Bytes(input.len() as u64));

    let mut freqs = freq::byte_counts(&input);
    freq::normalise_ratio(&mut freqs, 1 << TOTAL_FREQ_SHIFT).unwrap();
    let mut table = ContextTable::new();
    table.load(&freqs, TOTAL_FREQ_SHIFT, true).unwrap();

    for lanes in [4usize, 32] {
        group.bench_with_input(BenchmarkId::new("encode", lanes), &lanes, |b, &lanes| {
            b.iter(|| rans::encode_order0::<Word>(&input, &table, lanes).unwrap())
        });

        let stream = rans::encode_order0::<Word>(&input, &table, lanes).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", lanes), &lanes, |b, &lanes| {
            b.iter(|| {
                let mut reader = ByteReader::new(&stream);
                rans::decode_order0::<Word>(&mut reader, &table, lanes, input.len()).unwrap()
            })
        });
    }
}

fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codecs");
    let input = qualities(100_000);
    group.throughput(Throughput::Bytes(input.len() as u64));

    let mut nx16 = RansNx16::new();
    for (name, flags) in [
        ("nx16_o0", FormatFlags::new()),
        ("nx16_o1", FormatFlags::new().order(Order::One)),
        ("nx16_o1_x32", FormatFlags::new().order(Order::One).interleave(Interleave::ThirtyTwo)),
        ("nx16_rle_pack", FormatFlags::new().rle(true).pack(true)),
    ] {
        let stream = nx16.compress(&input, flags).unwrap();
        group.bench_function(BenchmarkId::new("compress", name), |b| {
            b.iter(|| nx16.compress(&input, flags).unwrap())
        });
        group.bench_function(BenchmarkId::new("uncompress", name), |b| {
            b.iter(|| nx16.uncompress(&stream).unwrap())
        });
    }

    let mut arith = RangeCodec::new();
    for (name, flags) in [
        ("arith_o0", FormatFlags::new()),
        ("arith_o1_rle", FormatFlags::new().order(Order::One).rle(true)),
    ] {
        let stream = arith.compress(&input, flags).unwrap();
        group.bench_function(BenchmarkId::new("compress", name), |b| {
            b.iter(|| arith.compress(&input, flags).unwrap())
        });
        group.bench_function(BenchmarkId::new("uncompress", name), |b| {
            b.iter(|| arith.uncompress(&stream).unwrap())
        });
    }

    let mut r4x8 = Rans4x8::new();
    let stream = r4x8.compress(&input, Order::One).unwrap();
    group.bench_function(BenchmarkId::new("uncompress", "4x8_o1"), |b| {
        b.iter(|| r4x8.uncompress(&stream).unwrap())
    });
}

criterion_group!(benches, bench_interleaved, bench_codecs);
criterion_main!(benches);
