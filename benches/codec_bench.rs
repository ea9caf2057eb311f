use criterion::{black_box, criterion_group, criterion_main, Criterion};
use haystore::{decode_needle, encode_needle};

fn bench_codec(c: &mut Criterion) {
    let data = vec![0x5Au8; 64 * 1024];

    c.bench_function("encode_needle_64kb", |b| {
        b.iter(|| encode_needle(black_box(1), black_box(0), black_box(&data)))
    });

    let encoded = encode_needle(1, 0, &data);
    c.bench_function("decode_needle_64kb", |b| {
        b.iter(|| decode_needle(black_box(&encoded)).unwrap())
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
