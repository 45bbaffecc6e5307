use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pisa_arith::{mont_mul, mul_mod, pow_mod, to_montgomery, BarrettRatio};

fn bench_operations(c: &mut Criterion) {
    let m = 1_070_727_169u32;

    c.bench_function("mul_mod::<u32>", |b| {
        b.iter(|| mul_mod(black_box(652_921_501u32), black_box(652_921_500), black_box(m)))
    });

    c.bench_function("barrett_ratio::<u32>", |b| {
        b.iter(|| BarrettRatio::new(black_box(m)))
    });

    c.bench_function("pow_mod::<u32>", |b| {
        b.iter(|| pow_mod(black_box(3u32), black_box(65_537u32), black_box(m)))
    });

    c.bench_function("mont_mul", |b| {
        let x = to_montgomery(166_645_782, m);
        let y = to_montgomery(378_454_820, m);
        b.iter(|| mont_mul(black_box(x), black_box(y), black_box(m)))
    });
}

criterion_group!(benches, bench_operations);
criterion_main!(benches);
