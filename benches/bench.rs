use bowclass::{DescriptorPool, Growth, HistogramEncoder, KMeans, Normalization, Vocabulary};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random descriptors for `images` images of `per_image` rows each.
fn pooled(images: usize, per_image: usize, dim: usize) -> bowclass::PooledDescriptors {
    let mut rng = StdRng::seed_from_u64(42);
    let mut pool = DescriptorPool::reserve(images * per_image, dim, Growth::Fixed);
    for _ in 0..images {
        let rows: Vec<f32> = (0..per_image * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        pool.append(&rows).unwrap();
    }
    pool.finalize()
}

/// Benchmark for Vocabulary::quantize() and HistogramEncoder::encode()
fn bench_bow(c: &mut Criterion) {
    let pool = pooled(20, 200, 32);
    let kmeans = KMeans {
        seed: Some(1),
        ..KMeans::default()
    };
    let voc = Vocabulary::build(&pool, 64, &kmeans).unwrap();
    let query: Vec<f32> = pool.as_slice()[..200 * 32].to_vec();
    let encoder = HistogramEncoder::new(64, Normalization::default());

    c.bench_function("quantize_200x32_k64", |b| {
        b.iter(|| voc.quantize(black_box(&query)).unwrap())
    });
    c.bench_function("encode_range_200", |b| {
        b.iter(|| encoder.encode(black_box(voc.assignment()), 200..400).unwrap())
    });
}

fn bench_kmeans(c: &mut Criterion) {
    let pool = pooled(10, 100, 32);
    let kmeans = KMeans {
        seed: Some(7),
        ..KMeans::default()
    };
    let mut group = c.benchmark_group("vocabulary");
    group.sample_size(10);
    group.bench_function("build_1000x32_k32", |b| {
        b.iter(|| Vocabulary::build(black_box(&pool), 32, &kmeans).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_bow, bench_kmeans);
criterion_main!(benches);
