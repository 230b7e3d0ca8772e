use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dumbvec_distance::{normalize, SimilarityMetric};
use dumbvec_index::top_k;
use dumbvec_types::{DumbIndex, FileEntry, IndexEntry, Reference};

fn random_unit_vector(dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rand::random::<f32>() - 0.5).collect();
    normalize(&v).unwrap_or(v)
}

fn random_index(len: usize, dim: usize) -> DumbIndex {
    let entries = (0..len)
        .map(|i| IndexEntry {
            vector: random_unit_vector(dim),
            reference: Reference {
                file_index: 0,
                position: i as u32,
            },
        })
        .collect();
    DumbIndex::try_new(
        dim,
        vec!["bench".to_string()],
        vec![FileEntry {
            path_index: 0,
            name: "0.json".to_string(),
        }],
        entries,
    )
    .expect("valid index")
}

fn bench_top_k(c: &mut Criterion) {
    let dim = 384;
    let mut group = c.benchmark_group("top_k");
    for len in [1_000, 10_000, 100_000] {
        let index = random_index(len, dim);
        let query = random_unit_vector(dim);
        for metric in [SimilarityMetric::Dot, SimilarityMetric::Cosine] {
            group.bench_with_input(
                BenchmarkId::new(metric.to_string(), len),
                &index,
                |b, index| {
                    b.iter(|| std::hint::black_box(top_k(index, &query, 10, metric).unwrap()));
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_top_k);
criterion_main!(benches);
