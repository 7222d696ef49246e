use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use docqa::models::{ChunkingConfig, DistanceMetric, Document, IndexEntry, Metadata};
use docqa::services::{Embedder, HashEmbedder, TextChunker, VectorIndex};

fn generate_vector(dim: usize, seed: f32) -> Vec<f32> {
    (0..dim).map(|i| ((i as f32 + seed) * 0.1).sin()).collect()
}

fn build_index(count: usize, dim: usize, metric: DistanceMetric) -> VectorIndex {
    let entries = (0..count)
        .map(|i| {
            IndexEntry::new(
                generate_vector(dim, i as f32),
                format!("entry {i}"),
                Metadata::new(),
            )
        })
        .collect();
    VectorIndex::from_entries("bench", dim, metric, entries).expect("valid entries")
}

fn linear_scan_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_scan_query");

    for count in [100, 1_000, 10_000] {
        let index = build_index(count, 384, DistanceMetric::Cosine);
        let query = generate_vector(384, 0.5);
        group.bench_with_input(BenchmarkId::new("entries", count), &count, |b, _| {
            b.iter(|| index.query(black_box(&query), 4).expect("non-empty index"));
        });
    }

    group.finish();
}

fn metric_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric");

    for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
        let index = build_index(1_000, 384, metric);
        let query = generate_vector(384, 0.5);
        group.bench_with_input(BenchmarkId::new("k4", metric), &metric, |b, _| {
            b.iter(|| index.query(black_box(&query), 4).expect("non-empty index"));
        });
    }

    group.finish();
}

fn chunk_and_hash_embed(c: &mut Criterion) {
    let text = "Annual leave is 20 days per year. Unused days carry over until March.\n\n"
        .repeat(200);
    let document = Document::new(text, "/bench/policy.txt");
    let chunker = TextChunker::from_config(&ChunkingConfig::default()).expect("valid config");
    let embedder = HashEmbedder::new(384);

    c.bench_function("chunk_document", |b| {
        b.iter(|| chunker.split(black_box(&document)))
    });

    let texts: Vec<String> = chunker
        .split(&document)
        .into_iter()
        .map(|chunk| chunk.content)
        .collect();
    c.bench_function("hash_embed_chunks", |b| {
        b.iter(|| embedder.embed(black_box(&texts)).expect("hash embedding"))
    });
}

criterion_group!(benches, linear_scan_query, metric_comparison, chunk_and_hash_embed);
criterion_main!(benches);
