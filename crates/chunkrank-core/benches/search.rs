//! Benchmarks for search operations (keyword, vector, hybrid, fusion).
//!
//! Run with: `cargo bench -p chunkrank-core --bench search`
//!
//! Chunk sets are generated deterministically so runs are comparable.
//! The embedding provider is in-memory, so vector timings measure scoring and
//! the pipeline rather than provider latency.

use chunkrank_core::embedding::StaticEmbeddingProvider;
use chunkrank_core::metrics::SearchMetrics;
use chunkrank_core::search::fusion::{weighted_reciprocal_rank_fusion, weighted_score_fusion, RRF_K};
use chunkrank_core::search::keyword::{KeywordIndex, KeywordMatcher};
use chunkrank_core::search::options::{KeywordOptions, KeywordPriorities};
use chunkrank_core::search::{Chunk, SearchContext, SearchEngine, SearchMode, SearchOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

/// Embedding dimension of the generated chunks.
const DIM: usize = 384;

const TOPICS: &[&str] = &[
    "dragon", "tavern", "kraken", "castle", "forest", "river", "merchant", "wizard", "temple",
    "harbor", "mountain", "goblin",
];

const QUERY: &str = "Where did the wizard hide the dragon egg near the temple";

/// Deterministic L2-normalized embedding for `seed`.
fn seeded_embedding(seed: u64) -> Vec<f32> {
    let raw: Vec<f32> = (0..DIM as u64)
        .map(|i| {
            let h = blake3::hash(&[seed.to_le_bytes(), i.to_le_bytes()].concat());
            let bytes = h.as_bytes();
            let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            (v as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect();
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    raw.into_iter().map(|x| x / norm).collect()
}

fn generate_chunks(count: usize) -> Vec<Chunk> {
    (0..count)
        .map(|i| {
            let a = TOPICS[i % TOPICS.len()];
            let b = TOPICS[(i * 7 + 3) % TOPICS.len()];
            Chunk::new(format!("Entry {i}: the {a} and the {b}."))
                .with_keywords([a, b])
                .with_embedding(seeded_embedding(i as u64))
        })
        .collect()
}

fn engine() -> SearchEngine {
    let provider = StaticEmbeddingProvider::new("bench").with_fallback(seeded_embedding(1_000_000));
    SearchEngine::builder()
        .embedding_provider(Arc::new(provider))
        .metrics(SearchMetrics::new())
        .build()
}

fn bench_keyword(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyword");
    let matcher = KeywordMatcher::new(KeywordOptions::default(), KeywordPriorities::default());

    for size in [100, 1_000, 10_000] {
        let chunks = generate_chunks(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("index", size), &chunks, |b, chunks| {
            b.iter(|| KeywordIndex::from_chunks(black_box(chunks)))
        });

        let index = KeywordIndex::from_chunks(&chunks);
        group.bench_with_input(BenchmarkId::new("search", size), &index, |b, index| {
            b.iter(|| matcher.search(black_box(QUERY), index))
        });
    }
    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let engine = engine();
    let ctx = SearchContext::default();

    let mut group = c.benchmark_group("engine");
    for size in [100, 1_000, 5_000] {
        let chunks = generate_chunks(size);
        group.throughput(Throughput::Elements(size as u64));

        for mode in [SearchMode::Keyword, SearchMode::Vector, SearchMode::Hybrid] {
            let options = SearchOptions::default()
                .with_mode(mode)
                .with_threshold(0.0)
                .with_top_k(10);
            group.bench_with_input(
                BenchmarkId::new(mode.to_string(), size),
                &chunks,
                |b, chunks| {
                    b.to_async(&runtime)
                        .iter(|| engine.search(black_box(QUERY), chunks, &options, &ctx))
                },
            );
        }
    }
    group.finish();
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");
    for size in [100, 1_000, 10_000] {
        let a: Vec<(usize, f32)> = (0..size).map(|i| (i, 1.0 / (i + 1) as f32)).collect();
        let b: Vec<(usize, f32)> = (0..size).rev().map(|i| (i, 1.0 / (i + 1) as f32)).collect();

        group.bench_with_input(BenchmarkId::new("rrf", size), &size, |bench, _| {
            bench.iter(|| weighted_reciprocal_rank_fusion(black_box(&a), black_box(&b), RRF_K, 1.5, 1.0))
        });
        group.bench_with_input(BenchmarkId::new("weighted_sum", size), &size, |bench, _| {
            bench.iter(|| weighted_score_fusion(black_box(&a), black_box(&b), 0.3, 0.7))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_keyword, bench_engine, bench_fusion);
criterion_main!(benches);
