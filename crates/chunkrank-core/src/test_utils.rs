//! Test utilities for chunkrank-core.
//!
//! Shared fixtures for unit tests: a small lore chunk set, providers that
//! embed it, and engines that record into their own metrics collector.
//! Only compiled when running tests.

use crate::embedding::StaticEmbeddingProvider;
use crate::metrics::SearchMetrics;
use crate::search::{Chunk, SearchEngine};
use std::sync::Arc;

/// Provider identity used by the fixtures.
pub const TEST_PROVIDER: &str = "test-provider";

/// Unit vector along `axis` in `dims` dimensions.
pub fn axis(dims: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dims];
    v[axis] = 1.0;
    v
}

/// Normalized 2-d vector at `degrees` from the x axis.
pub fn angle(degrees: f32) -> Vec<f32> {
    let radians = degrees.to_radians();
    vec![radians.cos(), radians.sin()]
}

/// Three lore chunks with keywords and 3-d embeddings along distinct axes.
pub fn lore_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("The red dragon sleeps beneath the mountain.")
            .with_keywords(["dragon", "mountain"])
            .with_embedding(axis(3, 0)),
        Chunk::new("The Gilded Goose tavern serves spiced ale.")
            .with_keywords(["tavern", "ale"])
            .with_embedding(axis(3, 1)),
        Chunk::new("Sailors fear the kraken of the northern sea.")
            .with_keywords(["kraken", "sea"])
            .with_embedding(axis(3, 2)),
    ]
}

/// Provider that embeds the lore queries used by the tests.
pub fn lore_provider() -> StaticEmbeddingProvider {
    StaticEmbeddingProvider::new(TEST_PROVIDER)
        .with_vector("dragon", axis(3, 0))
        .with_vector("tavern ale", axis(3, 1))
        .with_vector("kraken", axis(3, 2))
}

/// Engine over `provider` with a private metrics collector.
pub fn engine_with(provider: Arc<StaticEmbeddingProvider>) -> SearchEngine {
    SearchEngine::builder()
        .embedding_provider(provider)
        .metrics(SearchMetrics::new())
        .build()
}

/// Keyword-only engine with a private metrics collector.
pub fn keyword_engine() -> SearchEngine {
    SearchEngine::builder().metrics(SearchMetrics::new()).build()
}
