//! Hybrid chunk search and ranking.
//!
//! The engine ranks a caller-supplied chunk set against a query in stages:
//!
//! - **Conditions** drop chunks whose activation rules fail in the current
//!   [`SearchContext`]
//! - **Keyword matching** scores chunks by the query keywords found in their
//!   keyword lists (trie lookups, exact and prefix matches, keyword priorities)
//! - **Vector matching** scores chunks by embedding similarity to the query,
//!   optionally fusing summary and full-text embeddings with weighted RRF
//! - **Fusion** merges keyword and vector scores with a weighted sum
//! - **Pipeline** applies group boosts, importance, temporal decay, threshold
//!   and top-K, required groups and importance tiers
//!
//! # Architecture
//!
//! - `types`: Chunks, scored results and per-search timing/stats
//! - `options`: Serde-friendly search options with defaults
//! - `context`: Conversation snapshot read by conditions and decay
//! - `conditions`: Rule evaluation with injectable emotion and randomness
//! - `keyword`: Keyword extraction, priorities and the keyword trie
//! - `vector`: Similarity metrics, query-embedding cache and vector matching
//! - `fusion`: Reciprocal Rank Fusion and weighted score fusion
//! - `pipeline`: Post-fusion feature stages
//!
//! # Usage
//!
//! ```
//! use chunkrank_core::search::{Chunk, SearchContext, SearchEngine, SearchMode, SearchOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = SearchEngine::builder().build();
//! let chunks = vec![
//!     Chunk::new("The dragon sleeps under the mountain.").with_keywords(["dragon", "mountain"]),
//!     Chunk::new("The tavern serves ale.").with_keywords(["tavern"]),
//! ];
//! let options = SearchOptions::default()
//!     .with_mode(SearchMode::Keyword)
//!     .with_threshold(0.0);
//!
//! let response = engine
//!     .search("Where is the dragon?", &chunks, &options, &SearchContext::default())
//!     .await
//!     .unwrap();
//! assert_eq!(response.results[0].chunk.keywords[0], "dragon");
//! # }
//! ```

pub mod conditions;
pub mod context;
pub mod fusion;
pub mod keyword;
pub mod options;
pub mod pipeline;
pub mod types;
pub mod vector;

mod engine;

pub use context::{ContextMessage, GenerationType, Scene, SearchContext};
pub use engine::{SearchEngine, SearchEngineBuilder};
pub use options::{SearchMode, SearchOptions, SimilarityAlgorithm, VectorScope};
pub use types::{
    Chunk, ChunkGroup, ChunkId, ChunkSource, ImportanceTier, ScoredChunk, SearchResponse,
    SearchStats, SearchTiming,
};
