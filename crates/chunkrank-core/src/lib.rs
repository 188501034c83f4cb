//! # chunkrank core
//!
//! Retrieval and ranking of small text chunks for retrieval-augmented generation.
//!
//! The crate combines keyword matching and vector similarity, fuses the two
//! signals, and runs the fused candidates through an ordered feature pipeline
//! (conditions, group boosts, importance, temporal decay, required groups and
//! importance tiers).
//!
//! ## Modules
//!
//! - [`search`] - Keyword trie, vector matcher, fusion, feature pipeline and the
//!   [`SearchEngine`](search::SearchEngine) orchestrator
//! - [`embedding`] - Collaborator traits for embedding providers and vector enrichment
//! - [`config`] - Default constants and the layered [`EngineConfig`](config::EngineConfig)
//! - [`error`] - Error types with machine-readable kinds
//! - [`metrics`] - Rolling-window search timing metrics

pub mod config;
pub mod embedding;
pub mod error;
pub mod metrics;
pub mod search;

mod platform;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{CollaboratorError, ErrorKind, SearchError};
pub use search::{
    Chunk, ChunkGroup, ChunkId, ScoredChunk, SearchContext, SearchEngine, SearchMode,
    SearchOptions, SearchResponse,
};
