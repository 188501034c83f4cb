//! Search command implementation.
//!
//! Loads the chunk file and configuration, builds the engine and runs one query.

use crate::config;
use anyhow::{anyhow, Context, Result};
use chunkrank_core::embedding::StaticEmbeddingProvider;
use chunkrank_core::search::{SearchContext, SearchEngine, SearchMode, SearchResponse};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Provider identity reported for embeddings read from `--query-vector`.
const QUERY_VECTOR_PROVIDER: &str = "cli-query-vector";

/// Everything the search command reads from the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub chunks: PathBuf,
    pub mode: Option<String>,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    pub query_vector: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Runs one search described by `request`.
///
/// Without `--mode`, the mode is auto-detected from the chunks when a query
/// vector is available and falls back to keyword search otherwise. Flags
/// override the configured default options.
pub async fn execute_search(request: &SearchRequest) -> Result<SearchResponse> {
    let engine_config = config::load_engine_config(request.config.as_deref())?;

    let chunks = config::load_chunks(&request.chunks)?;
    if chunks.is_empty() {
        return Err(anyhow!(
            "Chunk file {} contains no chunks",
            request.chunks.display()
        ));
    }
    info!("Loaded {} chunks from {}", chunks.len(), request.chunks.display());

    let mut builder = SearchEngine::from_config(&engine_config);
    if let Some(path) = &request.query_vector {
        let vector = config::load_query_vector(path)?;
        info!("Using {}-dimensional query vector", vector.len());
        let provider = StaticEmbeddingProvider::new(QUERY_VECTOR_PROVIDER)
            .with_vector(request.query.clone(), vector.clone())
            .with_fallback(vector);
        builder = builder.embedding_provider(Arc::new(provider));
    }
    let engine = builder.build();

    let mut options = engine.default_options().clone();
    if let Some(limit) = request.limit {
        options.top_k = limit;
    }
    if let Some(threshold) = request.threshold {
        options.threshold = threshold;
    }

    let ctx = SearchContext::default();
    let response = match request.mode.as_deref() {
        Some(mode) => {
            let mode: SearchMode = mode.parse().context("Invalid --mode")?;
            let options = options.with_mode(mode);
            engine.search(&request.query, &chunks, &options, &ctx).await
        }
        None if engine.has_embedding_provider() => {
            engine.auto_search(&request.query, &chunks, &options, &ctx).await
        }
        None => {
            let options = options.with_mode(SearchMode::Keyword);
            engine.search(&request.query, &chunks, &options, &ctx).await
        }
    }
    .context("Search failed")?;

    info!(
        "Found {} results in {:.2}ms ({} mode)",
        response.results.len(),
        response.timing.total_ms,
        response.stats.mode
    );
    Ok(response)
}
