//! Search orchestration.
//!
//! [`SearchEngine`] runs one search end to end:
//!
//! 1. validate the query, the chunk set and the options
//! 2. drop chunks whose conditions fail in the current context
//! 3. run the keyword matcher, the vector matcher, or both concurrently
//! 4. merge keyword and vector scores (hybrid mode)
//! 5. run the [`FeaturePipeline`] over the merged candidates
//!
//! The engine holds no chunk state. Chunks, options and context are passed
//! on every call, so one engine can serve unrelated chunk sets. The only
//! state shared between calls is the query-embedding cache.
//!
//! # Example
//!
//! ```
//! use chunkrank_core::embedding::StaticEmbeddingProvider;
//! use chunkrank_core::search::{Chunk, SearchContext, SearchEngine, SearchMode, SearchOptions};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = StaticEmbeddingProvider::new("static").with_vector("castle", vec![1.0, 0.0]);
//! let engine = SearchEngine::builder()
//!     .embedding_provider(Arc::new(provider))
//!     .build();
//!
//! let chunks = vec![
//!     Chunk::new("The castle gates").with_embedding(vec![0.9, 0.1]),
//!     Chunk::new("A fishing boat").with_embedding(vec![0.0, 1.0]),
//! ];
//! let options = SearchOptions::default().with_mode(SearchMode::Vector);
//! let response = engine
//!     .search("castle", &chunks, &options, &SearchContext::default())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(response.results.len(), 1);
//! assert_eq!(response.results[0].chunk.text, "The castle gates");
//! # }
//! ```

#[cfg(test)]
mod tests;

use super::conditions::{ConditionEvaluator, EmotionDetector, RandomSource, SeededRandom, ThreadRandom};
use super::context::SearchContext;
use super::fusion::weighted_score_fusion;
use super::keyword::{KeywordHit, KeywordIndex, KeywordMatcher, KeywordOutcome};
use super::options::{SearchMode, SearchOptions};
use super::pipeline::FeaturePipeline;
use super::types::{Chunk, ScoredChunk, SearchResponse, SearchStats, SearchTiming};
use super::vector::{QueryEmbeddingCache, VectorHit, VectorMatcher, VectorOutcome, VectorQuery};
use crate::config::{EngineConfig, DEFAULT_QUERY_CACHE_CAPACITY};
use crate::embedding::{EmbeddingProvider, VectorEnrichment};
use crate::error::SearchError;
use crate::metrics::{global_metrics, SearchMetrics};
use crate::platform::run_blocking;
use instant::Instant;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Builder for [`SearchEngine`].
///
/// Every collaborator is optional. Without an embedding provider only
/// keyword search is available.
#[derive(Default)]
pub struct SearchEngineBuilder {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    enrichment: Option<Arc<dyn VectorEnrichment>>,
    cache: Option<Arc<QueryEmbeddingCache>>,
    cache_capacity: Option<usize>,
    emotion: Option<Arc<dyn EmotionDetector>>,
    random: Option<Arc<dyn RandomSource>>,
    defaults: Option<SearchOptions>,
    metrics: Option<SearchMetrics>,
}

impl SearchEngineBuilder {
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn vector_enrichment(mut self, enrichment: Arc<dyn VectorEnrichment>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    /// Capacity of a fresh query-embedding cache (ignored with [`shared_cache`](Self::shared_cache)).
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Shares an existing query-embedding cache between engines.
    pub fn shared_cache(mut self, cache: Arc<QueryEmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn emotion_detector(mut self, detector: Arc<dyn EmotionDetector>) -> Self {
        self.emotion = Some(detector);
        self
    }

    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Seeds `randomChance` rules for reproducible filtering.
    pub fn random_seed(self, seed: u64) -> Self {
        self.random_source(Arc::new(SeededRandom::new(seed)))
    }

    pub fn default_options(mut self, options: SearchOptions) -> Self {
        self.defaults = Some(options);
        self
    }

    /// Records into `metrics` instead of the global collector.
    pub fn metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> SearchEngine {
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(QueryEmbeddingCache::new(
                self.cache_capacity.unwrap_or(DEFAULT_QUERY_CACHE_CAPACITY),
            ))
        });
        let random = self.random.unwrap_or_else(|| Arc::new(ThreadRandom));

        SearchEngine {
            vector: VectorMatcher::new(self.provider, self.enrichment, cache),
            conditions: ConditionEvaluator::new(self.emotion, random),
            defaults: self.defaults.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_else(|| global_metrics().clone()),
        }
    }
}

/// Ranks caller-supplied chunks against a query.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    vector: VectorMatcher,
    conditions: ConditionEvaluator,
    defaults: SearchOptions,
    metrics: SearchMetrics,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SearchEngine {
    pub fn builder() -> SearchEngineBuilder {
        SearchEngineBuilder::default()
    }

    /// Builder preset from an [`EngineConfig`]: cache capacity, random seed
    /// and default options. Collaborators still have to be added.
    pub fn from_config(config: &EngineConfig) -> SearchEngineBuilder {
        let builder = Self::builder()
            .cache_capacity(config.query_cache_capacity)
            .default_options(config.defaults.clone());
        match config.random_seed {
            Some(seed) => builder.random_seed(seed),
            None => builder,
        }
    }

    /// Options from the engine configuration.
    pub fn default_options(&self) -> &SearchOptions {
        &self.defaults
    }

    pub fn has_embedding_provider(&self) -> bool {
        self.vector.has_provider()
    }

    pub fn query_cache(&self) -> &QueryEmbeddingCache {
        self.vector.cache()
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Searches `chunks` for `query` in `options.search_mode`.
    ///
    /// # Errors
    ///
    /// Fails fast on an empty query, an empty chunk set or invalid options.
    /// Any stage that cannot proceed (missing provider, invalid embeddings,
    /// collaborator failures) fails the whole call.
    #[instrument(skip_all, fields(query_len = query.len(), chunks = chunks.len(), mode = %options.search_mode))]
    pub async fn search(
        &self,
        query: &str,
        chunks: &[Chunk],
        options: &SearchOptions,
        ctx: &SearchContext,
    ) -> Result<SearchResponse, SearchError> {
        let result = self.run(query, chunks, options, ctx).await;
        match &result {
            Ok(response) => self.metrics.record_search(response),
            Err(e) => {
                debug!(kind = %e.kind(), "Search failed: {e}");
                self.metrics.record_failure();
            }
        }
        result
    }

    /// Searches with the mode picked from the data: hybrid when chunks carry
    /// both keywords and embeddings, otherwise whichever is present.
    ///
    /// # Errors
    ///
    /// [`SearchError::NoSearchData`] when no chunk carries either.
    pub async fn auto_search(
        &self,
        query: &str,
        chunks: &[Chunk],
        options: &SearchOptions,
        ctx: &SearchContext,
    ) -> Result<SearchResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if chunks.is_empty() {
            return Err(SearchError::NoChunks);
        }
        let mode = detect_mode(chunks)?;
        debug!(%mode, "Auto-selected search mode");
        let options = options.clone().with_mode(mode);
        self.search(query, chunks, &options, ctx).await
    }

    /// Runs `queries` one after another over the same chunks.
    ///
    /// Each query gets its own slot; one failing query does not stop the
    /// batch. Once `cancel` fires, the in-flight query and every remaining
    /// one report [`SearchError::Cancelled`].
    #[instrument(skip_all, fields(queries = queries.len(), chunks = chunks.len()))]
    pub async fn batch_search<Q: AsRef<str>>(
        &self,
        queries: &[Q],
        chunks: &[Chunk],
        options: &SearchOptions,
        ctx: &SearchContext,
        cancel: &CancellationToken,
    ) -> Vec<Result<SearchResponse, SearchError>> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            if cancel.is_cancelled() {
                self.metrics.record_cancelled();
                results.push(Err(SearchError::Cancelled));
                continue;
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.metrics.record_cancelled();
                    Err(SearchError::Cancelled)
                }
                result = self.search(query.as_ref(), chunks, options, ctx) => result,
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(queries = queries.len(), failed, "Batch search complete");
        results
    }

    async fn run(
        &self,
        query: &str,
        chunks: &[Chunk],
        options: &SearchOptions,
        ctx: &SearchContext,
    ) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if chunks.is_empty() {
            return Err(SearchError::NoChunks);
        }
        options.validate()?;

        let mode = options.search_mode;
        let mut stats = SearchStats::new(mode, chunks.len());
        let mut timing = SearchTiming::default();

        let phase = Instant::now();
        let universe: Vec<Chunk> = if options.apply_conditions {
            self.conditions
                .filter(chunks, ctx)
                .into_iter()
                .map(|pos| chunks[pos].clone())
                .collect()
        } else {
            chunks.to_vec()
        };
        stats.filtered_by_conditions = chunks.len() - universe.len();
        timing.conditions_ms = elapsed_ms(phase);

        if universe.is_empty() {
            debug!("Every chunk was filtered by conditions");
            timing.total_ms = elapsed_ms(start);
            return Ok(SearchResponse {
                results: Vec::new(),
                timing,
                stats,
            });
        }
        let universe = Arc::new(universe);

        let (keyword, vector) = match mode {
            SearchMode::Keyword => {
                let keyword = keyword_phase(query, &universe, options).await?;
                (Some(keyword), None)
            }
            SearchMode::Vector => {
                let vector = self.vector_phase(query, &universe, options).await?;
                (None, Some(vector))
            }
            SearchMode::Hybrid => {
                let (keyword, vector) = join_phases(
                    keyword_phase(query, &universe, options),
                    self.vector_phase(query, &universe, options),
                )
                .await?;
                (Some(keyword), Some(vector))
            }
        };

        if let Some((outcome, ms)) = &keyword {
            stats.query_keywords = outcome.terms.len();
            stats.keyword_candidates = outcome.hits.len();
            timing.keyword_ms = *ms;
        }
        if let Some((outcome, ms)) = &vector {
            stats.vector_candidates = outcome.hits.len();
            stats.embedding_cache_hit = outcome.cache_hit;
            stats.enriched_embeddings = outcome.enriched;
            timing.vector_ms = *ms;
        }

        let phase = Instant::now();
        let candidates = merge_candidates(
            &universe,
            keyword.as_ref().map(|(o, _)| o),
            vector.as_ref().map(|(o, _)| o),
            options,
        );
        stats.merged_candidates = candidates.len();
        timing.fusion_ms = elapsed_ms(phase);

        let phase = Instant::now();
        let outcome = FeaturePipeline::new(options, ctx).run(candidates, &universe, query);
        timing.pipeline_ms = elapsed_ms(phase);

        stats.above_threshold = outcome.above_threshold;
        stats.forced_by_group = outcome.forced;
        stats.returned = outcome.results.len();
        timing.total_ms = elapsed_ms(start);

        info!(
            %mode,
            candidates = stats.merged_candidates,
            returned = stats.returned,
            forced = stats.forced_by_group,
            total_ms = timing.total_ms,
            "Search complete"
        );

        Ok(SearchResponse {
            results: outcome.results,
            timing,
            stats,
        })
    }

    async fn vector_phase(
        &self,
        query: &str,
        universe: &[Chunk],
        options: &SearchOptions,
    ) -> Result<(VectorOutcome, f64), SearchError> {
        let phase = Instant::now();
        let request = VectorQuery {
            algorithm: options.similarity_algorithm,
            scope: options.vector_scope,
            threshold: similarity_gate(options),
            top_k: None,
            dual: options.dual_vector.then(|| options.dual.clone()),
        };
        let outcome = self.vector.search(query, universe, &request).await?;
        Ok((outcome, elapsed_ms(phase)))
    }
}

/// Drives the keyword and vector phases of a hybrid search concurrently.
///
/// The first error drops the other phase.
async fn join_phases<K, V>(
    keyword: impl Future<Output = Result<K, SearchError>>,
    vector: impl Future<Output = Result<V, SearchError>>,
) -> Result<(K, V), SearchError> {
    tokio::try_join!(keyword, vector)
}

/// Builds the keyword index and scores it on the blocking pool.
async fn keyword_phase(
    query: &str,
    universe: &Arc<Vec<Chunk>>,
    options: &SearchOptions,
) -> Result<(KeywordOutcome, f64), SearchError> {
    let universe = Arc::clone(universe);
    let query = query.to_string();
    let matcher = KeywordMatcher::new(options.keywords.clone(), options.priorities.clone());

    run_blocking(move || {
        let phase = Instant::now();
        let index = KeywordIndex::from_chunks(&universe);
        let outcome = matcher.search(&query, &index);
        Ok((outcome, elapsed_ms(phase)))
    })
    .await
}

/// Turns matcher output into pipeline candidates.
///
/// Keyword mode scores by keyword score, vector mode by the hit score
/// (similarity, or scaled RRF in dual-vector mode), hybrid mode by the
/// weighted sum of both over their union.
fn merge_candidates(
    universe: &[Chunk],
    keyword: Option<&KeywordOutcome>,
    vector: Option<&VectorOutcome>,
    options: &SearchOptions,
) -> Vec<ScoredChunk> {
    let keyword_hits: HashMap<usize, &KeywordHit> = keyword
        .map(|o| o.hits.iter().map(|h| (h.position, h)).collect())
        .unwrap_or_default();
    let vector_hits: HashMap<usize, &VectorHit> = vector
        .map(|o| o.hits.iter().map(|h| (h.position, h)).collect())
        .unwrap_or_default();

    let scored = |position: usize, score: f32| {
        let mut scored = ScoredChunk::new(universe[position].clone(), score);
        if let Some(hit) = keyword_hits.get(&position) {
            scored.keyword_score = Some(hit.score);
            scored.matched_keywords = hit.matched.clone();
        }
        if let Some(hit) = vector_hits.get(&position) {
            scored.vector_score = Some(hit.score);
            scored.similarity = Some(hit.similarity);
            scored.rrf_score = hit.rrf_score;
            scored.via_summary = hit.via_summary.clone();
        }
        scored
    };

    match (keyword, vector) {
        (Some(keyword), None) => keyword
            .hits
            .iter()
            .map(|hit| scored(hit.position, hit.score))
            .collect(),
        (None, Some(vector)) => vector
            .hits
            .iter()
            .map(|hit| scored(hit.position, hit.score))
            .collect(),
        (Some(keyword), Some(vector)) => {
            let keyword_list: Vec<(usize, f32)> =
                keyword.hits.iter().map(|h| (h.position, h.score)).collect();
            let vector_list: Vec<(usize, f32)> =
                vector.hits.iter().map(|h| (h.position, h.score)).collect();
            let fused = weighted_score_fusion(
                &keyword_list,
                &vector_list,
                options.keyword_weight,
                options.vector_weight,
            );
            debug!(
                keyword = keyword_list.len(),
                vector = vector_list.len(),
                merged = fused.len(),
                "Merged keyword and vector candidates"
            );
            fused
                .into_iter()
                .map(|f| scored(f.item, f.score))
                .collect()
        }
        (None, None) => {
            warn!("No matcher ran");
            Vec::new()
        }
    }
}

/// Minimum raw similarity enforced by the vector matcher.
///
/// Dual-vector search ranks by fused rank, so the threshold gates the raw
/// similarity of its hits instead. Every other mode thresholds final scores
/// in the pipeline.
fn similarity_gate(options: &SearchOptions) -> f32 {
    if options.ranks_by_fused_rank() {
        options.threshold
    } else {
        0.0
    }
}

/// Mode implied by the data the chunks carry.
fn detect_mode(chunks: &[Chunk]) -> Result<SearchMode, SearchError> {
    let has_embeddings = chunks.iter().any(Chunk::has_embedding);
    let has_keywords = chunks.iter().any(Chunk::has_keywords);
    match (has_keywords, has_embeddings) {
        (true, true) => Ok(SearchMode::Hybrid),
        (true, false) => Ok(SearchMode::Keyword),
        (false, true) => Ok(SearchMode::Vector),
        (false, false) => Err(SearchError::NoSearchData {
            chunks: chunks.len(),
        }),
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
