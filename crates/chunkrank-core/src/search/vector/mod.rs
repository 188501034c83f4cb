//! Vector matcher.
//!
//! Ranks chunks by similarity between their embeddings and the query
//! embedding.
//!
//! 1. Restrict the chunk set to the requested [`VectorScope`].
//! 2. Fetch missing chunk embeddings from [`VectorEnrichment`], grouped by
//!    `(collection_id, source)`.
//! 3. Obtain the query embedding, through the [`QueryEmbeddingCache`].
//! 4. Validate every embedding (non-empty, finite, query dimension). All
//!    offending chunks are reported in one [`SearchError::InvalidEmbeddings`].
//! 5. Score with the selected [`SimilarityMetric`], stable-sort descending,
//!    apply the threshold and truncate.
//!
//! In dual-vector mode summary hits are mapped to their parent chunk and the
//! summary and full-text rankings are merged with weighted reciprocal rank
//! fusion.

mod cache;
mod similarity;

pub use cache::QueryEmbeddingCache;
pub use similarity::{metric_for, Cosine, Hamming, Jaccard, SimilarityMetric};

use crate::embedding::{EmbeddingProvider, VectorEnrichment};
use crate::error::{CollaboratorError, SearchError};
use crate::search::fusion::weighted_reciprocal_rank_fusion;
use crate::search::options::{DualVectorOptions, SimilarityAlgorithm, VectorScope};
use crate::search::types::{Chunk, ChunkId, ChunkSource};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Parameters of one vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub algorithm: SimilarityAlgorithm,
    pub scope: VectorScope,
    /// Inclusive minimum similarity
    pub threshold: f32,
    /// Maximum hits; `None` keeps every hit
    pub top_k: Option<usize>,
    /// Fuse summary and full-text rankings
    pub dual: Option<DualVectorOptions>,
}

impl Default for VectorQuery {
    fn default() -> Self {
        Self {
            algorithm: SimilarityAlgorithm::Cosine,
            scope: VectorScope::Both,
            threshold: 0.0,
            top_k: None,
            dual: None,
        }
    }
}

/// A chunk ranked by the vector matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Position of the chunk in the searched set
    pub position: usize,
    /// Ranking score in `[0, 1]`: the similarity, or in dual-vector mode
    /// the fused RRF score divided by its maximum
    pub score: f32,
    /// Best raw similarity of the chunk or its summary
    pub similarity: f32,
    /// Fused score in dual-vector mode
    pub rrf_score: Option<f32>,
    /// Summary chunk that matched on behalf of this chunk
    pub via_summary: Option<ChunkId>,
}

/// Result of a vector search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorOutcome {
    /// Ranked hits
    pub hits: Vec<VectorHit>,
    /// Chunks that were scored
    pub ranked: usize,
    /// Query embedding came from the cache
    pub cache_hit: bool,
    /// Chunk embeddings fetched from enrichment
    pub enriched: usize,
}

/// Ranks chunks against a query embedding.
#[derive(Clone)]
pub struct VectorMatcher {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    enrichment: Option<Arc<dyn VectorEnrichment>>,
    cache: Arc<QueryEmbeddingCache>,
}

impl std::fmt::Debug for VectorMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorMatcher")
            .field("provider", &self.provider.as_ref().map(|p| p.identity().to_string()))
            .field("enrichment", &self.enrichment.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

impl VectorMatcher {
    pub fn new(
        provider: Option<Arc<dyn EmbeddingProvider>>,
        enrichment: Option<Arc<dyn VectorEnrichment>>,
        cache: Arc<QueryEmbeddingCache>,
    ) -> Self {
        Self {
            provider,
            enrichment,
            cache,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn cache(&self) -> &QueryEmbeddingCache {
        &self.cache
    }

    /// Ranks `chunks` against `query`.
    #[instrument(skip_all, fields(chunks = chunks.len(), scope = ?request.scope, dual = request.dual.is_some()))]
    pub async fn search(
        &self,
        query: &str,
        chunks: &[Chunk],
        request: &VectorQuery,
    ) -> Result<VectorOutcome, SearchError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(SearchError::EmbeddingProviderUnavailable)?;

        let in_scope: Vec<usize> = match (&request.dual, request.scope) {
            (Some(_), _) | (None, VectorScope::Both) => (0..chunks.len()).collect(),
            (None, VectorScope::Summary) => positions(chunks, |c| c.is_summary_chunk),
            (None, VectorScope::Full) => positions(chunks, |c| !c.is_summary_chunk),
        };

        let parents = if request.dual.is_some() {
            Some(resolve_parents(chunks)?)
        } else {
            None
        };

        if in_scope.is_empty() {
            debug!("No chunks in vector scope");
            return Ok(VectorOutcome::default());
        }

        let enriched = self.enrich(chunks, &in_scope).await?;
        let (query_embedding, cache_hit) = self.query_embedding(provider.as_ref(), query).await?;

        let mut invalid = Vec::new();
        let mut vectors: Vec<(usize, &[f32])> = Vec::with_capacity(in_scope.len());
        for &pos in &in_scope {
            let embedding = chunks[pos]
                .embedding
                .as_deref()
                .filter(|e| !e.is_empty())
                .or_else(|| enriched.get(&pos).map(Vec::as_slice));
            match embedding {
                Some(e) if is_valid(e, query_embedding.len()) => vectors.push((pos, e)),
                _ => invalid.push(chunks[pos].id.clone()),
            }
        }
        if !invalid.is_empty() {
            warn!(count = invalid.len(), "Rejecting invalid chunk embeddings");
            return Err(SearchError::invalid_embeddings(invalid));
        }

        let metric = metric_for(request.algorithm);
        let mut scored: Vec<(usize, f32)> = vectors
            .iter()
            .map(|&(pos, e)| (pos, metric.similarity(&query_embedding, e)))
            .collect();
        // Stable: ties keep input order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let hits = match (&request.dual, parents) {
            (Some(dual), Some(parents)) => dual_rank(chunks, &scored, &parents, dual, request),
            _ => scored
                .iter()
                .filter(|(_, sim)| *sim >= request.threshold)
                .take(request.top_k.unwrap_or(usize::MAX))
                .map(|&(position, similarity)| VectorHit {
                    position,
                    score: similarity,
                    similarity,
                    rrf_score: None,
                    via_summary: None,
                })
                .collect(),
        };

        debug!(
            ranked = scored.len(),
            hits = hits.len(),
            cache_hit,
            enriched = enriched.len(),
            "Vector search complete"
        );

        Ok(VectorOutcome {
            hits,
            ranked: scored.len(),
            cache_hit,
            enriched: enriched.len(),
        })
    }

    /// Embeddings fetched for in-scope chunks that carry none, by position.
    async fn enrich(
        &self,
        chunks: &[Chunk],
        in_scope: &[usize],
    ) -> Result<BTreeMap<usize, Vec<f32>>, SearchError> {
        let missing: Vec<usize> = in_scope
            .iter()
            .copied()
            .filter(|&pos| !chunks[pos].has_embedding())
            .collect();
        if missing.is_empty() {
            return Ok(BTreeMap::new());
        }

        let Some(enrichment) = &self.enrichment else {
            return Err(SearchError::EnrichmentUnavailable {
                missing: missing.len(),
            });
        };

        let mut groups: BTreeMap<(String, ChunkSource), Vec<usize>> = BTreeMap::new();
        let mut without_collection = Vec::new();
        for &pos in &missing {
            match &chunks[pos].collection_id {
                Some(collection) => groups
                    .entry((collection.clone(), chunks[pos].source))
                    .or_default()
                    .push(pos),
                None => without_collection.push(chunks[pos].id.clone()),
            }
        }
        if !without_collection.is_empty() {
            return Err(SearchError::missing_collection_id(without_collection));
        }

        let mut enriched = BTreeMap::new();
        for ((collection, source), members) in groups {
            let records = enrichment
                .fetch_vectors(&collection, source)
                .await
                .map_err(SearchError::vector_enrichment)?;

            let mut by_id: HashMap<ChunkId, Vec<f32>> = HashMap::with_capacity(records.len());
            for record in records {
                by_id.insert(record.id, record.vector);
            }

            let mut used = 0;
            for pos in members {
                if let Some(vector) = by_id.remove(&chunks[pos].id) {
                    enriched.insert(pos, vector);
                    used += 1;
                }
            }
            if !by_id.is_empty() {
                warn!(
                    collection = %collection,
                    source = %source,
                    unused = by_id.len(),
                    "Enrichment returned vectors for chunks not in this search"
                );
            }
            debug!(collection = %collection, source = %source, used, "Fetched chunk embeddings");
        }
        Ok(enriched)
    }

    async fn query_embedding(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> Result<(Arc<Vec<f32>>, bool), SearchError> {
        let identity = provider.identity();
        if let Some(cached) = self.cache.get(query, identity) {
            return Ok((cached, true));
        }

        let embedding = provider
            .embed(query)
            .await
            .map_err(SearchError::embedding_provider)?;
        if embedding.is_empty() || embedding.iter().any(|v| !v.is_finite()) {
            return Err(SearchError::embedding_provider(
                CollaboratorError::MalformedResponse(
                    "query embedding is empty or not finite".to_string(),
                ),
            ));
        }

        let embedding = Arc::new(embedding);
        self.cache.insert(query, identity, Arc::clone(&embedding));
        Ok((embedding, false))
    }
}

fn positions(chunks: &[Chunk], keep: impl Fn(&Chunk) -> bool) -> Vec<usize> {
    chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| keep(c))
        .map(|(i, _)| i)
        .collect()
}

fn is_valid(embedding: &[f32], dimension: usize) -> bool {
    !embedding.is_empty() && embedding.len() == dimension && embedding.iter().all(|v| v.is_finite())
}

/// Summary position -> parent position; every parent must be in `chunks`.
fn resolve_parents(chunks: &[Chunk]) -> Result<HashMap<usize, usize>, SearchError> {
    let mut by_id: HashMap<&ChunkId, usize> = HashMap::with_capacity(chunks.len());
    for (pos, chunk) in chunks.iter().enumerate() {
        by_id.entry(&chunk.id).or_insert(pos);
    }

    let mut parents = HashMap::new();
    let mut orphans = Vec::new();
    for (pos, chunk) in chunks.iter().enumerate() {
        if !chunk.is_summary_chunk {
            continue;
        }
        match chunk.parent_id.as_ref().and_then(|id| by_id.get(id)) {
            Some(&parent) if !chunks[parent].is_summary_chunk => {
                parents.insert(pos, parent);
            }
            _ => orphans.push(chunk.id.clone()),
        }
    }
    if !orphans.is_empty() {
        return Err(SearchError::orphan_summaries(orphans));
    }
    Ok(parents)
}

/// Fuses the summary ranking (mapped to parents) with the full-text ranking.
fn dual_rank(
    chunks: &[Chunk],
    scored: &[(usize, f32)],
    parents: &HashMap<usize, usize>,
    dual: &DualVectorOptions,
    request: &VectorQuery,
) -> Vec<VectorHit> {
    let mut summary_list: Vec<(usize, f32)> = Vec::new();
    let mut best_summary: HashMap<usize, (usize, f32)> = HashMap::new();
    let mut full_list: Vec<(usize, f32)> = Vec::new();
    let mut full_similarity: HashMap<usize, f32> = HashMap::new();

    // `scored` is sorted, so the first summary seen for a parent is its best
    for &(pos, sim) in scored {
        match parents.get(&pos) {
            Some(&parent) => {
                if let std::collections::hash_map::Entry::Vacant(slot) = best_summary.entry(parent) {
                    slot.insert((pos, sim));
                    summary_list.push((parent, sim));
                }
            }
            None => {
                full_list.push((pos, sim));
                full_similarity.insert(pos, sim);
            }
        }
    }

    let fused = weighted_reciprocal_rank_fusion(
        &summary_list,
        &full_list,
        dual.rrf_k,
        dual.summary_weight,
        dual.full_weight,
    );
    // Rank 0 in both lists
    let max_rrf = (dual.summary_weight + dual.full_weight) / (dual.rrf_k as f32 + 1.0);

    fused
        .into_iter()
        .map(|(position, rrf)| {
            let full = full_similarity.get(&position).copied();
            let summary = best_summary.get(&position).copied();
            let similarity = full
                .unwrap_or(0.0)
                .max(summary.map_or(0.0, |(_, sim)| sim));
            VectorHit {
                position,
                score: if max_rrf > 0.0 { (rrf / max_rrf).min(1.0) } else { 0.0 },
                similarity,
                rrf_score: Some(rrf),
                via_summary: summary.map(|(pos, _)| chunks[pos].id.clone()),
            }
        })
        .filter(|hit| hit.similarity >= request.threshold)
        .take(request.top_k.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{StaticEmbeddingProvider, StaticVectorEnrichment, VectorRecord};
    use crate::error::ErrorKind;
    use crate::test_utils::angle;

    fn matcher_with(provider: StaticEmbeddingProvider) -> VectorMatcher {
        VectorMatcher::new(
            Some(Arc::new(provider)),
            None,
            Arc::new(QueryEmbeddingCache::new(10)),
        )
    }

    fn provider() -> StaticEmbeddingProvider {
        StaticEmbeddingProvider::new("test").with_fallback(vec![1.0, 0.0, 0.0])
    }

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("east").with_embedding(vec![1.0, 0.0, 0.0]),
            Chunk::new("north-east").with_embedding(vec![1.0, 1.0, 0.0]),
            Chunk::new("north").with_embedding(vec![0.0, 1.0, 0.0]),
        ]
    }

    #[tokio::test]
    async fn test_ranks_by_similarity_with_threshold_and_top_k() {
        let matcher = matcher_with(provider());
        let request = VectorQuery {
            threshold: 0.5,
            ..Default::default()
        };
        let outcome = matcher.search("q", &chunks(), &request).await.unwrap();

        let positions: Vec<usize> = outcome.hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert!((outcome.hits[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(outcome.ranked, 3);

        let request = VectorQuery {
            top_k: Some(1),
            ..Default::default()
        };
        let outcome = matcher.search("q", &chunks(), &request).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_query_embedding_is_cached() {
        let provider = Arc::new(provider());
        let matcher = VectorMatcher::new(
            Some(provider.clone()),
            None,
            Arc::new(QueryEmbeddingCache::new(10)),
        );

        let first = matcher.search("dragon", &chunks(), &VectorQuery::default()).await.unwrap();
        let second = matcher.search("dragon", &chunks(), &VectorQuery::default()).await.unwrap();
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(provider.calls(), 1);
        assert_eq!(first.hits, second.hits);
    }

    #[tokio::test]
    async fn test_invalid_embeddings_are_aggregated() {
        let chunks = vec![
            Chunk::new("ok").with_embedding(vec![1.0, 0.0, 0.0]),
            Chunk::new("nan").with_embedding(vec![f32::NAN, 0.0, 0.0]),
            Chunk::new("short").with_embedding(vec![1.0]),
        ];
        let err = matcher_with(provider())
            .search("q", &chunks, &VectorQuery::default())
            .await
            .unwrap_err();

        match err {
            SearchError::InvalidEmbeddings { count, ids } => {
                assert_eq!(count, 2);
                assert_eq!(ids, vec![chunks[1].id.clone(), chunks[2].id.clone()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_embeddings_without_enrichment() {
        let chunks = vec![Chunk::new("bare"), Chunk::new("also bare")];
        let err = matcher_with(provider())
            .search("q", &chunks, &VectorQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::EnrichmentUnavailable { missing: 2 }));
    }

    #[tokio::test]
    async fn test_enrichment_fills_missing_embeddings() {
        let bare = Chunk::new("from the store").in_collection("lore").with_source(ChunkSource::Lorebook);
        let enrichment = Arc::new(StaticVectorEnrichment::new().with_records(
            "lore",
            ChunkSource::Lorebook,
            vec![VectorRecord {
                id: bare.id.clone(),
                vector: vec![1.0, 0.0, 0.0],
            }],
        ));
        let matcher = VectorMatcher::new(
            Some(Arc::new(provider())),
            Some(enrichment.clone()),
            Arc::new(QueryEmbeddingCache::new(10)),
        );

        let chunks = vec![Chunk::new("inline").with_embedding(vec![0.0, 1.0, 0.0]), bare];
        let outcome = matcher.search("q", &chunks, &VectorQuery::default()).await.unwrap();
        assert_eq!(outcome.enriched, 1);
        assert_eq!(outcome.hits[0].position, 1);
        assert_eq!(enrichment.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_id() {
        let matcher = VectorMatcher::new(
            Some(Arc::new(provider())),
            Some(Arc::new(StaticVectorEnrichment::new())),
            Arc::new(QueryEmbeddingCache::new(10)),
        );
        let err = matcher
            .search("q", &[Chunk::new("nowhere")], &VectorQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCollectionId);
    }

    #[tokio::test]
    async fn test_provider_failure_is_surfaced() {
        let matcher = matcher_with(
            StaticEmbeddingProvider::new("down")
                .failing(CollaboratorError::RateLimited { retry_after_ms: None }),
        );
        let err = matcher
            .search("q", &chunks(), &VectorQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::CollaboratorFailure {
                collaborator: "embedding_provider",
                source: CollaboratorError::RateLimited { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_no_provider() {
        let matcher = VectorMatcher::new(None, None, Arc::new(QueryEmbeddingCache::default()));
        let err = matcher
            .search("q", &chunks(), &VectorQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmbeddingProviderUnavailable);
    }

    #[tokio::test]
    async fn test_scope_filters_summaries() {
        let parent = Chunk::new("parent").with_embedding(vec![0.0, 1.0, 0.0]);
        let summary = Chunk::new("summary")
            .with_embedding(vec![1.0, 0.0, 0.0])
            .summary_of(&parent.id);
        let chunks = vec![parent, summary];
        let matcher = matcher_with(provider());

        let summary_only = VectorQuery {
            scope: VectorScope::Summary,
            ..Default::default()
        };
        let outcome = matcher.search("q", &chunks, &summary_only).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].position, 1);

        let full_only = VectorQuery {
            scope: VectorScope::Full,
            ..Default::default()
        };
        let outcome = matcher.search("q", &chunks, &full_only).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].position, 0);
    }

    #[tokio::test]
    async fn test_dual_vector_maps_summaries_to_parents() {
        let a = Chunk::new("a full").with_embedding(vec![0.2, 1.0, 0.0]);
        let b = Chunk::new("b full").with_embedding(vec![0.9, 0.1, 0.0]);
        let a_summary = Chunk::new("a summary")
            .with_embedding(vec![1.0, 0.0, 0.0])
            .summary_of(&a.id);
        let chunks = vec![a.clone(), b, a_summary.clone()];

        let request = VectorQuery {
            dual: Some(DualVectorOptions::default()),
            ..Default::default()
        };
        let outcome = matcher_with(provider())
            .search("q", &chunks, &request)
            .await
            .unwrap();

        // a: summary rank 0 (1.5/61) + full rank 1 (1/62); b: full rank 0 (1/61)
        assert_eq!(outcome.hits.len(), 2);
        assert_eq!(outcome.hits[0].position, 0);
        assert_eq!(outcome.hits[0].via_summary.as_ref(), Some(&a_summary.id));
        assert!((outcome.hits[0].similarity - 1.0).abs() < 1e-6);
        let expected = 1.5 / 61.0 + 1.0 / 62.0;
        assert!((outcome.hits[0].rrf_score.unwrap() - expected).abs() < 1e-6);
        assert!((outcome.hits[0].score - expected / (2.5 / 61.0)).abs() < 1e-6);
        assert_eq!(outcome.hits[1].position, 1);
        assert!(outcome.hits[1].via_summary.is_none());
        assert!((outcome.hits[1].score - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dual_vector_orders_by_fused_rank_not_similarity() {
        // a full at 85 degrees, a summary at 20, b full at 10; query at 0
        let a = Chunk::new("a full").with_embedding(angle(85.0));
        let b = Chunk::new("b full").with_embedding(angle(10.0));
        let a_summary = Chunk::new("a summary")
            .with_embedding(angle(20.0))
            .summary_of(&a.id);
        let chunks = vec![a, b, a_summary];

        let request = VectorQuery {
            dual: Some(DualVectorOptions::default()),
            ..Default::default()
        };
        let matcher = matcher_with(StaticEmbeddingProvider::new("test").with_fallback(angle(0.0)));
        let outcome = matcher.search("q", &chunks, &request).await.unwrap();

        assert_eq!(outcome.hits[0].position, 0);
        assert!(outcome.hits[0].similarity < outcome.hits[1].similarity);
        assert!(outcome.hits[0].score > outcome.hits[1].score);
    }

    #[tokio::test]
    async fn test_dual_vector_threshold_gates_raw_similarity() {
        let a = Chunk::new("a full").with_embedding(angle(85.0));
        let b = Chunk::new("b full").with_embedding(angle(10.0));
        let request = VectorQuery {
            dual: Some(DualVectorOptions::default()),
            threshold: 0.5,
            ..Default::default()
        };
        let matcher = matcher_with(StaticEmbeddingProvider::new("test").with_fallback(angle(0.0)));
        let outcome = matcher.search("q", &[a, b], &request).await.unwrap();

        // b keeps its place although its scaled fused score is only 0.4
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].position, 1);
        assert!((outcome.hits[0].score - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dual_vector_rejects_orphans() {
        let orphan = Chunk::new("orphan summary")
            .with_embedding(vec![1.0, 0.0, 0.0])
            .summary_of(&ChunkId::new("missing-parent"));
        let request = VectorQuery {
            dual: Some(DualVectorOptions::default()),
            ..Default::default()
        };
        let err = matcher_with(provider())
            .search("q", &[orphan], &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrphanSummaries);
    }
}
