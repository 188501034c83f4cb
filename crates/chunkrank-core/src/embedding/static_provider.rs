//! In-memory collaborators.
//!
//! Used by tests, benchmarks and the CLI, where embeddings are precomputed
//! and supplied alongside the chunks.

use super::traits::{EmbeddingProvider, VectorEnrichment, VectorRecord};
use crate::error::CollaboratorError;
use crate::search::types::ChunkSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Embedding provider backed by a text -> vector map.
#[derive(Debug, Default)]
pub struct StaticEmbeddingProvider {
    identity: String,
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    failure: Option<CollaboratorError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticEmbeddingProvider {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Maps `text` to `vector`.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Vector returned for texts without an explicit mapping.
    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    /// Fails every call with `error`.
    pub fn failing(mut self, error: CollaboratorError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleeps before answering, to simulate a remote provider.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbeddingProvider {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| CollaboratorError::RequestFailed(format!("no embedding for '{text}'")))
    }
}

/// Vector enrichment backed by an in-memory `(collection, source)` map.
#[derive(Debug, Default)]
pub struct StaticVectorEnrichment {
    collections: HashMap<(String, ChunkSource), Vec<VectorRecord>>,
    failure: Option<CollaboratorError>,
    calls: AtomicUsize,
}

impl StaticVectorEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(
        mut self,
        collection_id: impl Into<String>,
        source: ChunkSource,
        records: Vec<VectorRecord>,
    ) -> Self {
        self.collections
            .entry((collection_id.into(), source))
            .or_default()
            .extend(records);
        self
    }

    pub fn failing(mut self, error: CollaboratorError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of `fetch_vectors` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorEnrichment for StaticVectorEnrichment {
    async fn fetch_vectors(
        &self,
        collection_id: &str,
        source: ChunkSource,
    ) -> Result<Vec<VectorRecord>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self
            .collections
            .get(&(collection_id.to_string(), source))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::ChunkId;

    #[tokio::test]
    async fn test_static_provider_lookup_and_fallback() {
        let provider = StaticEmbeddingProvider::new("static")
            .with_vector("dragon", vec![1.0, 0.0])
            .with_fallback(vec![0.0, 1.0]);

        assert_eq!(provider.embed("dragon").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(provider.embed("other").await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(provider.calls(), 2);

        let batch = provider
            .embed_batch(&["dragon".to_string(), "x".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(provider.identity(), "static");
    }

    #[tokio::test]
    async fn test_static_provider_missing_text() {
        let provider = StaticEmbeddingProvider::new("static");
        assert!(matches!(
            provider.embed("unknown").await,
            Err(CollaboratorError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_static_enrichment_scoped_by_source() {
        let enrichment = StaticVectorEnrichment::new().with_records(
            "lore",
            ChunkSource::Lorebook,
            vec![VectorRecord {
                id: ChunkId::new("a"),
                vector: vec![1.0],
            }],
        );

        let found = enrichment.fetch_vectors("lore", ChunkSource::Lorebook).await.unwrap();
        assert_eq!(found.len(), 1);
        let other = enrichment.fetch_vectors("lore", ChunkSource::Chat).await.unwrap();
        assert!(other.is_empty());
        assert_eq!(enrichment.calls(), 2);
    }
}
