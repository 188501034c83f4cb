//! Collaborator traits for embeddings.
//!
//! The engine never produces embeddings itself. Query embeddings come from an
//! [`EmbeddingProvider`]; chunk embeddings that are missing from the supplied
//! chunks are fetched from a [`VectorEnrichment`] collaborator (typically a
//! vector database keyed by collection).
//!
//! Neither trait is retried by the engine: errors are surfaced to the caller
//! as [`SearchError::CollaboratorFailure`](crate::SearchError::CollaboratorFailure).

use crate::error::CollaboratorError;
use crate::search::types::{ChunkId, ChunkSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Produces embeddings for text.
///
/// # Examples
///
/// ```ignore
/// struct RemoteProvider { client: HttpClient, model: String }
///
/// #[async_trait]
/// impl EmbeddingProvider for RemoteProvider {
///     fn identity(&self) -> &str { &self.model }
///
///     async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
///         self.client.embed(&self.model, text).await
///             .map_err(|e| CollaboratorError::RequestFailed(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identity of the provider and model.
    ///
    /// Part of the query-embedding cache key, so two providers never share
    /// cached vectors.
    fn identity(&self) -> &str;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;

    /// Embeds several texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// A stored chunk embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: ChunkId,
    pub vector: Vec<f32>,
}

/// Fetches stored chunk embeddings by collection.
#[async_trait]
pub trait VectorEnrichment: Send + Sync {
    /// Every stored vector of `collection_id` for chunks from `source`.
    async fn fetch_vectors(
        &self,
        collection_id: &str,
        source: ChunkSource,
    ) -> Result<Vec<VectorRecord>, CollaboratorError>;
}
