//! Error types for chunkrank-core.
//!
//! Every failure surfaced by the engine carries a machine-readable
//! [`ErrorKind`], a human-readable message (its `Display` output), and enough
//! context (counts, first offending chunk ids) to diagnose the problem without
//! re-running the search.

use crate::search::types::ChunkId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Maximum number of offending chunk ids carried by aggregated validation errors.
pub const MAX_REPORTED_IDS: usize = 10;

/// Machine-readable classification of a [`SearchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyQuery,
    NoChunks,
    InvalidSearchMode,
    InvalidOptions,
    InvalidEmbeddings,
    NoSearchData,
    MissingCollectionId,
    EnrichmentUnavailable,
    EmbeddingProviderUnavailable,
    OrphanSummaries,
    CollaboratorFailure,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmptyQuery => "empty_query",
            Self::NoChunks => "no_chunks",
            Self::InvalidSearchMode => "invalid_search_mode",
            Self::InvalidOptions => "invalid_options",
            Self::InvalidEmbeddings => "invalid_embeddings",
            Self::NoSearchData => "no_search_data",
            Self::MissingCollectionId => "missing_collection_id",
            Self::EnrichmentUnavailable => "enrichment_unavailable",
            Self::EmbeddingProviderUnavailable => "embedding_provider_unavailable",
            Self::OrphanSummaries => "orphan_summaries",
            Self::CollaboratorFailure => "collaborator_failure",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors reported by external collaborators (embedding providers, vector enrichment).
///
/// The engine never retries these; they are wrapped in
/// [`SearchError::CollaboratorFailure`] and handed back unchanged so the
/// caller's own retry policy applies.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The request could not be completed
    #[error("Request failed: {0}")]
    RequestFailed(String),
    /// The collaborator asked the caller to slow down
    #[error("Rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited {
        /// Suggested wait before retrying, when the collaborator provides one
        retry_after_ms: Option<u64>,
    },
    /// The collaborator answered with data the engine cannot use
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The collaborator is not reachable or not configured on its side
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while searching.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Query text is empty or whitespace-only
    #[error("Query text cannot be empty")]
    EmptyQuery,

    /// The caller supplied no chunks
    #[error("No chunks supplied to search")]
    NoChunks,

    /// Search mode string is not one of keyword, vector or hybrid
    #[error("Unsupported search mode '{0}' (expected keyword, vector or hybrid)")]
    InvalidSearchMode(String),

    /// An option is outside its documented range
    #[error("Invalid search options: {0}")]
    InvalidOptions(String),

    /// One or more chunk embeddings are empty, non-finite or of the wrong dimension
    #[error("{count} chunk(s) have invalid embeddings (first: {})", format_ids(.ids))]
    InvalidEmbeddings {
        /// Total number of offending chunks
        count: usize,
        /// First offending chunk ids (at most [`MAX_REPORTED_IDS`])
        ids: Vec<ChunkId>,
    },

    /// No chunk carries keywords or embeddings
    #[error("No usable keywords or embeddings in {chunks} chunk(s)")]
    NoSearchData {
        /// Number of inspected chunks
        chunks: usize,
    },

    /// Chunks need enrichment but carry no collection id
    #[error("{count} chunk(s) lack both an embedding and a collection id (first: {})", format_ids(.ids))]
    MissingCollectionId {
        /// Total number of offending chunks
        count: usize,
        /// First offending chunk ids
        ids: Vec<ChunkId>,
    },

    /// Chunks lack embeddings and no enrichment collaborator is configured
    #[error("{missing} chunk(s) lack embeddings and no vector enrichment is configured")]
    EnrichmentUnavailable {
        /// Number of chunks that would need enrichment
        missing: usize,
    },

    /// Vector search was requested but no embedding provider is configured
    #[error("Vector search requires an embedding provider")]
    EmbeddingProviderUnavailable,

    /// Summary chunks reference parents missing from the chunk set
    #[error("{count} summary chunk(s) reference a missing parent (first: {})", format_ids(.ids))]
    OrphanSummaries {
        /// Total number of orphaned summaries
        count: usize,
        /// First orphaned summary ids
        ids: Vec<ChunkId>,
    },

    /// An embedding provider or enrichment collaborator failed
    #[error("{collaborator} failed: {source}")]
    CollaboratorFailure {
        /// Which collaborator failed ("embedding_provider" or "vector_enrichment")
        collaborator: &'static str,
        /// The underlying collaborator error
        #[source]
        source: CollaboratorError,
    },

    /// The search was cancelled before it completed
    #[error("Search cancelled")]
    Cancelled,

    /// Internal failure (e.g. a blocking task could not be joined)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Returns the machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyQuery => ErrorKind::EmptyQuery,
            Self::NoChunks => ErrorKind::NoChunks,
            Self::InvalidSearchMode(_) => ErrorKind::InvalidSearchMode,
            Self::InvalidOptions(_) => ErrorKind::InvalidOptions,
            Self::InvalidEmbeddings { .. } => ErrorKind::InvalidEmbeddings,
            Self::NoSearchData { .. } => ErrorKind::NoSearchData,
            Self::MissingCollectionId { .. } => ErrorKind::MissingCollectionId,
            Self::EnrichmentUnavailable { .. } => ErrorKind::EnrichmentUnavailable,
            Self::EmbeddingProviderUnavailable => ErrorKind::EmbeddingProviderUnavailable,
            Self::OrphanSummaries { .. } => ErrorKind::OrphanSummaries,
            Self::CollaboratorFailure { .. } => ErrorKind::CollaboratorFailure,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Builds an [`InvalidEmbeddings`](Self::InvalidEmbeddings) error from every offending id.
    pub(crate) fn invalid_embeddings(ids: Vec<ChunkId>) -> Self {
        let (count, ids) = truncate_ids(ids);
        Self::InvalidEmbeddings { count, ids }
    }

    /// Builds a [`MissingCollectionId`](Self::MissingCollectionId) error from every offending id.
    pub(crate) fn missing_collection_id(ids: Vec<ChunkId>) -> Self {
        let (count, ids) = truncate_ids(ids);
        Self::MissingCollectionId { count, ids }
    }

    /// Builds an [`OrphanSummaries`](Self::OrphanSummaries) error from every offending id.
    pub(crate) fn orphan_summaries(ids: Vec<ChunkId>) -> Self {
        let (count, ids) = truncate_ids(ids);
        Self::OrphanSummaries { count, ids }
    }

    pub(crate) fn embedding_provider(source: CollaboratorError) -> Self {
        Self::CollaboratorFailure {
            collaborator: "embedding_provider",
            source,
        }
    }

    pub(crate) fn vector_enrichment(source: CollaboratorError) -> Self {
        Self::CollaboratorFailure {
            collaborator: "vector_enrichment",
            source,
        }
    }
}

/// Convert String to SearchError for `platform::run_blocking` compatibility
impl From<String> for SearchError {
    fn from(s: String) -> Self {
        SearchError::Internal(s)
    }
}

fn truncate_ids(mut ids: Vec<ChunkId>) -> (usize, Vec<ChunkId>) {
    let count = ids.len();
    ids.truncate(MAX_REPORTED_IDS);
    (count, ids)
}

fn format_ids(ids: &[ChunkId]) -> String {
    ids.iter()
        .map(ChunkId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
