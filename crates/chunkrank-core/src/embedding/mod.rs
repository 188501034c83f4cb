//! Embedding collaborators.
//!
//! - [`EmbeddingProvider`]: query (and optionally chunk) embeddings
//! - [`VectorEnrichment`]: stored chunk embeddings keyed by collection
//! - [`StaticEmbeddingProvider`] / [`StaticVectorEnrichment`]: in-memory
//!   implementations for tests, benchmarks and the CLI

mod static_provider;
mod traits;

pub use static_provider::{StaticEmbeddingProvider, StaticVectorEnrichment};
pub use traits::{EmbeddingProvider, VectorEnrichment, VectorRecord};
