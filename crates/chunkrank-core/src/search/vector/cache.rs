//! Bounded LRU cache of query embeddings.

use crate::config::DEFAULT_QUERY_CACHE_CAPACITY;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cache key: exact query text and provider identity.
type CacheKey = (String, String);

/// Query embeddings shared by every search on one engine.
///
/// The lock is only held for the lookup or insertion itself, never across the
/// provider call, so two concurrent misses on the same text may both call the
/// provider. The second insertion simply replaces the first.
#[derive(Debug)]
pub struct QueryEmbeddingCache {
    inner: Mutex<LruCache<CacheKey, Arc<Vec<f32>>>>,
}

impl Default for QueryEmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_CAPACITY)
    }
}

impl QueryEmbeddingCache {
    /// Creates a cache holding up to `capacity` embeddings (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, text: &str, provider: &str) -> Option<Arc<Vec<f32>>> {
        let key = (text.to_string(), provider.to_string());
        self.lock().get(&key).cloned()
    }

    pub fn insert(&self, text: &str, provider: &str, embedding: Arc<Vec<f32>>) {
        self.lock()
            .put((text.to_string(), provider.to_string()), embedding);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<Vec<f32>>>> {
        // Entries are whole values, so a poisoned cache is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
