//! Query-time embedding cache.
//!
//! Questions asked repeatedly during a serving session should not cost a
//! round trip to the embedding service each time. [`CachedEmbedder`] puts a
//! [`QueryCache`] in front of any [`EmbeddingProvider`]; the cache is an
//! explicit value handed in at construction, not process-global state, and
//! the caller picks its bound through [`CachePolicy`].
//!
//! Keys are the exact question text. No normalization happens, so
//! `"What is X?"` and `"what is x?"` are different entries.
//!
//! The cache is shared by concurrent requests. Two requests for the same
//! uncached question may both reach the service; the later insert wins.

use crate::error::Result;
use crate::provider::EmbeddingProvider;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Storage for query embeddings, keyed by exact query text.
pub trait QueryCache: Send + Sync {
    /// Look up a previously stored vector.
    fn get(&self, text: &str) -> Option<Vec<f32>>;

    /// Store a vector, replacing any existing entry for `text`.
    fn insert(&self, text: String, embedding: Vec<f32>);

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&self);
}

// A panic while holding the lock cannot leave a half-written map entry, so a
// poisoned lock is still safe to use.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache that never evicts. Grows with the number of distinct questions.
#[derive(Debug, Default)]
pub struct UnboundedCache {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl UnboundedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryCache for UnboundedCache {
    fn get(&self, text: &str) -> Option<Vec<f32>> {
        lock(&self.entries).get(text).cloned()
    }

    fn insert(&self, text: String, embedding: Vec<f32>) {
        lock(&self.entries).insert(text, embedding);
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    fn clear(&self) {
        lock(&self.entries).clear();
    }
}

/// Fixed-capacity cache evicting the least recently used question.
#[derive(Debug)]
pub struct LruQueryCache {
    entries: Mutex<LruCache<String, Vec<f32>>>,
}

impl LruQueryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        lock(&self.entries).cap().get()
    }
}

impl QueryCache for LruQueryCache {
    fn get(&self, text: &str) -> Option<Vec<f32>> {
        lock(&self.entries).get(text).cloned()
    }

    fn insert(&self, text: String, embedding: Vec<f32>) {
        lock(&self.entries).put(text, embedding);
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    fn clear(&self) {
        lock(&self.entries).clear();
    }
}

/// How the query cache is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Keep every entry for the life of the process.
    Unbounded,
    /// Keep at most this many entries, evicting the least recently used.
    Lru(NonZeroUsize),
}

impl CachePolicy {
    /// `0` means unbounded, anything else is an LRU capacity.
    pub fn from_capacity(capacity: usize) -> Self {
        NonZeroUsize::new(capacity).map_or(Self::Unbounded, Self::Lru)
    }

    /// Build an empty cache following this policy.
    pub fn build(self) -> Arc<dyn QueryCache> {
        match self {
            Self::Unbounded => Arc::new(UnboundedCache::new()),
            Self::Lru(capacity) => Arc::new(LruQueryCache::new(capacity)),
        }
    }
}

/// An embedding provider paired with a query cache.
///
/// [`embed`](Self::embed) always reaches the provider and is meant for
/// ingestion, where every chunk is distinct. [`embed_query`](Self::embed_query)
/// consults the cache first and is meant for questions.
#[derive(Clone)]
pub struct CachedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn QueryCache>,
}

impl std::fmt::Debug for CachedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_name())
            .field("cached_queries", &self.cache.len())
            .finish()
    }
}

impl CachedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<dyn QueryCache>) -> Self {
        Self { provider, cache }
    }

    /// Convenience constructor building the cache from `policy`.
    pub fn with_policy(provider: Arc<dyn EmbeddingProvider>, policy: CachePolicy) -> Self {
        Self::new(provider, policy.build())
    }

    /// Uncached embedding.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.provider.embed_text(text).await
    }

    /// Cached embedding keyed on the exact `text`.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            tracing::debug!("Query embedding cache hit");
            return Ok(hit);
        }

        let embedding = self.provider.embed_text(text).await?;
        self.cache.insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    /// Provider returning the text length as a one-dimensional vector and counting calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ModelError::malformed("test://embed", "no vector"));
            }
            Ok(vec![text.len() as f32])
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_embed_query_hits_cache() {
        let provider = Arc::new(CountingProvider::default());
        let embedder = CachedEmbedder::with_policy(provider.clone(), CachePolicy::Unbounded);

        let first = embedder.embed_query("what is a chunk?").await.unwrap();
        let second = embedder.embed_query("what is a chunk?").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.cache().len(), 1);
        assert!(logs_contain("Query embedding cache hit"));
    }

    #[tokio::test]
    async fn test_cache_key_is_exact_text() {
        let provider = Arc::new(CountingProvider::default());
        let embedder = CachedEmbedder::with_policy(provider.clone(), CachePolicy::Unbounded);

        embedder.embed_query("What is X?").await.unwrap();
        embedder.embed_query("what is x?").await.unwrap();
        embedder.embed_query("What is X? ").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(embedder.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_embed_bypasses_cache() {
        let provider = Arc::new(CountingProvider::default());
        let embedder = CachedEmbedder::with_policy(provider.clone(), CachePolicy::Unbounded);

        embedder.embed("chunk text").await.unwrap();
        embedder.embed("chunk text").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(embedder.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let embedder = CachedEmbedder::with_policy(provider.clone(), CachePolicy::Unbounded);

        assert!(embedder.embed_query("q").await.is_err());
        assert!(embedder.embed_query("q").await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(embedder.cache().is_empty());
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let cache = LruQueryCache::new(NonZeroUsize::new(2).unwrap());
        cache.insert("a".to_string(), vec![1.0]);
        cache.insert("b".to_string(), vec![2.0]);

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get("a"), Some(vec![1.0]));
        cache.insert("c".to_string(), vec![3.0]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(vec![1.0]));
        assert_eq!(cache.get("c"), Some(vec![3.0]));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = UnboundedCache::new();
        cache.insert("q".to_string(), vec![1.0]);
        cache.insert("q".to_string(), vec![2.0]);
        assert_eq!(cache.get("q"), Some(vec![2.0]));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_policy_from_capacity() {
        assert_eq!(CachePolicy::from_capacity(0), CachePolicy::Unbounded);
        assert_eq!(
            CachePolicy::from_capacity(16),
            CachePolicy::Lru(NonZeroUsize::new(16).unwrap())
        );
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_safe() {
        let provider = Arc::new(CountingProvider::default());
        let embedder = CachedEmbedder::with_policy(
            provider.clone(),
            CachePolicy::Lru(NonZeroUsize::new(8).unwrap()),
        );

        let mut handles = Vec::new();
        for i in 0..32 {
            let embedder = embedder.clone();
            handles.push(tokio::spawn(async move {
                embedder.embed_query(&format!("question {}", i % 4)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(embedder.cache().len(), 4);
        assert!(provider.calls.load(Ordering::SeqCst) >= 4);
    }
}
