//! Process-local TTL caches for final results and query embeddings.
//!
//! Entries expire `ttl` after insertion and are never returned once expired;
//! eviction happens lazily inside moka. There is no size cap, TTL alone
//! bounds growth.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use tracing::info;

use crate::types::{RetrieveOptions, RetrieveResponse};

/// Thread-safe string-keyed cache with a fixed time-to-live.
///
/// A cache built with a zero TTL (or via [`TtlCache::disabled`]) stores
/// nothing, which lets callers inject a no-op cache in tests.
pub struct TtlCache<V: Clone + Send + Sync + 'static> {
    inner: Option<Cache<String, V>>,
    ttl: Duration,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        if ttl.is_zero() {
            return Self::disabled();
        }
        let inner = Cache::builder().time_to_live(ttl).build();
        Self { inner: Some(inner), ttl }
    }

    pub fn disabled() -> Self {
        Self { inner: None, ttl: Duration::ZERO }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.as_ref()?.get(key)
    }

    pub fn insert(&self, key: String, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value);
        }
    }

    pub fn len(&self) -> u64 {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count()
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}

/// Hex blake3 digest of the JSON encoding of `value`.
pub fn content_key<T: Serialize + std::fmt::Debug>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_else(|_| format!("{value:?}").into_bytes());
    blake3::hash(&bytes).to_hex().to_string()
}

/// Cache key for a retrieval request: the query text plus the normalized
/// option set.
pub fn result_key(query: &str, options: &RetrieveOptions) -> String {
    content_key(&(query, options.normalized()))
}

/// Hex blake3 digest of the raw text.
pub fn text_key(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Memoized final responses keyed by `(query, normalized options)`.
pub struct ResultCache {
    inner: TtlCache<Arc<RetrieveResponse>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: TtlCache::new(ttl) }
    }

    pub fn disabled() -> Self {
        Self { inner: TtlCache::disabled() }
    }

    pub fn get(&self, query: &str, options: &RetrieveOptions) -> Option<Arc<RetrieveResponse>> {
        self.inner.get(&result_key(query, options))
    }

    pub fn insert(&self, query: &str, options: &RetrieveOptions, response: Arc<RetrieveResponse>) {
        self.inner.insert(result_key(query, options), response);
    }

    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
        info!("result cache cleared");
    }
}

/// Memoized embedding vectors keyed by a hash of the raw text.
pub struct EmbeddingCache {
    inner: TtlCache<Arc<[f32]>>,
}

impl EmbeddingCache {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: TtlCache::new(ttl) }
    }

    pub fn disabled() -> Self {
        Self { inner: TtlCache::disabled() }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.inner.get(&text_key(text)).map(|v| v.to_vec())
    }

    pub fn insert(&self, text: &str, embedding: &[f32]) {
        self.inner.insert(text_key(text), Arc::from(embedding));
    }

    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
        info!("embedding cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchMode;

    fn response(query: &str) -> Arc<RetrieveResponse> {
        Arc::new(RetrieveResponse {
            query: query.to_string(),
            results: vec![],
            count: 0,
            search_mode: SearchMode::Hybrid,
            reranking_applied: false,
            variants: vec![query.to_string()],
        })
    }

    #[test]
    fn insert_and_get() {
        let cache: TtlCache<Vec<f32>> = TtlCache::new(Duration::from_secs(60));
        cache.insert("k".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get("k"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(50));
        cache.insert("k".to_string(), 7);
        assert_eq!(cache.get("k"), Some(7));
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn zero_ttl_disables_storage() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::ZERO);
        cache.insert("k".to_string(), 1);
        assert!(!cache.is_enabled());
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn clear_empties_cache() {
        let cache = EmbeddingCache::new(Duration::from_secs(60));
        cache.insert("a", &[1.0]);
        cache.insert("b", &[2.0]);
        cache.clear();
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn result_key_ignores_filter_order_and_duplicates() {
        let a = RetrieveOptions {
            company_filter: Some(vec!["OpenAI".into(), "Anthropic".into()]),
            ..RetrieveOptions::default()
        };
        let b = RetrieveOptions {
            company_filter: Some(vec!["Anthropic".into(), " OpenAI ".into(), "Anthropic".into()]),
            ..RetrieveOptions::default()
        };
        assert_eq!(result_key("ai funding", &a), result_key("ai funding", &b));

        let empty = RetrieveOptions { company_filter: Some(vec![]), ..RetrieveOptions::default() };
        assert_eq!(result_key("q", &empty), result_key("q", &RetrieveOptions::default()));
    }

    #[test]
    fn result_key_separates_queries_and_options() {
        let opts = RetrieveOptions::default();
        assert_ne!(result_key("a", &opts), result_key("b", &opts));
        let reranked = RetrieveOptions { use_reranking: true, ..RetrieveOptions::default() };
        assert_ne!(result_key("a", &opts), result_key("a", &reranked));
    }

    #[test]
    fn result_cache_round_trips_response() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let opts = RetrieveOptions::default();
        assert!(cache.get("q", &opts).is_none());
        cache.insert("q", &opts, response("q"));
        let hit = cache.get("q", &opts).expect("cached");
        assert_eq!(hit.query, "q");
        assert_eq!(cache.len(), 1);
    }
}
