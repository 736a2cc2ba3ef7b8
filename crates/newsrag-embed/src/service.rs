//! Async embedding services and the wrappers stacked in front of them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use newsrag_core::cache::EmbeddingCache;
use newsrag_core::traits::{Embedder, EmbeddingService};
use newsrag_core::EmbedError;

/// Runs a blocking [`Embedder`] on the blocking thread pool.
pub struct LocalEmbeddingService {
    embedder: Arc<dyn Embedder>,
}

impl LocalEmbeddingService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let embedder = Arc::clone(&self.embedder);
        let expected = embedder.dim();
        let texts = vec![text.to_owned()];
        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| EmbedError::Transient(e.to_string()))?
            .map_err(|e| EmbedError::Transient(format!("{e:#}")))?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Transient("embedder returned no vectors".into()))?;
        if vector.len() != expected {
            return Err(EmbedError::Dimension { expected, got: vector.len() });
        }
        Ok(vector)
    }
}

/// Retries transient failures with exponential backoff: the n-th retry
/// waits `base_delay * 2^(n-1)`. Dimension mismatches are not retried.
pub struct RetryingEmbedder {
    inner: Arc<dyn EmbeddingService>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingService>, max_retries: u32, base_delay: Duration) -> Self {
        Self { inner, max_retries, base_delay }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[async_trait]
impl EmbeddingService for RetryingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.embed(text).await {
                Ok(v) => return Ok(v),
                Err(e @ EmbedError::Dimension { .. }) => return Err(e),
                Err(e) if attempt >= self.max_retries => {
                    return Err(EmbedError::RetriesExhausted { attempts: attempt + 1, last: e.to_string() });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt = attempt + 1, delay_ms = newsrag_core::timing::millis(delay), error = %e, "embedding failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Serves repeated texts from an [`EmbeddingCache`]. Failures are not cached.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingService>,
    cache: Arc<EmbeddingCache>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingService>, cache: Arc<EmbeddingCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl EmbeddingService for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if let Some(hit) = self.cache.get(text) {
            debug!("embedding cache hit");
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.insert(text, &vector);
        Ok(vector)
    }
}
