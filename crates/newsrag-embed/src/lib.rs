//! newsrag-embed
//!
//! Embedding and reranking models plus the remote LLM client.
//!
//! - `model`: candle XLM-RoBERTa dense embedder (BGE-M3 layout)
//! - `cross_encoder`: candle sequence-classification reranker
//! - `hash`: deterministic offline embedder
//! - `llm`: HTTP client for embeddings and query rewriting
//! - `service`: async adapters, retry and cache wrappers
pub mod device;
pub mod tokenize;
pub mod pool;
pub mod weights;
pub mod model;
pub mod hash;
pub mod cross_encoder;
pub mod llm;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use newsrag_core::cache::EmbeddingCache;
use newsrag_core::config::{Config, EmbeddingProvider, Settings};
use newsrag_core::traits::EmbeddingService;

pub use cross_encoder::{CandleCrossEncoder, ModelDirLoader};
pub use hash::HashEmbedder;
pub use llm::HttpLlmClient;
pub use model::LocalEmbedder;
pub use pool::masked_mean_l2;
pub use service::{CachedEmbedder, LocalEmbeddingService, RetryingEmbedder};

/// Builds the configured embedding service: provider, then retries, then
/// the shared cache in front.
pub fn build_embedding_service(
    config: &Config,
    settings: &Settings,
    cache: Arc<EmbeddingCache>,
) -> Result<Arc<dyn EmbeddingService>> {
    let emb = &settings.embedding;
    let base: Arc<dyn EmbeddingService> = match emb.provider {
        EmbeddingProvider::Http => {
            Arc::new(HttpLlmClient::new(&settings.llm, &settings.expansion)?.with_dimension(emb.dimension))
        }
        EmbeddingProvider::Local => {
            let model_dir = config.resolve_path(&emb.model_dir);
            Arc::new(LocalEmbeddingService::new(Arc::new(LocalEmbedder::load(&model_dir, emb.max_len)?)))
        }
        EmbeddingProvider::Hash => {
            Arc::new(LocalEmbeddingService::new(Arc::new(HashEmbedder::new(emb.dimension))))
        }
    };
    info!(provider = ?emb.provider, dimension = emb.dimension, "embedding service ready");
    let retrying = Arc::new(RetryingEmbedder::new(
        base,
        emb.max_retries,
        Duration::from_millis(emb.retry_base_delay_ms),
    ));
    Ok(Arc::new(CachedEmbedder::new(retrying, cache)))
}
