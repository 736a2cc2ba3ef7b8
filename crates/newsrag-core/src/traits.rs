//! Capabilities the engine consumes. Every one of them is replaceable;
//! tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EmbedError;
use crate::types::{Chunk, ChunkFilter, DocumentId, Neighbor, RetrievalHit};

/// Synchronous batch embedder backed by a local model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Turns a query string into a vector for the vector store.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Supplies the chunks the lexical index is built from.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn list_chunks(&self, filter: Option<&ChunkFilter>) -> anyhow::Result<Vec<Chunk>>;
}

/// External nearest-neighbour search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        document_ids: Option<&[DocumentId]>,
    ) -> anyhow::Result<Vec<Neighbor>>;
}

/// Keyword retrieval over the chunk corpus.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievalHit>>;
}

/// Structured-output text generation producing query rewrites.
#[async_trait]
pub trait QueryExpansionService: Send + Sync {
    async fn generate_variants(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

/// Jointly scores `(query, passage)` pairs; higher is more relevant.
pub trait CrossEncoder: Send + Sync {
    fn score_pairs(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}

/// Produces a cross-encoder on first use.
pub trait CrossEncoderLoader: Send + Sync {
    fn load(&self) -> anyhow::Result<Box<dyn CrossEncoder>>;
}

/// Resolves free-form date strings; ambiguity is the parser's concern.
pub trait DateParser: Send + Sync {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>>;
}
