use std::sync::Arc;

use tracing::debug;

use newsrag_core::traits::{EmbeddingService, VectorStore};
use newsrag_core::types::{DocumentId, RetrievalHit, ScoreKind};
use newsrag_core::{Branch, RetrievalError};

/// Embeds the query and passes it to the vector store.
///
/// Results keep the store's similarity order. Every failure surfaces as
/// `RetrievalUnavailable` for the caller to degrade.
pub struct VectorSearchAdapter {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
}

impl VectorSearchAdapter {
    pub fn new(embedder: Arc<dyn EmbeddingService>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn search_text(
        &self,
        query: &str,
        k: usize,
        document_ids: Option<&[DocumentId]>,
    ) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RetrievalError::unavailable(Branch::Vector, e))?;
        self.search(&vector, k, document_ids).await
    }

    pub async fn search(
        &self,
        vector: &[f32],
        k: usize,
        document_ids: Option<&[DocumentId]>,
    ) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let neighbors = self
            .store
            .nearest_neighbors(vector, k, document_ids)
            .await
            .map_err(|e| RetrievalError::unavailable(Branch::Vector, format!("{e:#}")))?;
        let hits: Vec<RetrievalHit> = neighbors
            .into_iter()
            .map(|n| RetrievalHit {
                chunk_id: n.id,
                document_id: n.document_id,
                content: n.content,
                metadata: n.metadata,
                score: f64::from(n.similarity),
                score_kind: ScoreKind::Vector,
            })
            .collect();
        debug!(hits = hits.len(), k, "vector search returned");
        Ok(hits)
    }
}
