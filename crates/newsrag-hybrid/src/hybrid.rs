//! Per-query retrieval: lexical and vector branches in parallel, then RRF.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use newsrag_core::traits::LexicalSearch;
use newsrag_core::types::{DocumentId, FusedResult, RetrievalHit, SearchMode};
use newsrag_core::timing::elapsed_ms;
use newsrag_core::{Branch, RetrievalError};

use crate::fusion::fuse;
use crate::vector::VectorSearchAdapter;

/// Fused candidates for one query plus the branches that failed producing
/// them.
#[derive(Debug, Clone, Default)]
pub struct HybridOutcome {
    pub results: Vec<FusedResult>,
    pub failures: Vec<RetrievalError>,
    pub branches: usize,
}

impl HybridOutcome {
    /// True when every attempted branch failed.
    pub fn all_failed(&self) -> bool {
        self.branches > 0 && self.failures.len() >= self.branches
    }
}

pub struct HybridRetriever {
    lexical: Arc<dyn LexicalSearch>,
    vector: VectorSearchAdapter,
    k_rrf: u32,
    branch_timeout: Duration,
    min_vector_similarity: f32,
}

impl HybridRetriever {
    pub fn new(lexical: Arc<dyn LexicalSearch>, vector: VectorSearchAdapter, k_rrf: u32, branch_timeout: Duration) -> Self {
        Self { lexical, vector, k_rrf, branch_timeout, min_vector_similarity: f32::NEG_INFINITY }
    }

    /// Drops vector hits below `min` in [`SearchMode::Vector`]. Fused
    /// retrieval keeps every vector hit, since RRF only looks at rank.
    pub fn with_min_vector_similarity(mut self, min: f32) -> Self {
        self.min_vector_similarity = min;
        self
    }

    /// Fetches `fetch_k` hits per branch and keeps the best `limit`.
    ///
    /// A failed or timed-out branch contributes an empty list; fusion then
    /// degenerates to the surviving branch. In [`SearchMode::Vector`] only
    /// the vector branch runs and no fusion happens.
    pub async fn retrieve(
        &self,
        query: &str,
        fetch_k: usize,
        limit: usize,
        document_ids: Option<&[DocumentId]>,
        mode: SearchMode,
    ) -> HybridOutcome {
        let mut outcome = HybridOutcome::default();
        let vector_branch = self.timed(Branch::Vector, self.vector.search_text(query, fetch_k, document_ids));

        let mut results = match mode {
            SearchMode::Hybrid => {
                let lexical_branch = self.timed(Branch::Lexical, self.lexical_hits(query, fetch_k, document_ids));
                let (lexical, vector) = tokio::join!(lexical_branch, vector_branch);
                outcome.branches = 2;
                let lexical = self.settle(query, lexical, &mut outcome);
                let vector = self.settle(query, vector, &mut outcome);
                fuse(&[lexical, vector], self.k_rrf)
            }
            SearchMode::Vector => {
                outcome.branches = 1;
                let vector = self.settle(query, vector_branch.await, &mut outcome);
                let min = f64::from(self.min_vector_similarity);
                let total = vector.len();
                let kept: Vec<FusedResult> =
                    vector.iter().filter(|h| h.score >= min).map(FusedResult::from_hit).collect();
                if kept.len() < total {
                    debug!(query, dropped = total - kept.len(), min, "vector hits below threshold");
                }
                kept
            }
        };
        results.truncate(limit);
        outcome.results = results;
        outcome
    }

    async fn lexical_hits(
        &self,
        query: &str,
        k: usize,
        document_ids: Option<&[DocumentId]>,
    ) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let mut hits = self
            .lexical
            .search(query, k)
            .await
            .map_err(|e| RetrievalError::unavailable(Branch::Lexical, format!("{e:#}")))?;
        if let Some(ids) = document_ids {
            hits.retain(|h| ids.contains(&h.document_id));
        }
        Ok(hits)
    }

    async fn timed<F>(&self, branch: Branch, fut: F) -> Result<Vec<RetrievalHit>, RetrievalError>
    where
        F: Future<Output = Result<Vec<RetrievalHit>, RetrievalError>>,
    {
        let started = Instant::now();
        match tokio::time::timeout(self.branch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Timeout {
                branch,
                elapsed_ms: elapsed_ms(started),
            }),
        }
    }

    fn settle(
        &self,
        query: &str,
        result: Result<Vec<RetrievalHit>, RetrievalError>,
        outcome: &mut HybridOutcome,
    ) -> Vec<RetrievalHit> {
        match result {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query, error = %e, "retrieval branch degraded to empty result");
                outcome.failures.push(e);
                Vec::new()
            }
        }
    }
}
