//! Multi-query expansion: rewrite the query, retrieve per variant, merge.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use newsrag_core::traits::QueryExpansionService;
use newsrag_core::types::{DocumentId, FusedResult, SearchMode};
use newsrag_core::RetrievalError;

use crate::hybrid::{HybridOutcome, HybridRetriever};

/// Upper bound on variants, original included.
pub const MAX_VARIANTS: usize = 5;

pub struct MultiQueryExpander {
    service: Arc<dyn QueryExpansionService>,
    max_variants: usize,
}

/// Merged candidates across variants and every branch failure seen.
#[derive(Debug, Clone, Default)]
pub struct MultiOutcome {
    pub results: Vec<FusedResult>,
    pub failures: Vec<RetrievalError>,
    pub branches: usize,
}

impl MultiOutcome {
    pub fn all_failed(&self) -> bool {
        self.branches > 0 && self.failures.len() >= self.branches
    }
}

impl From<HybridOutcome> for MultiOutcome {
    fn from(o: HybridOutcome) -> Self {
        Self { results: o.results, failures: o.failures, branches: o.branches }
    }
}

impl MultiQueryExpander {
    pub fn new(service: Arc<dyn QueryExpansionService>, max_variants: usize) -> Self {
        Self { service, max_variants: max_variants.clamp(1, MAX_VARIANTS) }
    }

    /// Query variants with the original first. Never fails: on a service
    /// error or an empty answer the result is `[query]`.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        let generated = match self.service.generate_variants(query).await {
            Ok(v) => v,
            Err(e) => {
                let e = RetrievalError::ExpansionFailed(format!("{e:#}"));
                warn!(query, error = %e, "falling back to the original query");
                return vec![query.trim().to_string()];
            }
        };
        let variants = order_variants(query, generated, self.max_variants);
        if variants.len() == 1 {
            warn!(query, "expansion produced no usable variants");
        }
        variants
    }

    /// Retrieves every variant with at most `concurrency` in flight, keeps
    /// the first occurrence of each chunk in variant order, then sorts by
    /// the best available score and truncates to `limit`.
    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve_multi(
        &self,
        retriever: &HybridRetriever,
        variants: &[String],
        fetch_k: usize,
        per_variant_k: usize,
        limit: usize,
        document_ids: Option<&[DocumentId]>,
        mode: SearchMode,
        concurrency: usize,
    ) -> MultiOutcome {
        let outcomes: Vec<HybridOutcome> = stream::iter(variants)
            .map(|v| retriever.retrieve(v, fetch_k, per_variant_k, document_ids, mode))
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut merged = MultiOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        for outcome in outcomes {
            merged.branches += outcome.branches;
            merged.failures.extend(outcome.failures);
            for result in outcome.results {
                if seen.insert(result.chunk_id.clone()) {
                    merged.results.push(result);
                }
            }
        }
        merged.results.sort_by(|a, b| b.priority_score().total_cmp(&a.priority_score()));
        merged.results.truncate(limit);
        info!(variants = variants.len(), results = merged.results.len(), "multi-query retrieval merged");
        merged
    }
}

/// Original query first, then distinct non-blank variants, capped at `max`.
pub fn order_variants(query: &str, generated: Vec<String>, max: usize) -> Vec<String> {
    let mut out = vec![query.trim().to_string()];
    for v in generated {
        let v = v.trim();
        if v.is_empty() || out.iter().any(|o| o == v) {
            continue;
        }
        out.push(v.to_string());
    }
    out.truncate(max.max(1));
    out
}
