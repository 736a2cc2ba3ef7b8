//! The request pipeline: expansion, hybrid retrieval, filters, rerank, cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use newsrag_core::cache::{EmbeddingCache, ResultCache};
use newsrag_core::config::{RetrievalSettings, Settings};
use newsrag_core::traits::{
    CrossEncoderLoader, DateParser, EmbeddingService, LexicalSearch, QueryExpansionService, VectorStore,
};
use newsrag_core::types::{FusedResult, RankedResult, RetrieveOptions, RetrieveResponse, SearchMode};
use newsrag_core::timing::elapsed_ms;
use newsrag_core::RetrievalError;

use crate::expand::{MultiOutcome, MultiQueryExpander};
use crate::filters::{filter_by_entities, TemporalFilter};
use crate::hybrid::HybridRetriever;
use crate::normalize::to_ranked;
use crate::rerank::{RerankOutcome, RerankerAdapter};
use crate::vector::VectorSearchAdapter;

/// Collaborators the engine is assembled from.
pub struct EngineParts {
    pub lexical: Arc<dyn LexicalSearch>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub vector_store: Arc<dyn VectorStore>,
    pub expansion: Option<Arc<dyn QueryExpansionService>>,
    pub cross_encoder: Option<Box<dyn CrossEncoderLoader>>,
    pub date_parser: Arc<dyn DateParser>,
    pub result_cache: Arc<ResultCache>,
    /// Only held so [`RetrievalEngine::clear_caches`] can reach it; lookups
    /// happen inside the embedding service.
    pub embedding_cache: Option<Arc<EmbeddingCache>>,
}

pub struct RetrievalEngine {
    hybrid: HybridRetriever,
    expander: Option<MultiQueryExpander>,
    reranker: Option<Arc<RerankerAdapter>>,
    temporal: TemporalFilter,
    result_cache: Arc<ResultCache>,
    embedding_cache: Option<Arc<EmbeddingCache>>,
    retrieval: RetrievalSettings,
}

impl RetrievalEngine {
    pub fn new(parts: EngineParts, settings: &Settings) -> Self {
        let retrieval = settings.retrieval.clone();
        let vector = VectorSearchAdapter::new(parts.embedder, parts.vector_store);
        let hybrid = HybridRetriever::new(
            parts.lexical,
            vector,
            retrieval.rrf_k,
            Duration::from_millis(retrieval.branch_timeout_ms),
        )
        .with_min_vector_similarity(retrieval.min_vector_similarity);
        Self {
            hybrid,
            expander: parts
                .expansion
                .map(|service| MultiQueryExpander::new(service, settings.expansion.max_variants)),
            reranker: parts.cross_encoder.map(|loader| Arc::new(RerankerAdapter::new(loader))),
            temporal: TemporalFilter::new(settings.filters.date_presets.clone(), parts.date_parser),
            result_cache: parts.result_cache,
            embedding_cache: parts.embedding_cache,
            retrieval,
        }
    }

    /// Ranked results for `query`, at most `options.top_k` of them.
    pub async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<RankedResult>, RetrievalError> {
        Ok(self.retrieve_detailed(query, options).await?.results.clone())
    }

    /// Runs the full pipeline and reports how the results were produced.
    ///
    /// Only the failure of every branch for every variant is an error;
    /// everything else degrades and the degraded response is cached like
    /// any other.
    pub async fn retrieve_detailed(
        &self,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<Arc<RetrieveResponse>, RetrievalError> {
        let mode = if options.use_hybrid { SearchMode::Hybrid } else { SearchMode::Vector };
        if options.top_k == 0 {
            return Ok(Arc::new(RetrieveResponse {
                query: query.to_string(),
                results: Vec::new(),
                count: 0,
                search_mode: mode,
                reranking_applied: false,
                variants: vec![query.to_string()],
            }));
        }
        if let Some(hit) = self.result_cache.get(query, options) {
            debug!(query, "result cache hit");
            return Ok(hit);
        }

        let started = Instant::now();
        let mut candidate_k = options.top_k.saturating_mul(self.retrieval.candidate_multiplier);
        if options.use_reranking {
            candidate_k = candidate_k.max(options.rerank_top_n);
        }
        let fetch_k = candidate_k.saturating_mul(self.retrieval.source_oversample);
        let document_ids = options.filter_document_ids.as_deref().filter(|ids| !ids.is_empty());

        let variants = if options.use_multi_query { self.variants(query).await } else { vec![query.to_string()] };

        let outcome: MultiOutcome = match (&self.expander, variants.len()) {
            (Some(expander), n) if n > 1 => {
                expander
                    .retrieve_multi(
                        &self.hybrid,
                        &variants,
                        fetch_k,
                        candidate_k,
                        candidate_k,
                        document_ids,
                        mode,
                        self.retrieval.variant_concurrency,
                    )
                    .await
            }
            _ => self.hybrid.retrieve(query, fetch_k, candidate_k, document_ids, mode).await.into(),
        };
        if outcome.all_failed() {
            return Err(RetrievalError::AllSourcesFailed { query: query.to_string(), variants: variants.len() });
        }

        let candidates = self.apply_filters(query, options, outcome.results);
        let (mut results, reranking_applied) = if options.use_reranking {
            self.rerank(query, candidates, options.rerank_top_n).await
        } else {
            (candidates.into_iter().map(|c| to_ranked(c, None)).collect(), false)
        };
        results.truncate(options.top_k);

        let response = Arc::new(RetrieveResponse {
            query: query.to_string(),
            count: results.len(),
            results,
            search_mode: mode,
            reranking_applied,
            variants,
        });
        self.result_cache.insert(query, options, Arc::clone(&response));
        info!(
            query,
            count = response.count,
            degraded = !outcome.failures.is_empty(),
            reranked = reranking_applied,
            elapsed_ms = elapsed_ms(started),
            "retrieval complete"
        );
        Ok(response)
    }

    /// Drops every cached result and embedding.
    pub fn clear_caches(&self) {
        self.result_cache.clear();
        if let Some(cache) = &self.embedding_cache {
            cache.clear();
        }
    }

    async fn variants(&self, query: &str) -> Vec<String> {
        match &self.expander {
            Some(expander) => expander.expand(query).await,
            None => {
                let e = RetrievalError::ExpansionFailed("no expansion service configured".into());
                warn!(query, error = %e, "multi-query requested, using the original query");
                vec![query.to_string()]
            }
        }
    }

    fn apply_filters(&self, query: &str, options: &RetrieveOptions, mut results: Vec<FusedResult>) -> Vec<FusedResult> {
        if let Some(filter) = &options.date_filter {
            match self.temporal.parse(filter) {
                Ok(Some(range)) => {
                    let before = results.len();
                    results = self.temporal.filter(results, &range);
                    debug!(query, before, after = results.len(), "date filter applied");
                }
                Ok(None) => {}
                Err(e) => warn!(query, error = %e, "date filter skipped"),
            }
        }
        filter_by_entities(
            results,
            options.company_filter.as_deref(),
            options.investor_filter.as_deref(),
            options.sector_filter.as_deref(),
        )
    }

    async fn rerank(&self, query: &str, candidates: Vec<FusedResult>, top_n: usize) -> (Vec<RankedResult>, bool) {
        let Some(reranker) = self.reranker.clone() else {
            let e = RetrievalError::RerankUnavailable("no cross-encoder configured".into());
            warn!(query, error = %e, "reranking skipped");
            return (candidates.into_iter().map(|c| to_ranked(c, None)).collect(), false);
        };
        let fallback = candidates.clone();
        let owned_query = query.to_string();
        let joined =
            tokio::task::spawn_blocking(move || reranker.rerank(&owned_query, candidates, top_n)).await;
        match joined {
            Ok(RerankOutcome { results, applied }) => (results, applied),
            Err(e) => {
                let e = RetrievalError::RerankUnavailable(e.to_string());
                warn!(query, error = %e, "reranking skipped");
                (fallback.into_iter().map(|c| to_ranked(c, None)).collect(), false)
            }
        }
    }
}
