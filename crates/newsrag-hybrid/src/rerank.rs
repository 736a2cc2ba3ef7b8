//! Cross-encoder reranking over a bounded window of candidates.
//!
//! The model loads on first use. A failed load is remembered for the life
//! of the adapter and later calls skip reranking without retrying it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};

use newsrag_core::traits::{CrossEncoder, CrossEncoderLoader};
use newsrag_core::types::{FusedResult, RankedResult};
use newsrag_core::timing::elapsed_ms;
use newsrag_core::RetrievalError;

use crate::normalize::to_ranked;

enum ModelState {
    Unloaded,
    Loaded(Arc<dyn CrossEncoder>),
    LoadFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loaded,
    LoadFailed,
}

/// Reranked results and whether the model actually reordered them.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub results: Vec<RankedResult>,
    pub applied: bool,
}

pub struct RerankerAdapter {
    loader: Box<dyn CrossEncoderLoader>,
    state: Mutex<ModelState>,
}

impl RerankerAdapter {
    pub fn new(loader: Box<dyn CrossEncoderLoader>) -> Self {
        Self { loader, state: Mutex::new(ModelState::Unloaded) }
    }

    pub fn status(&self) -> ModelStatus {
        match self.state.lock().as_deref() {
            Ok(ModelState::Unloaded) => ModelStatus::Unloaded,
            Ok(ModelState::Loaded(_)) => ModelStatus::Loaded,
            Ok(ModelState::LoadFailed(_)) | Err(_) => ModelStatus::LoadFailed,
        }
    }

    fn model(&self) -> Result<Arc<dyn CrossEncoder>, RetrievalError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RetrievalError::RerankUnavailable("model state lock poisoned".into()))?;
        match &*state {
            ModelState::Loaded(model) => return Ok(Arc::clone(model)),
            ModelState::LoadFailed(reason) => return Err(RetrievalError::RerankUnavailable(reason.clone())),
            ModelState::Unloaded => {}
        }
        let started = Instant::now();
        match self.loader.load() {
            Ok(model) => {
                let model: Arc<dyn CrossEncoder> = Arc::from(model);
                info!(elapsed_ms = elapsed_ms(started), "reranker model loaded");
                *state = ModelState::Loaded(Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                *state = ModelState::LoadFailed(reason.clone());
                Err(RetrievalError::RerankUnavailable(reason))
            }
        }
    }

    /// Scores the first `top_k` candidates against `query` and orders them
    /// by descending score (stable for equal scores); the rest follow in
    /// their original order. On any failure the input comes back in its
    /// original order with `applied == false`.
    pub fn rerank(&self, query: &str, candidates: Vec<FusedResult>, top_k: usize) -> RerankOutcome {
        let window = top_k.min(candidates.len());
        if window == 0 {
            return unranked(candidates);
        }
        let model = match self.model() {
            Ok(m) => m,
            Err(e) => {
                warn!(query, error = %e, "reranking skipped");
                return unranked(candidates);
            }
        };

        let pairs: Vec<(String, String)> =
            candidates[..window].iter().map(|c| (query.to_string(), c.content.clone())).collect();
        let scores = match model.score_pairs(&pairs) {
            Ok(s) if s.len() == window => s,
            Ok(s) => {
                let e = RetrievalError::RerankUnavailable(format!("{} scores for {} pairs", s.len(), window));
                warn!(query, error = %e, "reranking skipped");
                return unranked(candidates);
            }
            Err(e) => {
                let e = RetrievalError::RerankUnavailable(format!("{e:#}"));
                warn!(query, error = %e, "reranking skipped");
                return unranked(candidates);
            }
        };

        let mut rest = candidates;
        let tail = rest.split_off(window);
        let mut scored: Vec<(f64, FusedResult)> = scores.into_iter().map(f64::from).zip(rest).collect();
        scored.sort_by(|a, b| sort_key(b.0).total_cmp(&sort_key(a.0)));

        let mut results: Vec<RankedResult> = scored.into_iter().map(|(s, c)| to_ranked(c, Some(s))).collect();
        results.extend(tail.into_iter().map(|c| to_ranked(c, None)));
        debug!(query, window, total = results.len(), "reranked candidates");
        RerankOutcome { results, applied: true }
    }
}

fn sort_key(score: f64) -> f64 {
    if score.is_nan() { f64::NEG_INFINITY } else { score }
}

fn unranked(candidates: Vec<FusedResult>) -> RerankOutcome {
    RerankOutcome { results: candidates.into_iter().map(|c| to_ranked(c, None)).collect(), applied: false }
}
