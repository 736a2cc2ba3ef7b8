//! Maps heterogeneous raw scores onto the public `[0, 1]` similarity.

use newsrag_core::types::{FusedResult, RankedResult};

/// Replaces non-finite values (NaN → 0, +∞ → 1, −∞ → 0) and clamps to `[0, 1]`.
pub fn bounded(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else if raw == f64::INFINITY {
        1.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Squashes an unbounded non-negative lexical score into `[0, 1)`.
pub fn lexical_similarity(score: f64) -> f64 {
    if score.is_nan() || score <= 0.0 {
        0.0
    } else if score.is_infinite() {
        1.0
    } else {
        score / (1.0 + score)
    }
}

/// First available of rerank, rrf, vector and lexical-derived score,
/// bounded to `[0, 1]`.
pub fn similarity(
    rerank_score: Option<f64>,
    rrf_score: Option<f64>,
    vector_score: Option<f64>,
    lexical_score: Option<f64>,
) -> f64 {
    let raw = rerank_score
        .or(rrf_score)
        .or(vector_score)
        .or_else(|| lexical_score.map(lexical_similarity))
        .unwrap_or(0.0);
    bounded(raw)
}

/// Final shape of a candidate. A zero `rrf_score` means the candidate was
/// never fused and is reported without one.
pub fn to_ranked(result: FusedResult, rerank_score: Option<f64>) -> RankedResult {
    let rrf_score = (result.rrf_score > 0.0).then_some(result.rrf_score);
    let similarity = similarity(rerank_score, rrf_score, result.vector_score, result.lexical_score);
    RankedResult {
        content: result.content,
        metadata: result.metadata,
        document_id: result.document_id,
        chunk_id: result.chunk_id,
        similarity,
        rerank_score,
        lexical_score: result.lexical_score,
        vector_score: result.vector_score,
        rrf_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_map_to_bounds() {
        assert_eq!(bounded(f64::NAN), 0.0);
        assert_eq!(bounded(f64::INFINITY), 1.0);
        assert_eq!(bounded(f64::NEG_INFINITY), 0.0);
        assert_eq!(bounded(-0.3), 0.0);
        assert_eq!(bounded(7.5), 1.0);
        assert_eq!(bounded(0.42), 0.42);
    }

    #[test]
    fn priority_is_rerank_then_rrf_then_vector_then_lexical() {
        assert_eq!(similarity(Some(0.9), Some(0.03), Some(0.5), Some(3.0)), 0.9);
        assert_eq!(similarity(None, Some(0.03), Some(0.5), Some(3.0)), 0.03);
        assert_eq!(similarity(None, None, Some(0.5), Some(3.0)), 0.5);
        assert_eq!(similarity(None, None, None, Some(3.0)), 0.75);
        assert_eq!(similarity(None, None, None, None), 0.0);
    }

    #[test]
    fn nan_rerank_score_is_not_skipped() {
        assert_eq!(similarity(Some(f64::NAN), Some(0.03), None, None), 0.0);
    }

    #[test]
    fn unfused_results_report_no_rrf() {
        let fused = FusedResult {
            chunk_id: "c".into(),
            document_id: "d".into(),
            content: String::new(),
            metadata: Default::default(),
            rrf_score: 0.0,
            lexical_score: None,
            vector_score: Some(0.8),
        };
        let ranked = to_ranked(fused, None);
        assert_eq!(ranked.rrf_score, None);
        assert!((ranked.similarity - 0.8).abs() < 1e-12);
    }
}
