//! Reciprocal Rank Fusion: score = Σ 1/(k + rank_i)
//!
//! Merges ranked lists whose raw scores live on incompatible scales
//! (unbounded BM25, bounded cosine) using rank positions only.

use std::collections::HashMap;

use newsrag_core::types::{FusedResult, RetrievalHit, ScoreKind};

/// Default smoothing constant. Higher values flatten the gap between top
/// ranks and the tail.
pub const DEFAULT_RRF_K: u32 = 60;

/// Contribution of a 1-indexed `rank` to the fused score.
pub fn rrf_contribution(rank: usize, k: u32) -> f64 {
    1.0 / (f64::from(k) + rank as f64)
}

/// Fuses ranked lists into one list sorted by descending `rrf_score`,
/// ties broken by `chunk_id`.
///
/// A hit absent from a list contributes nothing for that list, and empty
/// lists are allowed, so fusing one empty and one non-empty list yields the
/// surviving list's order. Content and metadata come from the first
/// occurrence of a chunk; the first raw score per score kind is kept.
pub fn fuse(sources: &[Vec<RetrievalHit>], k_rrf: u32) -> Vec<FusedResult> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<FusedResult> = Vec::new();

    for list in sources {
        for (idx, hit) in list.iter().enumerate() {
            let contribution = rrf_contribution(idx + 1, k_rrf);
            let slot = *slots.entry(hit.chunk_id.as_str()).or_insert_with(|| {
                fused.push(FusedResult::from_hit(hit));
                fused.len() - 1
            });
            let entry = &mut fused[slot];
            entry.rrf_score += contribution;
            match hit.score_kind {
                ScoreKind::Lexical => {
                    entry.lexical_score.get_or_insert(hit.score);
                }
                ScoreKind::Vector => {
                    entry.vector_score.get_or_insert(hit.score);
                }
            }
        }
    }

    fused.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f64, kind: ScoreKind) -> RetrievalHit {
        RetrievalHit {
            chunk_id: id.to_string(),
            document_id: format!("doc-{id}"),
            content: format!("content {id}"),
            metadata: Default::default(),
            score,
            score_kind: kind,
        }
    }

    fn ids(results: &[FusedResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[test]
    fn shared_hit_outranks_single_source_hits() {
        let lexical = vec![hit("A", 2.0, ScoreKind::Lexical), hit("B", 1.0, ScoreKind::Lexical)];
        let vector = vec![hit("B", 0.9, ScoreKind::Vector), hit("C", 0.8, ScoreKind::Vector)];
        let fused = fuse(&[lexical, vector], 60);

        assert_eq!(ids(&fused), vec!["B", "A", "C"]);
        let b = &fused[0];
        assert!((b.rrf_score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((b.rrf_score - 0.0325).abs() < 1e-3);
        assert!((fused[1].rrf_score - 1.0 / 61.0).abs() < 1e-12);
        assert!((fused[2].rrf_score - 1.0 / 62.0).abs() < 1e-12);
        assert_eq!(b.lexical_score, Some(1.0));
        assert_eq!(b.vector_score, Some(0.9));
        assert_eq!(fused[1].vector_score, None);
        assert_eq!(fused[2].lexical_score, None);
    }

    #[test]
    fn two_list_score_is_sum_of_contributions() {
        let fused = fuse(
            &[
                vec![hit("x", 1.0, ScoreKind::Lexical), hit("y", 1.0, ScoreKind::Lexical), hit("z", 1.0, ScoreKind::Lexical)],
                vec![hit("z", 0.5, ScoreKind::Vector)],
            ],
            60,
        );
        let z = fused.iter().find(|r| r.chunk_id == "z").unwrap();
        let expected = rrf_contribution(3, 60) + rrf_contribution(1, 60);
        assert!((z.rrf_score - expected).abs() < 1e-12);
        assert!(z.rrf_score > rrf_contribution(3, 60));
        assert!(z.rrf_score > rrf_contribution(1, 60));
    }

    #[test]
    fn ties_break_by_chunk_id() {
        let fused = fuse(
            &[vec![hit("m", 1.0, ScoreKind::Lexical)], vec![hit("b", 1.0, ScoreKind::Vector)]],
            60,
        );
        assert_eq!(ids(&fused), vec!["b", "m"]);
    }

    #[test]
    fn empty_source_passes_other_through() {
        let vector = vec![hit("v2", 0.9, ScoreKind::Vector), hit("v1", 0.8, ScoreKind::Vector)];
        let fused = fuse(&[Vec::new(), vector], 60);
        assert_eq!(ids(&fused), vec!["v2", "v1"]);
        assert!(fuse(&[], 60).is_empty());
        assert!(fuse(&[Vec::new(), Vec::new()], 60).is_empty());
    }

    #[test]
    fn first_seen_score_and_content_win() {
        let mut later = hit("a", 9.0, ScoreKind::Lexical);
        later.content = "later".into();
        let fused = fuse(&[vec![hit("a", 1.0, ScoreKind::Lexical)], vec![later]], 60);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].lexical_score, Some(1.0));
        assert_eq!(fused[0].content, "content a");
    }

    #[test]
    fn larger_k_flattens_rank_gap() {
        let gap = |k| rrf_contribution(1, k) - rrf_contribution(50, k);
        assert!(gap(10) > gap(60));
        assert!(gap(60) > gap(1000));
    }
}
