use proptest::prelude::*;

use newsrag_core::types::{RetrievalHit, ScoreKind};
use newsrag_hybrid::filters::filter_by_entities;
use newsrag_hybrid::fusion::{fuse, rrf_contribution};
use newsrag_hybrid::normalize::{bounded, similarity};

fn hits(ids: &[u8], kind: ScoreKind) -> Vec<RetrievalHit> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(**id))
        .enumerate()
        .map(|(i, id)| RetrievalHit {
            chunk_id: format!("c{id}"),
            document_id: format!("d{id}"),
            content: String::new(),
            metadata: Default::default(),
            score: 10.0 - i as f64,
            score_kind: kind,
        })
        .collect()
}

fn any_score() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        Just(None),
        Just(Some(f64::NAN)),
        Just(Some(f64::INFINITY)),
        Just(Some(f64::NEG_INFINITY)),
        any::<f64>().prop_map(Some),
    ]
}

proptest! {
    #[test]
    fn similarity_is_always_bounded(r in any_score(), f in any_score(), v in any_score(), l in any_score()) {
        let s = similarity(r, f, v, l);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn bounded_is_idempotent(x in any::<f64>()) {
        prop_assert_eq!(bounded(bounded(x)), bounded(x));
    }

    #[test]
    fn fuse_is_deterministic(a in prop::collection::vec(0u8..30, 0..20), b in prop::collection::vec(0u8..30, 0..20)) {
        let sources = vec![hits(&a, ScoreKind::Lexical), hits(&b, ScoreKind::Vector)];
        prop_assert_eq!(fuse(&sources, 60), fuse(&sources, 60));
    }

    #[test]
    fn fused_scores_are_sorted_and_unique(a in prop::collection::vec(0u8..30, 0..20), b in prop::collection::vec(0u8..30, 0..20)) {
        let fused = fuse(&[hits(&a, ScoreKind::Lexical), hits(&b, ScoreKind::Vector)], 60);
        for w in fused.windows(2) {
            prop_assert!(w[0].rrf_score > w[1].rrf_score
                || (w[0].rrf_score == w[1].rrf_score && w[0].chunk_id < w[1].chunk_id));
        }
        let mut ids: Vec<_> = fused.iter().map(|f| f.chunk_id.clone()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), fused.len());
    }

    #[test]
    fn adding_a_source_never_lowers_a_score(a in prop::collection::vec(0u8..30, 1..20), b in prop::collection::vec(0u8..30, 1..20)) {
        let single = fuse(&[hits(&a, ScoreKind::Lexical)], 60);
        let both = fuse(&[hits(&a, ScoreKind::Lexical), hits(&b, ScoreKind::Vector)], 60);
        for s in &single {
            let after = both.iter().find(|f| f.chunk_id == s.chunk_id).map(|f| f.rrf_score);
            prop_assert!(after.is_some_and(|x| x >= s.rrf_score));
        }
    }

    #[test]
    fn contributions_decrease_with_rank(rank in 1usize..1000, k in 1u32..200) {
        prop_assert!(rrf_contribution(rank, k) > rrf_contribution(rank + 1, k));
    }

    #[test]
    fn entity_filter_is_deterministic(names in prop::collection::vec("[a-c]{1,3}", 0..8), term in "[a-c]{1,2}") {
        let results: Vec<RetrievalHit> = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut h = hits(&[i as u8], ScoreKind::Lexical).remove(0);
                h.metadata.insert("companies".into(), serde_json::json!([n]));
                h
            })
            .collect();
        let terms = vec![term];
        let once = filter_by_entities(results.clone(), Some(terms.as_slice()), None, None);
        let twice = filter_by_entities(results, Some(terms.as_slice()), None, None);
        prop_assert_eq!(once, twice);
    }
}
