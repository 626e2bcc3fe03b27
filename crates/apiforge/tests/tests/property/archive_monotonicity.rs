//! Property tests: the best score per target never decreases, and size
//! only breaks ties at equal score.

use apiforge_action::{Action, HttpVerb, Individual, Parameter, SampleType};
use apiforge_gene::GeneTree;
use apiforge_search::{Archive, EvaluatedIndividual, EvaluationReport, TargetScore};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TARGETS: [&str; 4] = ["t0", "t1", "t2", "t3"];

fn evaluated(size: usize, scores: &[(usize, f64)]) -> EvaluatedIndividual {
    let mut ind = Individual::new(SampleType::Random);
    for i in 0..size {
        ind.add_main_action(Action::http(
            HttpVerb::Get,
            &format!("/r{i}"),
            vec![Parameter::query("q", GeneTree::integer("q"))],
        ));
    }
    let report = EvaluationReport {
        action_results: vec![],
        coverage: scores
            .iter()
            .map(|(t, s)| TargetScore::new(TARGETS[*t], *s, 0))
            .collect(),
    };
    EvaluatedIndividual::new(ind, report)
}

/// A candidate: test size plus `(target, score)` pairs.
fn arb_candidate() -> impl Strategy<Value = (usize, Vec<(usize, f64)>)> {
    (
        1usize..6,
        prop::collection::vec((0usize..TARGETS.len(), prop_oneof![Just(0.5), Just(1.0), 0.0f64..=1.0]), 1..4),
    )
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Scores recorded per target never go down across updates.
    #[test]
    fn best_score_is_monotone(candidates in prop::collection::vec(arb_candidate(), 1..40)) {
        let mut archive = Archive::default();
        for (size, scores) in candidates {
            let before: Vec<(Option<f64>, Option<usize>)> = TARGETS
                .iter()
                .map(|t| {
                    (
                        archive.best_score(t),
                        archive.entry(t).map(|e| e.holder.individual.size()),
                    )
                })
                .collect();
            archive.tick();
            archive.add(&evaluated(size, &scores));

            for (t, (old_score, old_size)) in TARGETS.iter().zip(before) {
                let new_score = archive.best_score(t);
                if let Some(old) = old_score {
                    let new = new_score.unwrap_or(f64::NEG_INFINITY);
                    prop_assert!(new >= old);
                    if new == old {
                        let new_size = archive.entry(t).map(|e| e.holder.individual.size());
                        prop_assert!(new_size <= old_size);
                    }
                }
            }
        }
    }
}
