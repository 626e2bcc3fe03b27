//! End-to-end test: impact history steers the adaptive mutator.
//!
//! A gene manipulated ten times without any impact must make the adaptive
//! mutator pick a different gene, or a structural change, more often than a
//! gene whose ten manipulations all had an impact.

use std::collections::BTreeSet;

use apiforge_action::{Action, HttpVerb, Individual, Parameter, SampleType};
use apiforge_gene::GeneTree;
use apiforge_search::{
    ActionCatalog, GeneCandidate, ImpactTracker, MutationOutcome, MutationStrategy, Mutator, MutatorConfig,
    Sampler, SamplerConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn list_items() -> Action {
    Action::http(
        HttpVerb::Get,
        "/items",
        vec![
            Parameter::query("limit", GeneTree::integer_in("limit", 0, 100)),
            Parameter::query("name", GeneTree::string("name")),
        ],
    )
}

fn individual() -> Individual {
    let mut ind = Individual::new(SampleType::Random);
    ind.add_main_action(list_items());
    ind
}

fn adaptive() -> Mutator {
    Mutator::new(MutatorConfig::default().with_strategy(MutationStrategy::ImpactAdaptive)).unwrap()
}

/// Tracker where `identity` was manipulated ten times, `impacts` of them with effect.
fn history(identity: &str, impacts: usize) -> ImpactTracker {
    let quiet = MutationOutcome::default();
    let mut loud = MutationOutcome {
        improved: true,
        improvement: 0.1,
        ..Default::default()
    };
    loud.added = BTreeSet::from(["GET:/items::limit>0".to_string()]);
    let mut t = ImpactTracker::new();
    for i in 0..10 {
        let outcome = if i < impacts { &loud } else { &quiet };
        t.record(&[identity], outcome);
    }
    t
}

/// Chance that the next mutation leaves `first` alone.
fn chance_elsewhere(m: &Mutator, candidates: &[GeneCandidate], t: &ImpactTracker) -> f64 {
    let weights = m.gene_weights(candidates, Some(t));
    let total: f64 = weights.iter().sum();
    let p_structure = m.structure_probability(candidates, Some(t));
    p_structure + (1.0 - p_structure) * (total - weights[0]) / total
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn fruitless_gene_is_avoided_analytically() {
    let m = adaptive();
    let candidates = m.gene_candidates(&individual()).unwrap();
    assert_eq!(candidates.len(), 2);
    let first = candidates[0].identity.clone();

    let fruitless = history(&first, 0);
    let fruitful = history(&first, 10);
    let away_from_fruitless = chance_elsewhere(&m, &candidates, &fruitless);
    let away_from_fruitful = chance_elsewhere(&m, &candidates, &fruitful);
    assert!(away_from_fruitless > away_from_fruitful);
    assert!(m.structure_probability(&candidates, Some(&fruitless)) > m.structure_probability(&candidates, Some(&fruitful)));
}

#[test]
fn fruitless_gene_is_avoided_in_practice() {
    let catalog = ActionCatalog::new([list_items()]);
    let sampler = Sampler::new(SamplerConfig::default(), catalog).unwrap();
    let m = adaptive();
    let parent = individual();
    let first = m.gene_candidates(&parent).unwrap()[0].identity.clone();

    let count_elsewhere = |t: &ImpactTracker, seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..400)
            .filter(|_| {
                let out = m.mutate(&parent, &sampler, Some(t), &mut rng).unwrap();
                !out.touched.iter().any(|id| id.starts_with(first.as_str()))
            })
            .count()
    };
    let fruitless = count_elsewhere(&history(&first, 0), 42);
    let fruitful = count_elsewhere(&history(&first, 10), 42);
    assert!(fruitless > fruitful, "fruitless={fruitless} fruitful={fruitful}");
}
