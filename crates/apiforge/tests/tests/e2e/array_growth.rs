//! End-to-end test: array mutation stays within `[0, max_size]`.
//!
//! An empty array with room for five elements grows by exactly one when the
//! grow branch is taken, and no sequence of mutations, issued directly or
//! through the search-level mutator, moves its size outside the bound.

use apiforge_action::{Action, HttpVerb, Individual, Parameter, SampleType};
use apiforge_gene::{GeneMutationConfig, GeneTree, Uniform};
use apiforge_search::{ActionCatalog, Mutator, MutatorConfig, Sampler, SamplerConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tags() -> GeneTree {
    GeneTree::array("tags", GeneTree::string("tag"), 5)
}

fn size(tree: &GeneTree) -> usize {
    tree.children(tree.root()).unwrap().len()
}

fn always_grow() -> GeneMutationConfig {
    GeneMutationConfig {
        array_grow_prob: 1.0,
        array_shrink_prob: 0.0,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn grow_branch_adds_exactly_one_element() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut tree = tags();
    assert_eq!(size(&tree), 0);
    let root = tree.root();
    tree.mutate(root, &mut rng, &always_grow(), &Uniform).unwrap();
    assert_eq!(size(&tree), 1);
}

#[test]
fn repeated_growth_saturates_at_max_size() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut tree = tags();
    let root = tree.root();
    for _ in 0..50 {
        tree.mutate(root, &mut rng, &always_grow(), &Uniform).unwrap();
        assert!(size(&tree) <= 5);
    }
    assert_eq!(size(&tree), 5);
}

#[test]
fn mixed_mutation_never_leaves_bounds() {
    let mut rng = StdRng::seed_from_u64(9);
    let cfg = GeneMutationConfig {
        array_grow_prob: 0.5,
        array_shrink_prob: 0.9,
        ..Default::default()
    };
    let mut tree = tags();
    let root = tree.root();
    for _ in 0..1000 {
        tree.mutate(root, &mut rng, &cfg, &Uniform).unwrap();
        assert!(size(&tree) <= 5);
    }
}

#[test]
fn array_in_query_parameter_stays_bounded_under_search_mutation() {
    let mut rng = StdRng::seed_from_u64(3);
    let search = Action::http(HttpVerb::Get, "/search", vec![Parameter::query("tags", tags())]);
    let sampler = Sampler::new(
        SamplerConfig::default().with_max_test_size(1),
        ActionCatalog::new([search.clone()]),
    )
    .unwrap();
    let mutator = Mutator::new(MutatorConfig::default().with_structure_mutation_prob(0.0)).unwrap();

    let mut ind = Individual::new(SampleType::Random);
    ind.add_main_action(search);
    for _ in 0..300 {
        ind = mutator.mutate(&ind, &sampler, None, &mut rng).unwrap().individual;
        let gene = &ind.main_actions()[0].params()[0].gene;
        assert!(size(gene) <= 5);
    }
}
