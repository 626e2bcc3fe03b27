//! Property tests: copies are independent, same-variant copies make values
//! equal, and cross-variant copies fail without touching the target.

use apiforge_action::{Action, HttpVerb, Individual, Parameter, SampleType};
use apiforge_gene::{GeneError, GeneMutationConfig, GeneTree, Uniform};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One gene of each commonly used shape, picked by index.
fn gene(kind: usize, name: &str) -> GeneTree {
    match kind % 10 {
        0 => GeneTree::integer(name),
        1 => GeneTree::long(name),
        2 => GeneTree::double(name),
        3 => GeneTree::boolean(name),
        4 => GeneTree::string(name),
        5 => GeneTree::date_time(name),
        6 => GeneTree::enumeration(name, ["red", "green", "blue"]),
        7 => GeneTree::array(name, GeneTree::integer("item"), 4),
        8 => GeneTree::optional(name, GeneTree::string("inner"), true),
        _ => GeneTree::object(name, vec![GeneTree::integer("a"), GeneTree::string("b")]),
    }
}

fn arb_kind() -> impl Strategy<Value = usize> {
    0usize..10
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Mutating a cloned gene never changes the original's printable value.
    #[test]
    fn cloned_gene_is_independent(kind in arb_kind(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut original = gene(kind, "g");
        original.randomize_all(&mut rng).unwrap();
        let before = original.printable(original.root()).unwrap();

        let mut copy = original.clone();
        prop_assert_eq!(&copy, &original);
        let root = copy.root();
        for _ in 0..5 {
            if copy.is_mutable(root).unwrap() {
                copy.mutate(root, &mut rng, &GeneMutationConfig::default(), &Uniform).unwrap();
            }
        }
        prop_assert_eq!(original.printable(original.root()).unwrap(), before);
    }

    /// Mutating a cloned individual never changes the original.
    #[test]
    fn cloned_individual_is_independent(kinds in prop::collection::vec(arb_kind(), 1..5), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ind = Individual::new(SampleType::Random);
        for (i, k) in kinds.iter().enumerate() {
            let name = format!("p{i}");
            ind.add_main_action(Action::http(
                HttpVerb::Get,
                &format!("/r{i}"),
                vec![Parameter::query(name.clone(), gene(*k, &name))],
            ));
        }
        ind.randomize(&mut rng).unwrap();
        let snapshot = ind.clone();

        let mut copy = ind.clone();
        let id = copy.main_actions()[0].id();
        copy.gene_mut(id, 0).unwrap().randomize_all(&mut rng).unwrap();
        copy.remove_main_action(0);
        prop_assert_eq!(ind, snapshot);
    }

    /// A copy between genes of the same shape leaves them holding the same value.
    #[test]
    fn same_variant_copy_makes_values_equal(kind in arb_kind(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut target = gene(kind, "t");
        let mut source = gene(kind, "s");
        target.randomize_all(&mut rng).unwrap();
        source.randomize_all(&mut rng).unwrap();

        target.copy_value_from(target.root(), &source, source.root()).unwrap();
        prop_assert!(target.contains_same_value_as(target.root(), &source, source.root()).unwrap());
        prop_assert_eq!(
            target.printable(target.root()).unwrap(),
            source.printable(source.root()).unwrap()
        );
    }

    /// Copying from a different variant fails and leaves the target unchanged.
    #[test]
    fn cross_variant_copy_is_rejected(a in arb_kind(), b in arb_kind(), seed in any::<u64>()) {
        prop_assume!(a % 10 != b % 10);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut target = gene(a, "t");
        let mut source = gene(b, "s");
        target.randomize_all(&mut rng).unwrap();
        source.randomize_all(&mut rng).unwrap();
        let before = target.clone();

        let err = target.copy_value_from(target.root(), &source, source.root()).unwrap_err();
        let is_type_error = matches!(err, GeneError::InvalidGeneType { .. });
        prop_assert!(is_type_error);
        prop_assert_eq!(target, before);
    }
}
