//! Property tests: collection genes never leave `[0, max_size]`.

use apiforge_gene::{GeneMutationConfig, GeneTree, Uniform};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn size(tree: &GeneTree) -> usize {
    tree.children(tree.root()).unwrap().len()
}

/// One step of a random gene workout.
#[derive(Clone, Copy, Debug)]
enum Op {
    Randomize,
    Mutate,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(prop_oneof![Just(Op::Randomize), Just(Op::Mutate)], 1..120)
}

fn arb_collection(max_size: usize) -> impl Strategy<Value = GeneTree> {
    prop_oneof![
        Just(GeneTree::array("xs", GeneTree::integer("x"), max_size)),
        Just(GeneTree::array("tags", GeneTree::string("tag"), max_size)),
        Just(GeneTree::map("attrs", GeneTree::string("value"), max_size)),
        Just(GeneTree::array(
            "points",
            GeneTree::object("point", vec![GeneTree::double("x"), GeneTree::double("y")]),
            max_size,
        )),
    ]
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Any sequence of randomize and mutate calls keeps the size in bounds.
    #[test]
    fn collection_size_stays_in_bounds(
        (max_size, tree) in (0usize..8).prop_flat_map(|m| (Just(m), arb_collection(m))),
        ops in arb_ops(),
        grow in 0.0f64..=1.0,
        shrink in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut tree = tree;
        let mut rng = StdRng::seed_from_u64(seed);
        let cfg = GeneMutationConfig {
            array_grow_prob: grow,
            array_shrink_prob: shrink,
            ..Default::default()
        };
        let root = tree.root();
        for op in ops {
            match op {
                Op::Randomize => tree.randomize(root, &mut rng, false).unwrap(),
                Op::Mutate => {
                    if tree.is_mutable(root).unwrap() {
                        tree.mutate(root, &mut rng, &cfg, &Uniform).unwrap();
                    }
                }
            }
            prop_assert!(size(&tree) <= max_size);
        }
    }

    /// Bounded numeric genes stay within their range under mutation.
    #[test]
    fn bounded_integer_stays_in_range(
        lo in -50i32..0,
        span in 1i32..100,
        steps in 1usize..200,
        seed in any::<u64>(),
    ) {
        let hi = lo + span;
        let mut tree = GeneTree::integer_in("n", lo, hi);
        let mut rng = StdRng::seed_from_u64(seed);
        let root = tree.root();
        for _ in 0..steps {
            tree.mutate(root, &mut rng, &GeneMutationConfig::default(), &Uniform).unwrap();
            let v: i32 = tree.printable(root).unwrap().parse().unwrap();
            prop_assert!((lo..=hi).contains(&v));
        }
    }
}
