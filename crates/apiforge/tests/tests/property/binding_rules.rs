//! Property tests: the bind-direction rule is a pure function, and
//! object-to-object matching gives the same links every time.

use apiforge_action::{Action, HttpVerb, Individual, Parameter, SampleType};
use apiforge_binding::{resolve_direction, BindingResolver, ExistingData, ParamView};
use apiforge_gene::{GeneTree, GeneVariant};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const VARIANTS: [GeneVariant; 21] = [
    GeneVariant::Integer,
    GeneVariant::Long,
    GeneVariant::Float,
    GeneVariant::Double,
    GeneVariant::Boolean,
    GeneVariant::String,
    GeneVariant::Enum,
    GeneVariant::Date,
    GeneVariant::Time,
    GeneVariant::DateTime,
    GeneVariant::Base64,
    GeneVariant::SqlPrimaryKey,
    GeneVariant::SqlForeignKey,
    GeneVariant::SqlAutoIncrement,
    GeneVariant::ImmutableData,
    GeneVariant::Object,
    GeneVariant::Array,
    GeneVariant::Optional,
    GeneVariant::Map,
    GeneVariant::CyclePlaceholder,
    GeneVariant::LimitPlaceholder,
];

fn arb_variant() -> impl Strategy<Value = GeneVariant> {
    prop::sample::select(VARIANTS.to_vec())
}

fn arb_existing() -> impl Strategy<Value = Option<ExistingData>> {
    prop_oneof![Just(None), Just(Some(ExistingData::Source)), Just(Some(ExistingData::Target))]
}

const FIELD_NAMES: [&str; 6] = ["id", "name", "email", "age", "city", "score"];

fn field(name: &str) -> GeneTree {
    match name {
        "id" | "age" => GeneTree::long(name),
        "score" => GeneTree::double(name),
        _ => GeneTree::string(name),
    }
}

fn body(fields: &[usize]) -> GeneTree {
    GeneTree::object("body", fields.iter().map(|i| field(FIELD_NAMES[*i])).collect())
}

fn arb_fields() -> impl Strategy<Value = Vec<usize>> {
    prop::sample::subsequence((0..FIELD_NAMES.len()).collect::<Vec<_>>(), 1..=FIELD_NAMES.len())
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Same variant pair and existing-data flag, same direction.
    #[test]
    fn direction_is_deterministic(a in arb_variant(), b in arb_variant(), existing in arb_existing()) {
        let first = resolve_direction(a, b, existing);
        for _ in 0..3 {
            prop_assert_eq!(resolve_direction(a, b, existing), first);
        }
    }

    /// Persisted data always ends up as the source.
    #[test]
    fn existing_data_overrides_rank(a in arb_variant(), b in arb_variant()) {
        let src = resolve_direction(a, b, Some(ExistingData::Source));
        let dst = resolve_direction(a, b, Some(ExistingData::Target));
        prop_assert_ne!(src, dst);
    }

    /// Re-running the object matcher over the same two bodies yields the same links.
    #[test]
    fn object_matching_is_idempotent(
        source_fields in arb_fields(),
        target_fields in arb_fields(),
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
    ) {
        let mut ind = Individual::new(SampleType::Random);
        ind.add_main_action(Action::http(HttpVerb::Post, "/people", vec![Parameter::body(body(&source_fields))]));
        ind.add_main_action(Action::http(HttpVerb::Put, "/people", vec![Parameter::body(body(&target_fields))]));
        let resolver = BindingResolver::default();
        let target = ParamView::of(&ind.main_actions()[1], 0).unwrap();
        let candidates = ParamView::all(&ind.main_actions()[0]);

        let first = resolver.bind_param(target, &candidates, &mut StdRng::seed_from_u64(seed_a)).unwrap();
        let second = resolver.bind_param(target, &candidates, &mut StdRng::seed_from_u64(seed_b)).unwrap();
        prop_assert_eq!(&first, &second);

        let shared = source_fields.iter().filter(|f| target_fields.contains(f)).count();
        prop_assert_eq!(first.len(), shared);
    }
}
