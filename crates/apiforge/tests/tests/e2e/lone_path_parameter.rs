//! End-to-end test: a path parameter with nothing to bind to.
//!
//! An individual whose only path parameter has no same-named counterpart
//! gets no binding link, and the parameter keeps its own random value.

use apiforge_action::{Action, HttpVerb, Individual, Parameter, SampleType};
use apiforge_binding::BindingResolver;
use apiforge_gene::GeneTree;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_item() -> Action {
    Action::http(HttpVerb::Get, "/items/{id}", vec![Parameter::path("id", GeneTree::integer("id"))])
}

fn path_value(ind: &Individual, index: usize) -> String {
    let gene = &ind.main_actions()[index].params()[0].gene;
    gene.printable(gene.root()).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn single_path_parameter_gets_no_link() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut ind = Individual::new(SampleType::Random);
    ind.add_main_action(get_item());
    ind.randomize(&mut rng).unwrap();
    let before = path_value(&ind, 0);

    let n = BindingResolver::default().bind_individual(&mut ind, &mut rng).unwrap();
    assert_eq!(n, 0);
    assert!(ind.links().is_empty());

    ind.sync_bindings().unwrap();
    assert_eq!(path_value(&ind, 0), before);
}

#[test]
fn differently_named_path_parameter_stays_independent() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut ind = Individual::new(SampleType::Random);
    ind.add_main_action(Action::http(
        HttpVerb::Get,
        "/orders/{orderId}",
        vec![Parameter::path("orderId", GeneTree::integer("orderId"))],
    ));
    ind.add_main_action(get_item());
    ind.randomize(&mut rng).unwrap();
    let before = path_value(&ind, 1);

    assert_eq!(BindingResolver::default().bind_individual(&mut ind, &mut rng).unwrap(), 0);
    ind.sync_bindings().unwrap();
    assert_eq!(path_value(&ind, 1), before);
}
