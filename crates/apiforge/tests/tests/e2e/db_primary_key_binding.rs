//! End-to-end test: a DB row's primary key feeds a REST path parameter.
//!
//! Verifies the direction of the single link produced by a DB directive,
//! with and without the row representing already-persisted data, and that
//! synchronisation copies the key into the path.

use apiforge_action::{Action, BindingOrigin, HttpVerb, Individual, Parameter, SampleType};
use apiforge_binding::{BindingResolver, DbBindingDirective};
use apiforge_gene::GeneTree;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn users_row(column: GeneTree) -> Action {
    Action::db("users", vec![Parameter::column("id", column)])
}

fn primary_key() -> GeneTree {
    GeneTree::primary_key("id", "users", GeneTree::long_in("id", 1, 1000), 1)
}

fn get_user() -> Action {
    Action::http(HttpVerb::Get, "/users/{id}", vec![Parameter::path("id", GeneTree::long("id"))])
}

fn value_of(action: &Action) -> String {
    let gene = &action.params()[0].gene;
    gene.printable(gene.value_node(gene.root()).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn primary_key_is_the_source_of_the_path_parameter() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut ind = Individual::new(SampleType::Seeded);
    let row = ind.add_init_action(users_row(primary_key()));
    let call = ind.add_main_action(get_user());
    ind.randomize(&mut rng).unwrap();

    let resolver = BindingResolver::default().with_known_tables(["users"]);
    let n = resolver
        .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
        .unwrap();
    assert_eq!(n, 1);
    let link = ind.links()[0];
    assert_eq!(link.source.action, row);
    assert_eq!(link.target.action, call);
    assert_eq!(link.origin, BindingOrigin::Database);

    ind.sync_bindings().unwrap();
    let key = value_of(&ind.init_actions()[0]);
    let path = value_of(&ind.main_actions()[0]);
    assert_eq!(key, path);
}

#[test]
fn persisted_row_forces_direction_regardless_of_rank() {
    // A fresh string column ranks below the long path parameter and takes
    // its value; once the row is persisted it must stay the source.
    let fresh = {
        let mut ind = Individual::new(SampleType::Seeded);
        ind.add_init_action(users_row(GeneTree::string("id")));
        let call = ind.add_main_action(get_user());
        BindingResolver::default()
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
            .unwrap();
        ind.links()[0]
    };
    let persisted = {
        let mut ind = Individual::new(SampleType::Seeded);
        ind.add_init_action(users_row(GeneTree::string("id")).as_existing_data());
        let call = ind.add_main_action(get_user());
        BindingResolver::default()
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
            .unwrap();
        ind.links()[0]
    };
    assert_eq!(fresh.source, persisted.target);
    assert_eq!(fresh.target, persisted.source);
}

#[test]
fn persisted_primary_key_is_never_overwritten() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut ind = Individual::new(SampleType::Seeded);
    let row = ind.add_init_action(users_row(primary_key()).as_existing_data());
    let call = ind.add_main_action(get_user());
    ind.randomize(&mut rng).unwrap();
    let key_before = value_of(&ind.init_actions()[0]);

    BindingResolver::default()
        .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
        .unwrap();
    assert_eq!(ind.links().len(), 1);
    assert_eq!(ind.links()[0].source.action, row);

    ind.sync_bindings().unwrap();
    assert_eq!(value_of(&ind.init_actions()[0]), key_before);
}
