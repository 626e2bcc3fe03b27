//! End-to-end test: the full search loop against the simulated evaluator.
//!
//! Seeds, authentication, DB directives and binding all take part; the
//! archive must end up holding the dependency targets that only bound
//! individuals can reach.

use apiforge_action::{Action, AuthContext, HttpVerb, Parameter};
use apiforge_binding::DbBindingDirective;
use apiforge_gene::GeneTree;
use apiforge_search::{
    ActionCatalog, MutationStrategy, Sampler, SearchConfig, SearchLoop, SeedSkeleton, SimulatedEvaluator,
    StepOutcome,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn catalog() -> ActionCatalog {
    ActionCatalog::new([
        Action::http(
            HttpVerb::Post,
            "/users",
            vec![Parameter::body(GeneTree::object_of(
                "body",
                "User",
                vec![GeneTree::long_in("id", 1, 1_000_000), GeneTree::string("name")],
            ))],
        ),
        Action::http(
            HttpVerb::Get,
            "/users/{id}",
            vec![Parameter::path("id", GeneTree::long_in("id", 1, 1_000_000))],
        ),
        Action::http(
            HttpVerb::Get,
            "/orders/{orderId}",
            vec![Parameter::path("orderId", GeneTree::long_in("orderId", 1, 1_000_000))],
        ),
    ])
}

fn seeds() -> Vec<SeedSkeleton> {
    vec![
        SeedSkeleton::new("create-then-read", ["POST:/users", "GET:/users/{id}"]),
        SeedSkeleton::new("stored-order", ["GET:/orders/{orderId}"])
            .with_init(Action::db(
                "orders",
                vec![Parameter::column(
                    "id",
                    GeneTree::primary_key("id", "orders", GeneTree::long_in("id", 1, 1_000_000), 1),
                )],
            ))
            .with_db_binding(0, vec![DbBindingDirective::new("orders", "id", "orderId")]),
    ]
}

fn config(seed: u64) -> SearchConfig {
    let mut config = SearchConfig::default().with_seed(seed).with_max_evaluations(150);
    config.sampler = config.sampler.with_prob_smart_sampling(0.5);
    config.mutator = config.mutator.with_strategy(MutationStrategy::ImpactAdaptive);
    config
}

fn search(seed: u64, evaluator: SimulatedEvaluator) -> SearchLoop<SimulatedEvaluator> {
    let config = config(seed);
    let sampler = Sampler::from_search_config(&config, catalog())
        .unwrap()
        .with_auth(vec![AuthContext::new("alice").with_header("Authorization", "Bearer a")])
        .with_seeds(seeds())
        .unwrap();
    SearchLoop::new(config, sampler, evaluator).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bound_individuals_reach_dependency_targets() {
    let mut sl = search(42, SimulatedEvaluator::new());
    let summary = sl.run().await.unwrap();
    assert_eq!(summary.evaluations, 150);
    assert_eq!(summary.abandoned, 0);

    let covered = sl.archive().covered_targets();
    assert!(covered.contains(&"GET:/users/{id}::id::found"), "covered: {covered:?}");
    assert!(covered.contains(&"GET:/orders/{orderId}::orderId::found"), "covered: {covered:?}");
    assert!(!sl.impacts().is_empty());
}

#[tokio::test]
async fn authentication_failures_become_targets() {
    let evaluator = SimulatedEvaluator::new().with_required_auth("GET:/users/{id}");
    let mut sl = search(7, evaluator);
    sl.run().await.unwrap();
    assert!(sl.archive().best_score("GET:/users/{id}").is_some());
}

#[tokio::test]
async fn intermittent_transport_failures_are_absorbed() {
    let mut sl = search(5, SimulatedEvaluator::new().with_transport_failure_every(3));
    let mut abandoned = 0;
    for _ in 0..30 {
        if let StepOutcome::Abandoned(_) = sl.step().await.unwrap() {
            abandoned += 1;
        }
    }
    assert_eq!(abandoned, 10);
    assert_eq!(sl.evaluator().calls(), 30);
    assert_eq!(sl.summary().abandoned, 10);
}

#[tokio::test]
async fn archive_solution_is_serializable() {
    let mut sl = search(1, SimulatedEvaluator::new());
    sl.run().await.unwrap();
    let solution = sl.archive().solution();
    assert!(!solution.is_empty());
    let json = serde_json::to_string(&solution).unwrap();
    assert!(json.contains("POST:/users") || json.contains("GET:/"));
}
