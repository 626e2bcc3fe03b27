#![deny(unsafe_code)]
//! apiforge demo binary.
//!
//! Runs a self-contained search against a simulated pet-store API:
//! 1. Schema-driven gene construction (with a recursive type)
//! 2. Sampling and binding of a seeded individual
//! 3. The search loop with impact-adaptive mutation
//! 4. Archive and impact summaries
//!
//! No external services required -- the system under test is simulated.

mod petstore;

use apiforge_action::Individual;
use apiforge_search::{
    MutationStrategy, Sampler, SearchConfig, SearchLoop, SearchSummary, SimulatedEvaluator,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use petstore::PetStore;

// ── Formatting Helpers ──────────────────────────────────────────────────

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║               apiforge  --  Search Demo                       ║
 ║                                                               ║
 ║   Gene graphs, binding links, impact-adaptive mutation        ║
 ║   and a many-objective archive against a simulated API.       ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

fn section(title: &str) {
    let width: usize = 60;
    let pad = width.saturating_sub(title.len() + 4);
    let left = pad / 2;
    let right = pad - left;
    println!();
    println!(" ┌{}┐", "─".repeat(width));
    println!(" │{}  {}  {}│", " ".repeat(left), title, " ".repeat(right));
    println!(" └{}┘", "─".repeat(width));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("{}", BANNER);

    if let Err(e) = run_demo().await {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {}", e);
        std::process::exit(1);
    }

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
}

fn demo_config() -> SearchConfig {
    let mut config = SearchConfig::default().with_seed(2024).with_max_evaluations(300);
    config.sampler = config.sampler.with_max_test_size(5).with_prob_smart_sampling(0.4);
    config.mutator = config.mutator.with_strategy(MutationStrategy::ImpactAdaptive);
    config
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    // ── Phase A: Schema ─────────────────────────────────────────────
    section("Phase A: Schema-driven Genes");

    let pet = PetStore::schemas().build("Pet", "body")?;
    info(&format!("Pet gene nodes   : {}", pet.len()));
    let placeholders = pet
        .flat_view_all(pet.root())
        .filter(|(_, n)| n.variant().is_placeholder())
        .count();
    ok(&format!("Recursive Owner.pets cut by {} placeholder(s)", placeholders));

    // ── Phase B: Sampling ───────────────────────────────────────────
    section("Phase B: Sampling + Binding");

    let config = demo_config();
    config.validate()?;
    let sampler = Sampler::from_search_config(&config, PetStore::catalog()?)?
        .with_auth(PetStore::auth())
        .with_seeds(PetStore::seeds())?;
    info(&format!("Catalog          : {} actions", sampler.catalog().len()));

    let mut rng = StdRng::seed_from_u64(7);
    let sample = sampler.sample_individual(&mut rng)?;
    print_individual(&sample);

    // ── Phase C: Search ─────────────────────────────────────────────
    section("Phase C: Search Loop  (300 evaluations)");

    let evaluator = SimulatedEvaluator::new()
        .with_required_auth("DELETE:/pets/{petId}")
        .with_transport_failure_every(50);
    let mut search = SearchLoop::new(config, sampler, evaluator)?;
    let summary = search.run().await?;
    print_summary(&summary);

    // ── Phase D: Archive ────────────────────────────────────────────
    section("Phase D: Archive");

    let solution = search.archive().solution();
    ok(&format!("Solution tests   : {}", solution.len()));
    for target in search.archive().covered_targets().iter().filter(|t| t.ends_with("::found")) {
        ok(&format!("Dependency found : {}", target));
    }
    let json = serde_json::to_string(&solution)?;
    info(&format!("Solution JSON    : {} bytes", json.len()));

    // ── Phase E: Impacts ────────────────────────────────────────────
    section("Phase E: Impact Records");

    let mut records: Vec<_> = search.impacts().records().collect();
    records.sort_by(|a, b| b.times_to_manipulate.cmp(&a.times_to_manipulate));
    for r in records.iter().take(6) {
        info(&format!(
            "{:<44} manipulated={:>3} impact={:>3} weight={:.2}",
            r.id,
            r.times_to_manipulate,
            r.times_of_impact,
            r.weight()
        ));
    }

    Ok(())
}

// ── Printing helpers ────────────────────────────────────────────────────

fn print_individual(ind: &Individual) {
    for action in ind.init_actions() {
        info(&format!("init  {}", action.name()));
    }
    for action in ind.main_actions() {
        let auth = action.auth().map_or("-", |a| a.name.as_str());
        info(&format!("main  {:<24} auth={}", action.name(), auth));
    }
    ok(&format!("Binding links    : {}", ind.links().len()));
}

fn print_summary(s: &SearchSummary) {
    ok(&format!("Evaluations      : {}", s.evaluations));
    if s.abandoned > 0 {
        warn(&format!("Abandoned        : {}", s.abandoned));
    }
    info(&format!("Targets          : {}", s.targets));
    info(&format!("Covered          : {}", s.covered));
    info(&format!("Coverage         : {:.1}%", s.coverage * 100.0));
}

// ── Tests ───────────────────────────────────────────────────────────────
