//! Fitness evaluation contract.
//!
//! The evaluator executes an individual against the system under test and
//! reports coverage. A whole-individual failure is an [`EvaluationError`];
//! per-action problems are reported through [`ActionStatus`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use apiforge_action::{Action, Individual, ParamRole};
use apiforge_gene::{GeneKind, GeneVariant};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EvaluationError;

// ── Report ──────────────────────────────────────────────────────────

/// Outcome of one action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Success,
    /// The SUT answered but rejected the call.
    Failure,
    /// The call could not be delivered; later actions were not run.
    TransportError,
}

/// Progress on one coverage target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetScore {
    pub target: String,
    /// In `[0, 1]`; `1.0` means covered.
    pub score: f64,
    /// Main action that reached the target.
    pub action_index: usize,
}

/// Clamp a raw score into `[0, 1]`; non-finite scores count as no progress.
pub fn normalize_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl TargetScore {
    pub fn new(target: impl Into<String>, score: f64, action_index: usize) -> Self {
        Self {
            target: target.into(),
            score: normalize_score(score),
            action_index,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub action_results: Vec<ActionStatus>,
    pub coverage: Vec<TargetScore>,
}

impl EvaluationReport {
    /// Best score per target. Scores are normalized here as well since the
    /// fields are public.
    pub fn scores(&self) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for t in &self.coverage {
            let score = normalize_score(t.score);
            let e = out.entry(t.target.clone()).or_insert(score);
            if score > *e {
                *e = score;
            }
        }
        out
    }

    /// Whether execution stopped before the last action.
    pub fn stopped_early(&self) -> bool {
        self.action_results.contains(&ActionStatus::TransportError)
    }
}

/// An individual together with its evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedIndividual {
    pub individual: Individual,
    pub report: EvaluationReport,
    scores: BTreeMap<String, f64>,
}

impl EvaluatedIndividual {
    pub fn new(individual: Individual, report: EvaluationReport) -> Self {
        let scores = report.scores();
        Self {
            individual,
            report,
            scores,
        }
    }

    pub fn score(&self, target: &str) -> Option<f64> {
        self.scores.get(target).copied()
    }

    pub fn scores(&self) -> &BTreeMap<String, f64> {
        &self.scores
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

#[async_trait]
pub trait FitnessEvaluator: Send + Sync {
    /// Execute initializing then main actions and report coverage.
    async fn evaluate(&self, individual: &Individual) -> Result<EvaluationReport, EvaluationError>;

    fn name(&self) -> &str {
        "evaluator"
    }
}

/// Deterministic in-process evaluator for tests and demos.
///
/// Every fitness-relevant main action covers a target named after it.
/// Integer leaves add a branch target scored by closeness to a positive
/// value, and a path parameter whose value was produced by an earlier
/// action adds a `found` target.
pub struct SimulatedEvaluator {
    requires_auth: BTreeSet<String>,
    transport_failure_every: Option<u64>,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl Default for SimulatedEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEvaluator {
    pub fn new() -> Self {
        Self {
            requires_auth: BTreeSet::new(),
            transport_failure_every: None,
            delay: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Calls to `action` without authentication fail.
    pub fn with_required_auth(mut self, action: impl Into<String>) -> Self {
        self.requires_auth.insert(action.into());
        self
    }

    /// Every `n`th evaluation fails at the transport level.
    pub fn with_transport_failure_every(mut self, n: u64) -> Self {
        self.transport_failure_every = Some(n.max(1));
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn score_action(&self, index: usize, action: &Action, earlier: &[String], out: &mut Vec<TargetScore>) {
        let name = action.name();
        out.push(TargetScore::new(name, 1.0, index));
        for p in action.params() {
            for (id, node) in p.gene.flat_view_all(p.gene.root()) {
                let value = match &node.kind {
                    GeneKind::Integer { value, .. } => Some(i64::from(*value)),
                    GeneKind::Long { value, .. } => Some(*value),
                    _ => None,
                };
                if let Some(v) = value {
                    let path = p.gene.field_path(id).unwrap_or_default();
                    let score = if v > 0 { 1.0 } else { 1.0 / (2.0 + v.unsigned_abs() as f64) };
                    out.push(TargetScore::new(format!("{name}::{path}>0"), score, index));
                }
            }
            if p.role == ParamRole::Path {
                let root = p.gene.root();
                if p.gene.variant(root).is_ok_and(|v| v != GeneVariant::Object) {
                    if let Ok(v) = p.gene.printable(root) {
                        if earlier.contains(&v) {
                            out.push(TargetScore::new(format!("{name}::{}::found", p.name), 1.0, index));
                        }
                    }
                }
            }
        }
    }
}

/// Printable values of every leaf produced by `action`.
fn produced_values(action: &Action) -> Vec<String> {
    let mut out = Vec::new();
    for p in action.params() {
        for (id, node) in p.gene.flat_view_all(p.gene.root()) {
            if node.kind.value_children().is_empty() && !node.variant().is_placeholder() {
                if let Ok(v) = p.gene.printable(id) {
                    out.push(v);
                }
            }
        }
    }
    out
}

#[async_trait]
impl FitnessEvaluator for SimulatedEvaluator {
    async fn evaluate(&self, individual: &Individual) -> Result<EvaluationReport, EvaluationError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.transport_failure_every.is_some_and(|n| call % n == 0) {
            return Err(EvaluationError::Transport(format!("connection reset on call {call}")));
        }

        let mut earlier: Vec<String> = individual.init_actions().iter().flat_map(produced_values).collect();
        let mut report = EvaluationReport::default();
        for (i, action) in individual.main_actions().iter().enumerate() {
            if !action.counts_for_fitness() {
                report.action_results.push(ActionStatus::Success);
                continue;
            }
            if self.requires_auth.contains(action.name()) && action.auth().is_none() {
                report.action_results.push(ActionStatus::Failure);
                report.coverage.push(TargetScore::new(format!("{}::unauthorized", action.name()), 1.0, i));
                continue;
            }
            self.score_action(i, action, &earlier, &mut report.coverage);
            report.action_results.push(ActionStatus::Success);
            earlier.extend(produced_values(action));
        }
        debug!(call, targets = report.coverage.len(), "simulated evaluation");
        Ok(report)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_action::{HttpVerb, Parameter, SampleType};
    use apiforge_gene::GeneTree;

    fn get_user() -> Action {
        Action::http(HttpVerb::Get, "/users/{id}", vec![Parameter::path("id", GeneTree::long_in("id", 5, 5))])
    }

    #[test]
    fn scores_keep_best_per_target() {
        let report = EvaluationReport {
            action_results: vec![ActionStatus::Success, ActionStatus::Success],
            coverage: vec![TargetScore::new("t", 0.2, 0), TargetScore::new("t", 0.7, 1)],
        };
        assert_eq!(report.scores()["t"], 0.7);
        assert!(!report.stopped_early());
    }

    #[test]
    fn non_finite_scores_count_as_no_progress() {
        assert_eq!(TargetScore::new("t", f64::NAN, 0).score, 0.0);
        assert_eq!(TargetScore::new("t", f64::INFINITY, 0).score, 0.0);
        assert_eq!(TargetScore::new("t", 1.5, 0).score, 1.0);

        let mut raw = TargetScore::new("t", 0.0, 0);
        raw.score = f64::NAN;
        let report = EvaluationReport {
            action_results: vec![ActionStatus::Success],
            coverage: vec![raw, TargetScore::new("t", 0.4, 0)],
        };
        assert_eq!(report.scores()["t"], 0.4);
    }

    #[tokio::test]
    async fn simulated_covers_action_and_branch() {
        let mut ind = Individual::new(SampleType::Random);
        ind.add_main_action(get_user());
        let report = SimulatedEvaluator::new().evaluate(&ind).await.unwrap();
        let scores = report.scores();
        assert_eq!(scores["GET:/users/{id}"], 1.0);
        assert_eq!(scores["GET:/users/{id}::id>0"], 1.0);
    }

    #[tokio::test]
    async fn produced_value_marks_resource_found() {
        let mut ind = Individual::new(SampleType::Random);
        ind.add_main_action(Action::http(
            HttpVerb::Post,
            "/users",
            vec![Parameter::body(GeneTree::object("body", vec![GeneTree::long_in("id", 5, 5)]))],
        ));
        ind.add_main_action(get_user());
        let scores = SimulatedEvaluator::new().evaluate(&ind).await.unwrap().scores();
        assert_eq!(scores.get("GET:/users/{id}::id::found"), Some(&1.0));
    }

    #[tokio::test]
    async fn transport_failures_are_periodic() {
        let eval = SimulatedEvaluator::new().with_transport_failure_every(2);
        let ind = Individual::new(SampleType::Random);
        assert!(eval.evaluate(&ind).await.is_ok());
        assert!(matches!(eval.evaluate(&ind).await, Err(EvaluationError::Transport(_))));
        assert_eq!(eval.calls(), 2);
    }

    #[tokio::test]
    async fn missing_auth_fails_protected_action() {
        let eval = SimulatedEvaluator::new().with_required_auth("GET:/users/{id}");
        let mut ind = Individual::new(SampleType::Random);
        ind.add_main_action(get_user());
        let report = eval.evaluate(&ind).await.unwrap();
        assert_eq!(report.action_results, vec![ActionStatus::Failure]);
    }
}
