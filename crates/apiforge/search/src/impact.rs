//! Impact tracking.
//!
//! Every mutation reports the identity paths it touched. After evaluation
//! the tracker learns whether touching them changed anything, and the
//! adaptive mutator reads those statistics back through [`ImpactGuide`].

use std::collections::{BTreeMap, BTreeSet};

use apiforge_action::{Action, Parameter};
use apiforge_gene::{GeneResult, GeneTree, GeneVariant, MutationGuide, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::evaluator::EvaluationReport;

/// Identity path of a gene: `action::role::field/path`.
pub fn gene_identity(action: &Action, param: &Parameter, node: NodeId) -> GeneResult<String> {
    Ok(format!("{}::{}", param_prefix(action, param), param.gene.field_path(node)?))
}

/// Identity prefix shared by all genes of one parameter.
pub fn param_prefix(action: &Action, param: &Parameter) -> String {
    format!("{}::{}", action.name(), param.role)
}

/// Identity used for structural changes of an individual.
pub const STRUCTURE_IDENTITY: &str = "individual::structure";

// ── Record ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub id: String,
    /// Accumulated improvement attributed to this element.
    pub degree: f64,
    pub times_to_manipulate: u32,
    pub times_of_impact: u32,
    pub times_of_no_impacts: u32,
    /// Consecutive manipulations without any impact.
    pub no_impact_streak: u32,
    /// Consecutive impactful manipulations that did not improve the archive.
    pub no_improvement_streak: u32,
}

impl ImpactRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    fn count(&mut self, outcome: &MutationOutcome) {
        self.times_to_manipulate += 1;
        if outcome.has_impact() {
            self.times_of_impact += 1;
            self.no_impact_streak = 0;
            if outcome.improved {
                self.no_improvement_streak = 0;
                self.degree += outcome.improvement;
            } else {
                self.no_improvement_streak += 1;
            }
        } else {
            self.times_of_no_impacts += 1;
            self.no_impact_streak += 1;
        }
    }

    /// Longest current streak without progress.
    pub fn staleness(&self) -> u32 {
        self.no_impact_streak.max(self.no_improvement_streak)
    }

    /// Selection weight in `(0, 2)`: unexplored elements weigh 1, proven
    /// impact pushes towards 2, and elements that never changed anything
    /// decay towards 0.
    pub fn weight(&self) -> f64 {
        f64::from(1 + 2 * self.times_of_impact) / f64::from(1 + self.times_to_manipulate)
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// What one mutation did to fitness.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// The archive improved on at least one target.
    pub improved: bool,
    /// Sum of score gains on improved targets.
    pub improvement: f64,
    /// Targets whose score rose against the parent.
    pub added: BTreeSet<String>,
    /// Targets whose score fell against the parent.
    pub removed: BTreeSet<String>,
}

impl MutationOutcome {
    /// Compare a mutant's report with its parent's.
    pub fn between(parent: &EvaluationReport, child: &EvaluationReport, improved: bool, improvement: f64) -> Self {
        let before = parent.scores();
        let after = child.scores();
        let mut added = BTreeSet::new();
        let mut removed = BTreeSet::new();
        for (t, s) in &after {
            if *s > before.get(t).copied().unwrap_or(0.0) {
                added.insert(t.clone());
            }
        }
        for (t, s) in &before {
            if *s > after.get(t).copied().unwrap_or(0.0) {
                removed.insert(t.clone());
            }
        }
        Self {
            improved,
            improvement,
            added,
            removed,
        }
    }

    pub fn has_impact(&self) -> bool {
        self.improved || !self.added.is_empty() || !self.removed.is_empty()
    }
}

// ── Tracker ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactTracker {
    records: BTreeMap<String, ImpactRecord>,
}

impl ImpactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ImpactRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ImpactRecord> {
        self.records.values()
    }

    /// Update the record of every touched identity.
    pub fn record<S: AsRef<str>>(&mut self, touched: &[S], outcome: &MutationOutcome) {
        let conflicting: Vec<&String> = outcome.added.intersection(&outcome.removed).collect();
        if !conflicting.is_empty() {
            warn!(targets = ?conflicting, "evaluator reported added and removed coverage for the same target");
        }
        let mut seen = BTreeSet::new();
        for id in touched {
            let id = id.as_ref();
            if !seen.insert(id) {
                continue;
            }
            self.records
                .entry(id.to_string())
                .or_insert_with(|| ImpactRecord::new(id))
                .count(outcome);
        }
        trace!(touched = seen.len(), impact = outcome.has_impact(), "impacts recorded");
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, record: ImpactRecord) {
        self.records.insert(record.id.clone(), record);
    }

    /// Selection weight of an identity; 1 when unknown.
    pub fn weight(&self, id: &str) -> f64 {
        self.get(id).map_or(1.0, ImpactRecord::weight)
    }
}

// ── Guide ───────────────────────────────────────────────────────────

/// Steers gene mutation inside one parameter from impact records.
///
/// Without a record the guide answers like [`apiforge_gene::Uniform`].
pub struct ImpactGuide<'a> {
    tracker: &'a ImpactTracker,
    prefix: String,
    stale_threshold: u32,
    resize_step: f64,
}

impl<'a> ImpactGuide<'a> {
    pub fn new(tracker: &'a ImpactTracker, prefix: String, stale_threshold: u32, resize_step: f64) -> Self {
        Self {
            tracker,
            prefix,
            stale_threshold,
            resize_step,
        }
    }

    fn record(&self, tree: &GeneTree, node: NodeId) -> Option<&ImpactRecord> {
        let path = tree.field_path(node).ok()?;
        self.tracker.get(&format!("{}::{path}", self.prefix))
    }
}

impl MutationGuide for ImpactGuide<'_> {
    fn child_weight(&self, tree: &GeneTree, child: NodeId) -> f64 {
        self.record(tree, child).map_or(1.0, ImpactRecord::weight)
    }

    fn resize_probability(&self, tree: &GeneTree, collection: NodeId) -> Option<f64> {
        if !matches!(tree.variant(collection).ok()?, GeneVariant::Array | GeneVariant::Map) {
            return None;
        }
        let record = self.record(tree, collection)?;
        let stale = record.staleness();
        if stale < self.stale_threshold {
            return None;
        }
        let extra = f64::from(stale - self.stale_threshold + 1) * self.resize_step;
        Some((0.5 + extra).min(0.95))
    }
}
