//! Many-objective archive.
//!
//! One slot per coverage target holds the best individual seen for it. A
//! slot only changes hands on a strictly better score, or an equal score
//! reached by a shorter test, so the best score per target never drops.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use apiforge_gene::pick_weighted;

use crate::config::ArchiveConfig;
use crate::evaluator::EvaluatedIndividual;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub holder: EvaluatedIndividual,
    pub score: f64,
    pub improvements: u32,
    pub last_improvement: u64,
}

/// Changes made by [`Archive::add`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArchiveUpdate {
    /// Targets now held by the candidate.
    pub improved: Vec<String>,
    /// Sum of score gains over the previous holders.
    pub gain: f64,
}

impl ArchiveUpdate {
    pub fn is_improvement(&self) -> bool {
        !self.improved.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    config: ArchiveConfig,
    entries: BTreeMap<String, ArchiveEntry>,
    iteration: u64,
}

impl Archive {
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            iteration: 0,
        }
    }

    /// Advance the iteration counter used for staleness.
    pub fn tick(&mut self) {
        self.iteration += 1;
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, target: &str) -> Option<&ArchiveEntry> {
        self.entries.get(target)
    }

    pub fn best_score(&self, target: &str) -> Option<f64> {
        self.entries.get(target).map(|e| e.score)
    }

    fn replaces(&self, target: &str, score: f64, size: usize) -> bool {
        match self.entries.get(target) {
            None => true,
            Some(e) => score > e.score || (score == e.score && size < e.holder.individual.size()),
        }
    }

    /// Whether `candidate` would take at least one slot.
    pub fn is_better_than_archived(&self, candidate: &EvaluatedIndividual) -> bool {
        let size = candidate.individual.size();
        candidate
            .scores()
            .iter()
            .any(|(t, s)| self.replaces(t, *s, size))
    }

    /// Offer `candidate` for every target it reached.
    pub fn add(&mut self, candidate: &EvaluatedIndividual) -> ArchiveUpdate {
        let size = candidate.individual.size();
        let mut update = ArchiveUpdate::default();
        for (target, score) in candidate.scores() {
            if !score.is_finite() {
                warn!(coverage_target = %target, score = *score, "non-finite score ignored");
                continue;
            }
            if !self.replaces(target, *score, size) {
                continue;
            }
            let previous = self.entries.get(target);
            let gain = score - previous.map_or(0.0, |e| e.score);
            let improvements = previous.map_or(0, |e| e.improvements) + 1;
            self.entries.insert(
                target.clone(),
                ArchiveEntry {
                    holder: candidate.clone(),
                    score: *score,
                    improvements,
                    last_improvement: self.iteration,
                },
            );
            update.gain += gain;
            update.improved.push(target.clone());
        }
        if update.is_improvement() {
            debug!(targets = update.improved.len(), gain = update.gain, "archive updated");
        }
        update
    }

    fn is_covered(&self, e: &ArchiveEntry) -> bool {
        e.score >= self.config.covered_threshold
    }

    /// Sampling weight of one slot: stale, rarely improved slots weigh more.
    fn weight(&self, e: &ArchiveEntry) -> f64 {
        let age = self.iteration.saturating_sub(e.last_improvement) as f64;
        (1.0 + age * self.config.staleness_weight) / f64::from(1 + e.improvements)
    }

    /// Pick an individual to mutate.
    ///
    /// Uncovered targets are preferred; covered ones are used only when
    /// nothing else remains.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&EvaluatedIndividual> {
        let uncovered: Vec<&ArchiveEntry> = self.entries.values().filter(|e| !self.is_covered(e)).collect();
        let pool: Vec<&ArchiveEntry> = if uncovered.is_empty() {
            self.entries.values().collect()
        } else {
            uncovered
        };
        if pool.is_empty() {
            return None;
        }
        let weights: Vec<f64> = pool.iter().map(|e| self.weight(e)).collect();
        Some(&pool[pick_weighted(rng, &weights)].holder)
    }

    /// Fraction of known targets that are covered.
    pub fn coverage(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.covered_targets().len() as f64 / self.entries.len() as f64
    }

    pub fn covered_targets(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| self.is_covered(e))
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Distinct individuals that cover at least one target.
    pub fn solution(&self) -> Vec<&EvaluatedIndividual> {
        let mut seen = BTreeSet::new();
        self.entries
            .values()
            .filter(|e| self.is_covered(e))
            .filter(|e| seen.insert(e.holder.individual.tracking().id))
            .map(|e| &e.holder)
            .collect()
    }
}
