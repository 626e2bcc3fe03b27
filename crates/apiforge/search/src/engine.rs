//! Single-threaded search loop.
//!
//! Each step either samples a fresh individual or mutates one drawn from
//! the archive, awaits its evaluation under a timeout, then updates the
//! archive and the impact tracker. A failed or timed-out evaluation
//! abandons the candidate and leaves both untouched.

use apiforge_action::Individual;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::config::SearchConfig;
use crate::error::{EvaluationError, SearchResult};
use crate::evaluator::{EvaluatedIndividual, EvaluationReport, FitnessEvaluator};
use crate::impact::{ImpactTracker, MutationOutcome};
use crate::mutator::Mutator;
use crate::sampler::Sampler;

/// What one step did.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    Evaluated {
        /// Targets the candidate took over in the archive.
        improved: usize,
        mutated: bool,
    },
    Abandoned(EvaluationError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub evaluations: u64,
    pub abandoned: u64,
    pub targets: usize,
    pub covered: usize,
    pub coverage: f64,
}

pub struct SearchLoop<E> {
    config: SearchConfig,
    sampler: Sampler,
    mutator: Mutator,
    archive: Archive,
    impacts: ImpactTracker,
    evaluator: E,
    rng: StdRng,
    evaluations: u64,
    abandoned: u64,
}

impl<E: FitnessEvaluator> SearchLoop<E> {
    pub fn new(config: SearchConfig, sampler: Sampler, evaluator: E) -> SearchResult<Self> {
        config.validate()?;
        let mutator = Mutator::new(config.mutator.clone())?;
        let archive = Archive::new(config.archive.clone());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            sampler,
            mutator,
            archive,
            impacts: ImpactTracker::new(),
            evaluator,
            rng,
            evaluations: 0,
            abandoned: 0,
        })
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn impacts(&self) -> &ImpactTracker {
        &self.impacts
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    async fn evaluate(&self, candidate: &Individual) -> Result<EvaluationReport, EvaluationError> {
        let timeout = self.config.evaluation_timeout();
        match tokio::time::timeout(timeout, self.evaluator.evaluate(candidate)).await {
            Ok(result) => result,
            Err(_) => Err(EvaluationError::Timeout(timeout)),
        }
    }

    /// Sample or mutate one candidate, evaluate it, record the result.
    pub async fn step(&mut self) -> SearchResult<StepOutcome> {
        self.archive.tick();
        let parent = if self.archive.is_empty() || self.rng.gen_bool(self.config.prob_random) {
            None
        } else {
            self.archive.sample(&mut self.rng).cloned()
        };

        let (candidate, lineage) = match parent {
            None => (self.sampler.sample_individual(&mut self.rng)?, None),
            Some(parent) => {
                let m = self
                    .mutator
                    .mutate(&parent.individual, &self.sampler, Some(&self.impacts), &mut self.rng)?;
                (m.individual, Some((parent.report, m.touched)))
            }
        };
        let mutated = lineage.is_some();

        self.evaluations += 1;
        let report = match self.evaluate(&candidate).await {
            Ok(report) => report,
            Err(e) => {
                self.abandoned += 1;
                warn!(error = %e, evaluator = self.evaluator.name(), "evaluation abandoned");
                return Ok(StepOutcome::Abandoned(e));
            }
        };

        let evaluated = EvaluatedIndividual::new(candidate, report);
        let update = self.archive.add(&evaluated);
        if let Some((parent_report, touched)) = lineage {
            let outcome =
                MutationOutcome::between(&parent_report, &evaluated.report, update.is_improvement(), update.gain);
            self.impacts.record(&touched, &outcome);
        }
        debug!(
            evaluation = self.evaluations,
            mutated,
            improved = update.improved.len(),
            "step complete"
        );
        Ok(StepOutcome::Evaluated {
            improved: update.improved.len(),
            mutated,
        })
    }

    /// Step until the evaluation budget is spent.
    pub async fn run(&mut self) -> SearchResult<SearchSummary> {
        while self.evaluations < self.config.max_evaluations {
            self.step().await?;
        }
        let summary = self.summary();
        info!(
            evaluations = summary.evaluations,
            abandoned = summary.abandoned,
            covered = summary.covered,
            targets = summary.targets,
            "search finished"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> SearchSummary {
        SearchSummary {
            evaluations: self.evaluations,
            abandoned: self.abandoned,
            targets: self.archive.len(),
            covered: self.archive.covered_targets().len(),
            coverage: self.archive.coverage(),
        }
    }
}
