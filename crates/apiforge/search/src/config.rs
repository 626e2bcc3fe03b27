//! Search configuration.
//!
//! Every component takes its own section; [`SearchConfig`] aggregates them
//! and can be loaded from JSON. Missing keys fall back to defaults.

use std::time::Duration;

use apiforge_binding::BindingConfig;
use apiforge_gene::GeneMutationConfig;
use serde::{Deserialize, Serialize};

use crate::error::{check_prob, ConfigError};

// ── Sampler ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Chance that an HTTP-shaped action is sent without authentication.
    pub no_auth_prob: f64,
    /// Chance of building an individual from a seed skeleton when seeds exist.
    pub prob_smart_sampling: f64,
    /// Upper bound on main actions in a randomly sampled individual.
    pub max_test_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            no_auth_prob: 0.05,
            prob_smart_sampling: 0.5,
            max_test_size: 10,
        }
    }
}

impl SamplerConfig {
    pub fn with_no_auth_prob(mut self, p: f64) -> Self {
        self.no_auth_prob = p;
        self
    }

    pub fn with_prob_smart_sampling(mut self, p: f64) -> Self {
        self.prob_smart_sampling = p;
        self
    }

    pub fn with_max_test_size(mut self, n: usize) -> Self {
        self.max_test_size = n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_prob("no_auth_prob", self.no_auth_prob)?;
        check_prob("prob_smart_sampling", self.prob_smart_sampling)?;
        if self.max_test_size < 1 {
            return Err(ConfigError::InvalidTestSize);
        }
        Ok(())
    }
}

// ── Mutator ─────────────────────────────────────────────────────────

/// How the gene to mutate is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStrategy {
    /// Uniform over mutable genes.
    #[default]
    Standard,
    /// Weighted by impact records.
    ImpactAdaptive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutatorConfig {
    pub strategy: MutationStrategy,
    /// Chance of a structural change instead of a gene mutation.
    pub structure_mutation_prob: f64,
    /// Relative weights of the structural operators.
    pub add_action_weight: f64,
    pub remove_action_weight: f64,
    pub swap_actions_weight: f64,
    /// Streak length after which a gene counts as stale.
    pub stale_streak_threshold: u32,
    /// Extra resize chance per stale manipulation of a collection.
    pub stale_resize_step: f64,
    pub gene: GeneMutationConfig,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            strategy: MutationStrategy::Standard,
            structure_mutation_prob: 0.2,
            add_action_weight: 1.0,
            remove_action_weight: 1.0,
            swap_actions_weight: 1.0,
            stale_streak_threshold: 5,
            stale_resize_step: 0.1,
            gene: GeneMutationConfig::default(),
        }
    }
}

impl MutatorConfig {
    pub fn with_strategy(mut self, strategy: MutationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_structure_mutation_prob(mut self, p: f64) -> Self {
        self.structure_mutation_prob = p;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_prob("structure_mutation_prob", self.structure_mutation_prob)?;
        check_prob("stale_resize_step", self.stale_resize_step)?;
        let weights = [self.add_action_weight, self.remove_action_weight, self.swap_actions_weight];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Invalid(
                "structural operator weights must be finite, non-negative and not all zero".into(),
            ));
        }
        self.gene.validate().map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

// ── Archive ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Score at or above which a target counts as covered.
    pub covered_threshold: f64,
    /// Weight gained per iteration since a target's last improvement.
    pub staleness_weight: f64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            covered_threshold: 1.0,
            staleness_weight: 0.1,
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_prob("covered_threshold", self.covered_threshold)?;
        if self.staleness_weight < 0.0 || !self.staleness_weight.is_finite() {
            return Err(ConfigError::Invalid("staleness_weight must be >= 0".into()));
        }
        Ok(())
    }
}

// ── Aggregate ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub sampler: SamplerConfig,
    pub mutator: MutatorConfig,
    pub binding: BindingConfig,
    pub archive: ArchiveConfig,
    /// Chance of sampling a fresh individual instead of mutating an archived one.
    pub prob_random: f64,
    pub max_evaluations: u64,
    pub evaluation_timeout_ms: u64,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            mutator: MutatorConfig::default(),
            binding: BindingConfig::default(),
            archive: ArchiveConfig::default(),
            prob_random: 0.5,
            max_evaluations: 1000,
            evaluation_timeout_ms: 10_000,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_evaluations(mut self, n: u64) -> Self {
        self.max_evaluations = n;
        self
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampler.validate()?;
        self.mutator.validate()?;
        self.archive.validate()?;
        self.binding
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        check_prob("prob_random", self.prob_random)?;
        if self.evaluation_timeout_ms == 0 {
            return Err(ConfigError::Invalid("evaluation_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
