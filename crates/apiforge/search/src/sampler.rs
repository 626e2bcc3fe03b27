//! Sampler: fresh actions and individuals from the action catalog.

use std::collections::BTreeMap;

use apiforge_action::{Action, AuthContext, Individual, SampleType};
use apiforge_binding::{BindingResolver, DbBindingDirective};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{SamplerConfig, SearchConfig};
use crate::error::{ConfigError, SearchResult};

// ── Catalog ─────────────────────────────────────────────────────────

/// Immutable action templates, by name.
#[derive(Clone, Debug, Default)]
pub struct ActionCatalog {
    templates: BTreeMap<String, Action>,
}

impl ActionCatalog {
    pub fn new(templates: impl IntoIterator<Item = Action>) -> Self {
        Self {
            templates: templates.into_iter().map(|a| (a.name().to_string(), a)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn templates(&self) -> impl Iterator<Item = &Action> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ── Seeds ───────────────────────────────────────────────────────────

/// DB directives applied to one main action of a seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedDbBinding {
    pub main_index: usize,
    pub directives: Vec<DbBindingDirective>,
}

/// A hand-made individual shape reflecting a known resource dependency,
/// e.g. insert a user row, then create an order, then fetch it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedSkeleton {
    pub name: String,
    /// DB rows or stubs inserted before the main actions.
    #[serde(default)]
    pub init: Vec<Action>,
    /// Catalog names of the main actions, in order.
    pub main: Vec<String>,
    #[serde(default)]
    pub db_bindings: Vec<SeedDbBinding>,
}

impl SeedSkeleton {
    pub fn new(name: impl Into<String>, main: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            init: Vec::new(),
            main: main.into_iter().map(Into::into).collect(),
            db_bindings: Vec::new(),
        }
    }

    pub fn with_init(mut self, action: Action) -> Self {
        self.init.push(action);
        self
    }

    pub fn with_db_binding(mut self, main_index: usize, directives: Vec<DbBindingDirective>) -> Self {
        self.db_bindings.push(SeedDbBinding { main_index, directives });
        self
    }
}

// ── Sampler ─────────────────────────────────────────────────────────

pub struct Sampler {
    config: SamplerConfig,
    catalog: ActionCatalog,
    auth: Vec<AuthContext>,
    seeds: Vec<SeedSkeleton>,
    binding: BindingResolver,
}

impl Sampler {
    pub fn new(config: SamplerConfig, catalog: ActionCatalog) -> Result<Self, ConfigError> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(Self {
            config,
            catalog,
            auth: Vec::new(),
            seeds: Vec::new(),
            binding: BindingResolver::default(),
        })
    }

    /// Sampler configured from a full search configuration, binding included.
    pub fn from_search_config(config: &SearchConfig, catalog: ActionCatalog) -> Result<Self, ConfigError> {
        Ok(Self::new(config.sampler.clone(), catalog)?.with_binding(BindingResolver::new(config.binding.clone())))
    }

    pub fn with_auth(mut self, contexts: Vec<AuthContext>) -> Self {
        self.auth = contexts;
        self
    }

    /// Register seed skeletons. Every main action must be in the catalog.
    pub fn with_seeds(mut self, seeds: Vec<SeedSkeleton>) -> Result<Self, ConfigError> {
        for seed in &seeds {
            if let Some(missing) = seed.main.iter().find(|n| self.catalog.get(n).is_none()) {
                return Err(ConfigError::UnknownSeedAction {
                    seed: seed.name.clone(),
                    action: missing.clone(),
                });
            }
        }
        self.seeds = seeds;
        Ok(self)
    }

    pub fn with_binding(mut self, resolver: BindingResolver) -> Self {
        self.binding = resolver;
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn binding(&self) -> &BindingResolver {
        &self.binding
    }

    /// Whether smart sampling can ever be used.
    pub fn has_smart_sampling(&self) -> bool {
        !self.seeds.is_empty() && self.config.prob_smart_sampling > 0.0
    }

    /// No authentication with `no_auth_prob` (or when none is registered),
    /// otherwise a uniform pick.
    pub fn random_auth<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<AuthContext> {
        if self.auth.is_empty() || rng.gen_bool(self.config.no_auth_prob) {
            return None;
        }
        self.auth.choose(rng).cloned()
    }

    fn prepare<R: Rng + ?Sized>(&self, template: &Action, rng: &mut R) -> SearchResult<Action> {
        let mut action = template.clone();
        action.randomize(rng)?;
        if action.is_http_shaped() {
            action.set_auth(self.random_auth(rng));
        }
        Ok(action)
    }

    /// A uniformly chosen template, randomized, with authentication.
    pub fn sample_random_action<R: Rng + ?Sized>(&self, rng: &mut R) -> SearchResult<Action> {
        let index = rng.gen_range(0..self.catalog.len());
        let template = self
            .catalog
            .templates()
            .nth(index)
            .ok_or(ConfigError::EmptyCatalog)?;
        let action = self.prepare(template, rng)?;
        trace!(action = action.name(), "action sampled");
        Ok(action)
    }

    /// A new individual, bound and synchronised.
    pub fn sample_individual<R: Rng + ?Sized>(&self, rng: &mut R) -> SearchResult<Individual> {
        if self.has_smart_sampling() && rng.gen_bool(self.config.prob_smart_sampling) {
            if let Some(seed) = self.seeds.choose(rng) {
                return self.sample_from_seed(seed, rng);
            }
        }
        self.sample_random_individual(rng)
    }

    pub fn sample_random_individual<R: Rng + ?Sized>(&self, rng: &mut R) -> SearchResult<Individual> {
        let mut ind = Individual::new(SampleType::Random);
        let n = rng.gen_range(1..=self.config.max_test_size);
        for _ in 0..n {
            ind.add_main_action(self.sample_random_action(rng)?);
        }
        self.binding.bind_individual(&mut ind, rng)?;
        ind.sync_bindings()?;
        debug!(size = ind.size(), links = ind.links().len(), "random individual sampled");
        Ok(ind)
    }

    /// Build an individual from `seed`.
    pub fn sample_from_seed<R: Rng + ?Sized>(&self, seed: &SeedSkeleton, rng: &mut R) -> SearchResult<Individual> {
        let mut ind = Individual::new(SampleType::Smart);
        for init in &seed.init {
            let mut action = init.clone();
            action.randomize(rng)?;
            ind.add_init_action(action);
        }
        let mut main_ids = Vec::with_capacity(seed.main.len());
        for name in &seed.main {
            let template = self.catalog.get(name).ok_or_else(|| ConfigError::UnknownSeedAction {
                seed: seed.name.clone(),
                action: name.clone(),
            })?;
            main_ids.push(ind.add_main_action(self.prepare(template, rng)?));
        }
        ind.repair_initialization_actions(rng)?;
        self.binding.bind_individual(&mut ind, rng)?;
        for b in &seed.db_bindings {
            if let Some(id) = main_ids.get(b.main_index) {
                self.binding.bind_db(&mut ind, *id, &b.directives)?;
            }
        }
        ind.sync_bindings()?;
        debug!(seed = %seed.name, size = ind.size(), links = ind.links().len(), "smart individual sampled");
        Ok(ind)
    }
}
