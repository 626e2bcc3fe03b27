//! Mutation engine.
//!
//! A mutation works on a private clone of the parent and either changes the
//! action sequence (add, remove, swap) or applies one gene mutation. The
//! result names every identity path it touched so the impact tracker can
//! learn from the evaluation that follows.

use apiforge_action::{ActionError, ActionId, Individual};
use apiforge_gene::{pick_weighted, MutationGuide, Uniform};
use rand::Rng;
use tracing::{debug, trace};

use crate::config::{MutationStrategy, MutatorConfig};
use crate::error::{ConfigError, SearchResult};
use crate::impact::{gene_identity, param_prefix, ImpactGuide, ImpactTracker, STRUCTURE_IDENTITY};
use crate::sampler::Sampler;

/// Structural operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuralOp {
    Add,
    Remove,
    Swap,
}

impl StructuralOp {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add_action",
            Self::Remove => "remove_action",
            Self::Swap => "swap_actions",
        }
    }
}

/// A top-level gene open to mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneCandidate {
    pub action: ActionId,
    pub param: usize,
    pub identity: String,
}

#[derive(Clone, Debug)]
pub struct MutationResult {
    pub individual: Individual,
    /// Identity paths changed by the mutation.
    pub touched: Vec<String>,
    pub operator: &'static str,
}

pub struct Mutator {
    config: MutatorConfig,
}

impl Mutator {
    pub fn new(config: MutatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MutatorConfig {
        &self.config
    }

    /// Mutable parameter genes, skipping persisted rows and genes whose
    /// whole value is a binding target.
    pub fn gene_candidates(&self, individual: &Individual) -> SearchResult<Vec<GeneCandidate>> {
        let mut out = Vec::new();
        for action in individual.all_actions() {
            if action.represents_existing_data() {
                continue;
            }
            for (i, p) in action.params().iter().enumerate() {
                let root = p.gene.root();
                if !p.gene.is_mutable(root)? {
                    continue;
                }
                let value = p.gene.value_node(root)?;
                let bound = individual.links().iter().any(|l| {
                    l.target.action == action.id()
                        && l.target.param == i
                        && (l.target.node == root || l.target.node == value)
                });
                if bound {
                    continue;
                }
                out.push(GeneCandidate {
                    action: action.id(),
                    param: i,
                    identity: gene_identity(action, p, root)?,
                });
            }
        }
        Ok(out)
    }

    /// Selection weights aligned with `candidates`.
    pub fn gene_weights(&self, candidates: &[GeneCandidate], impacts: Option<&ImpactTracker>) -> Vec<f64> {
        match (self.config.strategy, impacts) {
            (MutationStrategy::ImpactAdaptive, Some(t)) => candidates.iter().map(|c| t.weight(&c.identity)).collect(),
            _ => vec![1.0; candidates.len()],
        }
    }

    /// Chance of a structural change. Adaptive runs raise it with the share
    /// of stale candidate genes.
    pub fn structure_probability(&self, candidates: &[GeneCandidate], impacts: Option<&ImpactTracker>) -> f64 {
        let base = self.config.structure_mutation_prob;
        let (MutationStrategy::ImpactAdaptive, Some(t)) = (self.config.strategy, impacts) else {
            return base;
        };
        if candidates.is_empty() {
            return base;
        }
        let stale = candidates
            .iter()
            .filter(|c| {
                t.get(&c.identity)
                    .is_some_and(|r| r.staleness() >= self.config.stale_streak_threshold)
            })
            .count();
        base + (1.0 - base) * stale as f64 / candidates.len() as f64
    }

    fn feasible_ops(&self, individual: &Individual, max_size: usize) -> Vec<(StructuralOp, f64)> {
        let size = individual.size();
        let mut ops = Vec::new();
        if size < max_size && self.config.add_action_weight > 0.0 {
            ops.push((StructuralOp::Add, self.config.add_action_weight));
        }
        if size > 1 && self.config.remove_action_weight > 0.0 {
            ops.push((StructuralOp::Remove, self.config.remove_action_weight));
        }
        if size > 1 && self.config.swap_actions_weight > 0.0 {
            ops.push((StructuralOp::Swap, self.config.swap_actions_weight));
        }
        ops
    }

    /// Mutate a clone of `parent`.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        parent: &Individual,
        sampler: &Sampler,
        impacts: Option<&ImpactTracker>,
        rng: &mut R,
    ) -> SearchResult<MutationResult> {
        let mut individual = parent.clone();
        let candidates = self.gene_candidates(&individual)?;
        let ops = if individual.is_structure_mutable() {
            self.feasible_ops(&individual, sampler.config().max_test_size)
        } else {
            Vec::new()
        };

        let structural = !ops.is_empty()
            && (candidates.is_empty() || rng.gen_bool(self.structure_probability(&candidates, impacts)));
        let (touched, operator) = if structural {
            let weights: Vec<f64> = ops.iter().map(|(_, w)| *w).collect();
            let op = ops[pick_weighted(rng, &weights)].0;
            self.apply_structural(&mut individual, op, sampler, rng)?;
            (vec![STRUCTURE_IDENTITY.to_string()], op.name())
        } else if candidates.is_empty() {
            debug!("nothing to mutate");
            (Vec::new(), "none")
        } else {
            let weights = self.gene_weights(&candidates, impacts);
            let pick = &candidates[pick_weighted(rng, &weights)];
            (self.apply_gene(&mut individual, pick, impacts, rng)?, "gene")
        };

        individual.sync_bindings()?;
        individual.tracking_mut().evolve(operator);
        trace!(operator, touched = touched.len(), "individual mutated");
        Ok(MutationResult {
            individual,
            touched,
            operator,
        })
    }

    fn apply_structural<R: Rng + ?Sized>(
        &self,
        individual: &mut Individual,
        op: StructuralOp,
        sampler: &Sampler,
        rng: &mut R,
    ) -> SearchResult<()> {
        let size = individual.size();
        match op {
            StructuralOp::Add => {
                let action = sampler.sample_random_action(rng)?;
                let id = individual.insert_main_action(rng.gen_range(0..=size), action);
                sampler.binding().rebind_action(individual, id, rng)?;
            }
            StructuralOp::Remove => {
                individual.remove_main_action(rng.gen_range(0..size));
            }
            StructuralOp::Swap => {
                let a = rng.gen_range(0..size);
                let b = (a + rng.gen_range(1..size)) % size;
                individual.swap_main_actions(a, b)?;
                for i in [a, b] {
                    if let Some(id) = individual.main_actions().get(i).map(|x| x.id()) {
                        sampler.binding().rebind_action(individual, id, rng)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_gene<R: Rng + ?Sized>(
        &self,
        individual: &mut Individual,
        pick: &GeneCandidate,
        impacts: Option<&ImpactTracker>,
        rng: &mut R,
    ) -> SearchResult<Vec<String>> {
        let prefix = {
            let action = individual
                .action(pick.action)
                .ok_or(ActionError::UnknownAction(pick.action))?;
            let param = action.param(pick.param).ok_or(ActionError::UnknownParameter {
                action: pick.action,
                index: pick.param,
            })?;
            param_prefix(action, param)
        };
        let uniform = Uniform;
        let adaptive;
        let guide: &dyn MutationGuide = match (self.config.strategy, impacts) {
            (MutationStrategy::ImpactAdaptive, Some(t)) => {
                adaptive = ImpactGuide::new(
                    t,
                    prefix.clone(),
                    self.config.stale_streak_threshold,
                    self.config.stale_resize_step,
                );
                &adaptive
            }
            _ => &uniform,
        };
        let tree = individual.gene_mut(pick.action, pick.param)?;
        let root = tree.root();
        let nodes = tree.mutate(root, rng, &self.config.gene, guide)?;
        let mut touched = Vec::with_capacity(nodes.len());
        for n in nodes {
            if tree.contains(n) {
                touched.push(format!("{prefix}::{}", tree.field_path(n)?));
            }
        }
        touched.dedup();
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplerConfig;
    use crate::impact::{ImpactRecord, MutationOutcome};
    use crate::sampler::ActionCatalog;
    use apiforge_action::{Action, HttpVerb, Parameter, SampleType};
    use apiforge_gene::GeneTree;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sampler() -> Sampler {
        Sampler::new(
            SamplerConfig::default().with_max_test_size(4),
            ActionCatalog::new([
                Action::http(HttpVerb::Get, "/users/{id}", vec![Parameter::path("id", GeneTree::long("id"))]),
                Action::http(HttpVerb::Get, "/items", vec![Parameter::query("q", GeneTree::string("q"))]),
            ]),
        )
        .unwrap()
    }

    fn two_gene_individual() -> Individual {
        let mut ind = Individual::new(SampleType::Random);
        ind.add_main_action(Action::http(
            HttpVerb::Get,
            "/search",
            vec![
                Parameter::query("a", GeneTree::integer("a")),
                Parameter::query("b", GeneTree::integer("b")),
            ],
        ));
        ind
    }

    #[test]
    fn parent_is_never_changed() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = sampler();
        let m = Mutator::new(MutatorConfig::default()).unwrap();
        let parent = s.sample_individual(&mut rng).unwrap();
        let snapshot = parent.clone();
        for _ in 0..20 {
            let child = m.mutate(&parent, &s, None, &mut rng).unwrap();
            assert_eq!(child.individual.tracking().parent, Some(parent.tracking().id));
        }
        assert_eq!(parent, snapshot);
    }

    #[test]
    fn size_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = sampler();
        let m = Mutator::new(MutatorConfig::default().with_structure_mutation_prob(1.0)).unwrap();
        let mut ind = s.sample_individual(&mut rng).unwrap();
        for _ in 0..100 {
            ind = m.mutate(&ind, &s, None, &mut rng).unwrap().individual;
            assert!((1..=4).contains(&ind.size()));
        }
    }

    #[test]
    fn fixed_structure_gets_gene_mutations_only() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = sampler();
        let m = Mutator::new(MutatorConfig::default().with_structure_mutation_prob(1.0)).unwrap();
        let ind = two_gene_individual().with_structure_mutable(false);
        let out = m.mutate(&ind, &s, None, &mut rng).unwrap();
        assert_eq!(out.operator, "gene");
        assert_eq!(out.individual.size(), 1);
        assert!(out.touched[0].starts_with("GET:/search::query::"));
    }

    #[test]
    fn bound_genes_are_not_candidates() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = sampler();
        let mut ind = Individual::new(SampleType::Random);
        let get = Action::http(HttpVerb::Get, "/users/{id}", vec![Parameter::path("id", GeneTree::long("id"))]);
        ind.add_main_action(get.clone());
        ind.add_main_action(get);
        s.binding().bind_individual(&mut ind, &mut rng).unwrap();
        let m = Mutator::new(MutatorConfig::default()).unwrap();
        assert_eq!(m.gene_candidates(&ind).unwrap().len(), 1);
    }

    #[test]
    fn adaptive_weights_fall_back_without_records() {
        let m = Mutator::new(MutatorConfig::default().with_strategy(MutationStrategy::ImpactAdaptive)).unwrap();
        let candidates = m.gene_candidates(&two_gene_individual()).unwrap();
        assert_eq!(m.gene_weights(&candidates, None), vec![1.0, 1.0]);
        assert_eq!(m.gene_weights(&candidates, Some(&ImpactTracker::new())), vec![1.0, 1.0]);
    }

    #[test]
    fn stale_genes_raise_structure_probability() {
        let m = Mutator::new(
            MutatorConfig::default()
                .with_strategy(MutationStrategy::ImpactAdaptive)
                .with_structure_mutation_prob(0.2),
        )
        .unwrap();
        let candidates = m.gene_candidates(&two_gene_individual()).unwrap();
        let mut t = ImpactTracker::new();
        let mut stale = ImpactRecord::new(candidates[0].identity.clone());
        stale.no_impact_streak = 10;
        t.insert(stale);
        let p = m.structure_probability(&candidates, Some(&t));
        assert!((p - 0.6).abs() < 1e-9);
        assert_eq!(m.structure_probability(&candidates, None), 0.2);
    }

    #[test]
    fn gene_mutation_reports_touched_identities() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = sampler();
        let m = Mutator::new(MutatorConfig::default().with_structure_mutation_prob(0.0)).unwrap();
        let mut ind = Individual::new(SampleType::Random);
        ind.add_main_action(Action::http(
            HttpVerb::Post,
            "/users",
            vec![Parameter::body(GeneTree::object("body", vec![GeneTree::string("name")]))],
        ));
        let out = m.mutate(&ind, &s, None, &mut rng).unwrap();
        assert_eq!(
            out.touched,
            vec!["POST:/users::body::body".to_string(), "POST:/users::body::body/name".to_string()]
        );
        let mut t = ImpactTracker::new();
        t.record(&out.touched, &MutationOutcome::default());
        assert_eq!(t.len(), 2);
    }
}
