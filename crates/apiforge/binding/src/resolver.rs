//! Parameter-to-parameter binding.

use std::collections::BTreeSet;

use apiforge_action::{
    Action, ActionId, BindingLink, BindingOrigin, GeneAddr, Individual, ParamRole, Parameter,
    PathTemplate,
};
use apiforge_gene::{GeneKind, GeneTree, GeneVariant, NodeId};
use rand::Rng;
use tracing::{debug, trace};

use crate::config::BindingConfig;
use crate::direction::{resolve_direction, Direction};
use crate::error::BindingResult;
use crate::names::{find_field, gene_name_map, is_general_name, modify_field_name, score_of_match};
use crate::similarity::{NormalizedLevenshtein, StringSimilarity};

// ── Parameter View ──────────────────────────────────────────────────

/// A parameter together with where it lives.
#[derive(Clone, Copy, Debug)]
pub struct ParamView<'a> {
    pub action: ActionId,
    pub index: usize,
    pub param: &'a Parameter,
    pub path: Option<&'a PathTemplate>,
}

impl<'a> ParamView<'a> {
    pub fn of(action: &'a Action, index: usize) -> Option<Self> {
        action.param(index).map(|param| Self {
            action: action.id(),
            index,
            param,
            path: action.path_template(),
        })
    }

    /// Every parameter of `action`.
    pub fn all(action: &'a Action) -> Vec<Self> {
        (0..action.params().len())
            .filter_map(|i| Self::of(action, i))
            .collect()
    }

    pub fn tree(&self) -> &'a GeneTree {
        &self.param.gene
    }

    pub fn addr(&self, node: NodeId) -> GeneAddr {
        GeneAddr::new(self.action, self.index, node)
    }

    pub fn role(&self) -> ParamRole {
        self.param.role
    }

    fn is_body(&self) -> bool {
        self.param.is_body()
    }

    /// Literal path segments, most specific first.
    fn tokens(&self) -> Vec<String> {
        self.path
            .map(|p| p.non_parameter_tokens().into_iter().rev().collect())
            .unwrap_or_default()
    }

    fn value_node(&self) -> BindingResult<NodeId> {
        Ok(self.tree().value_node(self.tree().root())?)
    }
}

/// A bound value inside an optional goes to the optional itself, so that
/// binding activates it.
pub(crate) fn lift_optional(tree: &GeneTree, node: NodeId) -> BindingResult<NodeId> {
    match tree.node(node)?.parent() {
        Some(p) if tree.variant(p)? == GeneVariant::Optional => Ok(p),
        _ => Ok(node),
    }
}

// ── Resolver ────────────────────────────────────────────────────────

/// Computes binding links between parameters.
pub struct BindingResolver {
    config: BindingConfig,
    similarity: Box<dyn StringSimilarity>,
    known_tables: Option<BTreeSet<String>>,
}

impl Default for BindingResolver {
    fn default() -> Self {
        Self::new(BindingConfig::default())
    }
}

impl BindingResolver {
    pub fn new(config: BindingConfig) -> Self {
        Self {
            config,
            similarity: Box::new(NormalizedLevenshtein),
            known_tables: None,
        }
    }

    pub fn with_similarity(mut self, similarity: Box<dyn StringSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Tables DB directives may refer to. Unset means any table is accepted.
    pub fn with_known_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub(crate) fn known_tables(&self) -> Option<&BTreeSet<String>> {
        self.known_tables.as_ref()
    }

    pub(crate) fn is_similar(&self, a: &str, b: &str) -> bool {
        self.similarity.similarity(a, b) >= self.config.similarity_threshold
    }

    /// Links that make `target` take values from `candidates`.
    ///
    /// Every link runs from a candidate gene to a gene of `target`.
    pub fn bind_param<R: Rng + ?Sized>(
        &self,
        target: ParamView<'_>,
        candidates: &[ParamView<'_>],
        rng: &mut R,
    ) -> BindingResult<Vec<BindingLink>> {
        let all_body = !candidates.is_empty() && candidates.iter().all(|c| c.is_body());
        let links = match target.role() {
            ParamRole::Path | ParamRole::Form | ParamRole::Header => {
                match candidates
                    .iter()
                    .find(|c| c.role() == target.role() && c.param.name == target.param.name)
                {
                    Some(same) => vec![self.value_link(same, &target)?],
                    None if all_body && target.role() == ParamRole::Path => {
                        self.bind_body_and_other(&candidates[0], &target, false)?
                    }
                    None => Vec::new(),
                }
            }
            ParamRole::Query => {
                if all_body {
                    self.bind_body_and_other(&candidates[0], &target, false)?
                } else {
                    match candidates
                        .iter()
                        .filter(|c| !c.is_body())
                        .find(|c| c.param.name == target.param.name)
                    {
                        Some(same) => vec![self.value_link(same, &target)?],
                        None => Vec::new(),
                    }
                }
            }
            ParamRole::Body => {
                if candidates.iter().any(|c| !c.is_body()) {
                    let mut out = Vec::new();
                    for c in candidates.iter().filter(|c| !c.is_body()) {
                        out.extend(self.bind_body_and_other(&target, c, true)?);
                    }
                    out
                } else if let Some(first) = candidates.first() {
                    self.bind_body_with_body(&target, first, rng)?
                } else {
                    Vec::new()
                }
            }
            ParamRole::DbColumn | ParamRole::Return => {
                debug!(role = %target.role(), param = %target.param.name, "no parameter binding for role");
                Vec::new()
            }
        };
        trace!(param = %target.param.name, links = links.len(), "parameter bound");
        Ok(links)
    }

    /// Link between the value genes of two whole parameters.
    fn value_link(&self, source: &ParamView<'_>, target: &ParamView<'_>) -> BindingResult<BindingLink> {
        self.oriented(source, source.value_node()?, target, target.value_node()?)
    }

    /// Build a `source → target` link, swapping it only when both genes sit
    /// in the same action and the target's variant outranks the source's.
    fn oriented(
        &self,
        source: &ParamView<'_>,
        source_node: NodeId,
        target: &ParamView<'_>,
        target_node: NodeId,
    ) -> BindingResult<BindingLink> {
        let reversed = source.action == target.action
            && resolve_direction(
                source.tree().variant(source_node)?,
                target.tree().variant(target_node)?,
                None,
            ) == Direction::Reversed;
        let (from, from_node, to, to_node) = if reversed {
            (target, target_node, source, source_node)
        } else {
            (source, source_node, target, target_node)
        };
        let to_node = lift_optional(to.tree(), to_node)?;
        Ok(BindingLink::new(from.addr(from_node), to.addr(to_node), BindingOrigin::Params))
    }

    /// Match a body parameter against a non-body parameter.
    ///
    /// With `body_is_target` the body's fields take values from `other`;
    /// otherwise `other` takes values from the body.
    fn bind_body_and_other(
        &self,
        body: &ParamView<'_>,
        other: &ParamView<'_>,
        body_is_target: bool,
    ) -> BindingResult<Vec<BindingLink>> {
        let other_node = other.value_node()?;
        let other_tree = other.tree();
        let other_name = other_tree.name(other_node)?;
        let other_variant = other_tree.variant(other_node)?;

        let body_tree = body.tree();
        let body_value = body.value_node()?;
        if !is_general_name(other_name) {
            if let GeneKind::Object { fields, ref_type } = body_tree.kind(body_value)? {
                for f in fields {
                    let field_value = body_tree.value_node(*f)?;
                    if find_field(body_tree.name(*f)?, ref_type.as_deref(), other_name)
                        && body_tree.variant(field_value)? == other_variant
                    {
                        return Ok(vec![self.pair(body, field_value, other, other_node, body_is_target)?]);
                    }
                }
            }
        }

        let other_map = gene_name_map(other_tree, &other.tokens())?;
        let body_map = gene_name_map(body_tree, &body.tokens())?;
        let mut links = Vec::new();
        for (key, other_gene) in other_map {
            let matched = body_map
                .iter()
                .find(|(k, _)| *k == key)
                .or_else(|| body_map.iter().find(|(k, _)| score_of_match(&key, k) == 0));
            if let Some((_, body_gene)) = matched {
                links.push(self.pair(body, *body_gene, other, other_gene, body_is_target)?);
            }
        }
        Ok(links)
    }

    fn pair(
        &self,
        body: &ParamView<'_>,
        body_node: NodeId,
        other: &ParamView<'_>,
        other_node: NodeId,
        body_is_target: bool,
    ) -> BindingResult<BindingLink> {
        if body_is_target {
            self.oriented(other, other_node, body, body_node)
        } else {
            self.oriented(body, body_node, other, other_node)
        }
    }

    /// Match a body target against a body candidate.
    fn bind_body_with_body<R: Rng + ?Sized>(
        &self,
        target: &ParamView<'_>,
        candidate: &ParamView<'_>,
        rng: &mut R,
    ) -> BindingResult<Vec<BindingLink>> {
        let t_tree = target.tree();
        let c_tree = candidate.tree();
        let t_value = target.value_node()?;
        let c_value = candidate.value_node()?;
        if t_tree.variant(t_value)? != GeneVariant::Object {
            return Ok(Vec::new());
        }
        if c_tree.variant(c_value)? != GeneVariant::Object {
            let c_name = c_tree.name(c_value)?;
            let c_variant = c_tree.variant(c_value)?;
            for f in t_tree.children(t_value)? {
                let modified = modify_field_name(t_tree, t_value, f)?;
                if t_tree.variant(f)? == c_variant
                    && (t_tree.name(f)?.eq_ignore_ascii_case(c_name) || self.is_similar(&modified, c_name))
                {
                    return Ok(vec![self.oriented(candidate, c_value, target, f)?]);
                }
            }
            return Ok(Vec::new());
        }
        self.bind_object_with_object(target, t_value, candidate, c_value, rng)
    }

    /// Structural match of two objects: the fields of `target_obj` take
    /// values from same-variant, same-named (or similar) fields of `source_obj`.
    pub(crate) fn bind_object_with_object<R: Rng + ?Sized>(
        &self,
        target: &ParamView<'_>,
        target_obj: NodeId,
        source: &ParamView<'_>,
        source_obj: NodeId,
        rng: &mut R,
    ) -> BindingResult<Vec<BindingLink>> {
        let t_tree = target.tree();
        let s_tree = source.tree();
        let mut links = Vec::new();
        for f in t_tree.children(target_obj)? {
            let eligible = match t_tree.kind(f)? {
                GeneKind::Optional { active, .. } => {
                    *active || rng.gen_bool(self.config.inactive_optional_bind_prob)
                }
                _ => true,
            };
            if !eligible {
                continue;
            }
            let tf = t_tree.value_node(f)?;
            let tf_variant = t_tree.variant(tf)?;
            let t_name = modify_field_name(t_tree, target_obj, tf)?;
            let mut found = None;
            for sf in s_tree.children(source_obj)? {
                let sv = s_tree.value_node(sf)?;
                if s_tree.variant(sv)? != tf_variant {
                    continue;
                }
                let s_name = modify_field_name(s_tree, source_obj, sv)?;
                if s_name.eq_ignore_ascii_case(&t_name) || self.is_similar(&t_name, &s_name) {
                    found = Some(sv);
                    break;
                }
            }
            let Some(sv) = found else {
                continue;
            };
            if tf_variant == GeneVariant::Object {
                links.extend(self.bind_object_with_object(target, tf, source, sv, rng)?);
            } else {
                links.push(self.oriented(source, sv, target, tf)?);
            }
        }
        Ok(links)
    }

    /// Bind every main action against all earlier main actions and register
    /// the links. Returns the number of links registered.
    pub fn bind_individual<R: Rng + ?Sized>(&self, individual: &mut Individual, rng: &mut R) -> BindingResult<usize> {
        let mut proposed = Vec::new();
        let main = individual.main_actions();
        for (i, action) in main.iter().enumerate() {
            for target in ParamView::all(action) {
                for earlier in &main[..i] {
                    let candidates = ParamView::all(earlier);
                    proposed.extend(self.bind_param(target, &candidates, rng)?);
                }
            }
        }
        let mut registered = 0;
        for link in proposed {
            if individual.register_link(link)? {
                registered += 1;
            }
        }
        Ok(registered)
    }

    /// Drop and recompute the parameter links of one main action.
    pub fn rebind_action<R: Rng + ?Sized>(
        &self,
        individual: &mut Individual,
        action: ActionId,
        rng: &mut R,
    ) -> BindingResult<usize> {
        let mut proposed = Vec::new();
        {
            let main = individual.main_actions();
            let Some(pos) = main.iter().position(|a| a.id() == action) else {
                return Ok(0);
            };
            for target in ParamView::all(&main[pos]) {
                for earlier in &main[..pos] {
                    proposed.extend(self.bind_param(target, &ParamView::all(earlier), rng)?);
                }
            }
            for later in &main[pos + 1..] {
                for target in ParamView::all(later) {
                    proposed.extend(self.bind_param(target, &ParamView::all(&main[pos]), rng)?);
                }
            }
        }
        let mut registered = 0;
        for link in proposed {
            if individual.register_link(link)? {
                registered += 1;
            }
        }
        Ok(registered)
    }
}
