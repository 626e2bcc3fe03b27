//! Standard gene mutation.
//!
//! [`GeneTree::mutate`] applies one elementary change somewhere beneath a
//! node and reports every node it passed through, so callers can update
//! impact statistics for the touched paths.

use std::collections::BTreeSet;

use chrono::Duration;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{GeneError, GeneResult};
use crate::node::{GeneKind, NodeId};
use crate::randomize::random_text;
use crate::tree::GeneTree;

// ── Configuration ───────────────────────────────────────────────────

/// Probabilities and step sizes for gene-level mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneMutationConfig {
    /// Chance of appending an element to a non-full collection.
    pub array_grow_prob: f64,
    /// Chance of removing an element when not growing.
    pub array_shrink_prob: f64,
    /// Chance of replacing a leaf value with a fresh random one.
    pub resample_prob: f64,
    /// Largest step applied to integer and long genes.
    pub max_int_delta: i64,
    /// Chance of deactivating an active optional instead of mutating it.
    pub optional_toggle_prob: f64,
    /// Largest shift applied to temporal genes, in seconds.
    pub max_time_shift_secs: i64,
}

impl Default for GeneMutationConfig {
    fn default() -> Self {
        Self {
            array_grow_prob: 0.1,
            array_shrink_prob: 0.1,
            resample_prob: 0.2,
            max_int_delta: 10,
            optional_toggle_prob: 0.1,
            max_time_shift_secs: 30 * 24 * 3600,
        }
    }
}

fn check_prob(name: &str, p: f64) -> GeneResult<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(GeneError::InvalidConfig(format!("{name} must be in [0,1], got {p}")))
    }
}

impl GeneMutationConfig {
    pub fn validate(&self) -> GeneResult<()> {
        check_prob("array_grow_prob", self.array_grow_prob)?;
        check_prob("array_shrink_prob", self.array_shrink_prob)?;
        check_prob("resample_prob", self.resample_prob)?;
        check_prob("optional_toggle_prob", self.optional_toggle_prob)?;
        if self.max_int_delta < 1 {
            return Err(GeneError::InvalidConfig("max_int_delta must be >= 1".into()));
        }
        if self.max_time_shift_secs < 1 {
            return Err(GeneError::InvalidConfig("max_time_shift_secs must be >= 1".into()));
        }
        Ok(())
    }
}

// ── Guidance Hook ───────────────────────────────────────────────────

/// Steers composite mutation choices, e.g. from impact statistics.
pub trait MutationGuide {
    /// Relative chance of picking `child` among mutable siblings.
    fn child_weight(&self, _tree: &GeneTree, _child: NodeId) -> f64 {
        1.0
    }

    /// Overrides the grow/shrink chance for a collection when `Some`.
    fn resize_probability(&self, _tree: &GeneTree, _collection: NodeId) -> Option<f64> {
        None
    }
}

/// Uniform child choice and configured resize probabilities.
#[derive(Clone, Copy, Debug, Default)]
pub struct Uniform;

impl MutationGuide for Uniform {}

/// Index drawn by `weights`, uniform if the weights are unusable.
pub fn pick_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> usize {
    match WeightedIndex::new(weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..weights.len().max(1)),
    }
}

enum Resize {
    Grow,
    Shrink,
    Member,
}

// ── Mutation ────────────────────────────────────────────────────────

impl GeneTree {
    /// Apply one elementary mutation beneath `id`.
    ///
    /// Returns the nodes on the path from `id` to the changed node.
    pub fn mutate<R: Rng + ?Sized>(
        &mut self,
        id: NodeId,
        rng: &mut R,
        cfg: &GeneMutationConfig,
        guide: &dyn MutationGuide,
    ) -> GeneResult<Vec<NodeId>> {
        if !self.is_mutable(id)? {
            return Err(GeneError::ImmutableGene(self.name(id)?.to_string()));
        }
        let kind = self.kind(id)?.clone();
        let mut touched = vec![id];
        match kind {
            GeneKind::Object { fields, .. } => {
                let mut mutable = Vec::new();
                for f in fields {
                    if self.is_mutable(f)? {
                        mutable.push(f);
                    }
                }
                let weights: Vec<f64> = mutable.iter().map(|c| guide.child_weight(self, *c)).collect();
                let child = mutable[pick_weighted(rng, &weights)];
                touched.extend(self.mutate(child, rng, cfg, guide)?);
            }
            GeneKind::Optional { gene, active } => {
                if !active {
                    self.set_optional_active(id, true)?;
                } else if rng.gen_bool(cfg.optional_toggle_prob) || !self.is_mutable(gene)? {
                    self.set_optional_active(id, false)?;
                } else {
                    touched.extend(self.mutate(gene, rng, cfg, guide)?);
                }
            }
            GeneKind::SqlPrimaryKey { gene, .. } => touched.extend(self.mutate(gene, rng, cfg, guide)?),
            GeneKind::Base64 { data } => touched.extend(self.mutate(data, rng, cfg, guide)?),
            GeneKind::Array {
                template,
                elements,
                max_size,
            }
            | GeneKind::Map {
                template,
                entries: elements,
                max_size,
            } => {
                let is_map = matches!(self.kind(id)?, GeneKind::Map { .. });
                match self.choose_resize(id, &elements, max_size, rng, cfg, guide)? {
                    Resize::Grow => {
                        let element = if is_map {
                            let mut used = BTreeSet::new();
                            for e in &elements {
                                used.insert(self.name(*e)?.to_string());
                            }
                            self.new_entry(id, template, &mut used, rng)?
                        } else {
                            self.new_element(id, template, rng)?
                        };
                        let mut items = elements;
                        items.push(element);
                        self.set_collection(id, items)?;
                        touched.push(element);
                    }
                    Resize::Shrink => {
                        let mut items = elements;
                        let removed = items.remove(rng.gen_range(0..items.len()));
                        self.set_collection(id, items)?;
                        self.release(removed)?;
                    }
                    Resize::Member => {
                        let mut mutable = Vec::new();
                        for e in &elements {
                            if self.is_mutable(*e)? {
                                mutable.push(*e);
                            }
                        }
                        let weights: Vec<f64> =
                            mutable.iter().map(|c| guide.child_weight(self, *c)).collect();
                        let member = mutable[pick_weighted(rng, &weights)];
                        touched.extend(self.mutate(member, rng, cfg, guide)?);
                    }
                }
            }
            leaf => {
                let fresh = mutate_leaf(&leaf, rng, cfg);
                self.node_mut(id)?.kind = fresh;
            }
        }
        trace!(node = %id, touched = touched.len(), "gene mutated");
        Ok(touched)
    }

    fn choose_resize<R: Rng + ?Sized>(
        &self,
        id: NodeId,
        elements: &[NodeId],
        max_size: usize,
        rng: &mut R,
        cfg: &GeneMutationConfig,
        guide: &dyn MutationGuide,
    ) -> GeneResult<Resize> {
        let len = elements.len();
        if len == 0 {
            return Ok(Resize::Grow);
        }
        let can_grow = len < max_size;
        let mut any_mutable = false;
        for e in elements {
            if self.is_mutable(*e)? {
                any_mutable = true;
                break;
            }
        }
        let size_change = || {
            if can_grow {
                Resize::Grow
            } else {
                Resize::Shrink
            }
        };

        if let Some(p) = guide.resize_probability(self, id) {
            if rng.gen_bool(p.clamp(0.0, 1.0)) || !any_mutable {
                return Ok(if can_grow && rng.gen_bool(0.5) {
                    Resize::Grow
                } else {
                    Resize::Shrink
                });
            }
            return Ok(Resize::Member);
        }

        if can_grow && rng.gen_bool(cfg.array_grow_prob) {
            Ok(Resize::Grow)
        } else if rng.gen_bool(cfg.array_shrink_prob) {
            Ok(Resize::Shrink)
        } else if any_mutable {
            Ok(Resize::Member)
        } else {
            Ok(size_change())
        }
    }
}

fn step<R: Rng + ?Sized>(rng: &mut R, max: i64) -> i64 {
    let magnitude = rng.gen_range(1..=max.max(1));
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Nudge `value` by `delta` inside `[min, max]`, reversing direction if clamped onto itself.
fn nudge(value: i128, delta: i128, min: i128, max: i128) -> i128 {
    let moved = (value + delta).clamp(min, max);
    if moved != value {
        moved
    } else {
        (value - delta).clamp(min, max)
    }
}

fn nudge_real(value: f64, delta: f64, min: f64, max: f64) -> f64 {
    let moved = (value + delta).clamp(min, max);
    if moved != value {
        moved
    } else {
        (value - delta).clamp(min, max)
    }
}

fn mutate_leaf<R: Rng + ?Sized>(kind: &GeneKind, rng: &mut R, cfg: &GeneMutationConfig) -> GeneKind {
    let resample = rng.gen_bool(cfg.resample_prob);
    match kind {
        GeneKind::Integer { value, min, max } => {
            let next = if resample {
                rng.gen_range(*min..=*max)
            } else {
                let d = step(rng, cfg.max_int_delta);
                nudge(i128::from(*value), i128::from(d), i128::from(*min), i128::from(*max)) as i32
            };
            GeneKind::Integer { value: next, min: *min, max: *max }
        }
        GeneKind::Long { value, min, max } => {
            let next = if resample {
                rng.gen_range(*min..=*max)
            } else {
                let d = step(rng, cfg.max_int_delta);
                nudge(i128::from(*value), i128::from(d), i128::from(*min), i128::from(*max)) as i64
            };
            GeneKind::Long { value: next, min: *min, max: *max }
        }
        GeneKind::Float { value, min, max } => {
            let next = if resample {
                rng.gen_range(*min..*max)
            } else {
                let scale = f64::from(value.abs()).max(1.0) * 0.1;
                nudge_real(
                    f64::from(*value),
                    rng.gen_range(-scale..scale),
                    f64::from(*min),
                    f64::from(*max),
                ) as f32
            };
            GeneKind::Float { value: next, min: *min, max: *max }
        }
        GeneKind::Double { value, min, max } => {
            let next = if resample {
                rng.gen_range(*min..*max)
            } else {
                let scale = value.abs().max(1.0) * 0.1;
                nudge_real(*value, rng.gen_range(-scale..scale), *min, *max)
            };
            GeneKind::Double { value: next, min: *min, max: *max }
        }
        GeneKind::Boolean(b) => GeneKind::Boolean(!b),
        GeneKind::String { value, min_len, max_len } => GeneKind::String {
            value: mutate_string(value, *min_len, *max_len, resample, rng),
            min_len: *min_len,
            max_len: *max_len,
        },
        GeneKind::Enum { values, index } => {
            let len = values.len().max(1);
            let shift = if len > 1 { rng.gen_range(1..len) } else { 0 };
            GeneKind::Enum {
                values: values.clone(),
                index: (index + shift) % len,
            }
        }
        GeneKind::Date(d) => {
            let days = step(rng, (cfg.max_time_shift_secs / 86_400).max(1));
            GeneKind::Date(d.checked_add_signed(Duration::days(days)).unwrap_or(*d))
        }
        GeneKind::Time(t) => {
            let secs = step(rng, cfg.max_time_shift_secs.min(86_399));
            GeneKind::Time(*t + Duration::seconds(secs))
        }
        GeneKind::DateTime(dt) => {
            let secs = step(rng, cfg.max_time_shift_secs);
            GeneKind::DateTime(dt.checked_add_signed(Duration::seconds(secs)).unwrap_or(*dt))
        }
        other => other.clone(),
    }
}

fn mutate_string<R: Rng + ?Sized>(
    value: &str,
    min_len: usize,
    max_len: usize,
    resample: bool,
    rng: &mut R,
) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    let mut ops = Vec::with_capacity(3);
    if len < max_len {
        ops.push(0);
    }
    if len > min_len {
        ops.push(1);
    }
    if len > 0 {
        ops.push(2);
    }
    if resample || ops.is_empty() {
        let n = rng.gen_range(min_len..=max_len);
        let fresh = random_text(rng, n);
        if fresh != value {
            return fresh;
        }
    }
    if ops.is_empty() {
        return value.to_string();
    }
    let letter = random_text(rng, 1).chars().next().unwrap_or('a');
    match ops[rng.gen_range(0..ops.len())] {
        0 => chars.insert(rng.gen_range(0..=len), letter),
        1 => {
            chars.remove(rng.gen_range(0..len));
        }
        _ => {
            let i = rng.gen_range(0..len);
            chars[i] = if chars[i] == letter { char::from(b'a' + ((letter as u8) % 26)) } else { letter };
        }
    }
    chars.into_iter().collect()
}
