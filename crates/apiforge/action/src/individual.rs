//! Individuals: a candidate test case.
//!
//! An individual is a list of initializing actions (DB rows, external
//! stubs) followed by the main actions, plus the binding links that keep
//! related genes equal.

use std::collections::BTreeMap;

use apiforge_gene::{GeneKind, GeneTree, GeneVariant, NodeId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::{Action, ActionId};
use crate::error::{ActionError, ActionResult};
use crate::link::{BindingLink, BindingOrigin, GeneAddr};

// ── Tracking ────────────────────────────────────────────────────────

/// How an individual was first produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    Random,
    Smart,
    Seeded,
}

/// Lineage of an individual across mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub id: Uuid,
    pub lineage: Uuid,
    pub parent: Option<Uuid>,
    pub operators: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Tracking {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            lineage: id,
            parent: None,
            operators: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Record that a copy of this individual was changed by `operator`.
    pub fn evolve(&mut self, operator: impl Into<String>) {
        self.parent = Some(self.id);
        self.id = Uuid::new_v4();
        self.operators.push(operator.into());
        self.created_at = Utc::now();
    }
}

impl Default for Tracking {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of an action inside an individual.
///
/// Initializing actions order before main actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionPos {
    Init(usize),
    Main(usize),
}

// ── Individual ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    init_actions: Vec<Action>,
    main_actions: Vec<Action>,
    links: Vec<BindingLink>,
    tracking: Tracking,
    sample_type: SampleType,
    structure_mutable: bool,
    db_removed_by_repair: bool,
    next_action_id: u64,
}

impl Individual {
    pub fn new(sample_type: SampleType) -> Self {
        Self {
            init_actions: Vec::new(),
            main_actions: Vec::new(),
            links: Vec::new(),
            tracking: Tracking::new(),
            sample_type,
            structure_mutable: true,
            db_removed_by_repair: false,
            next_action_id: 1,
        }
    }

    pub fn with_structure_mutable(mut self, on: bool) -> Self {
        self.structure_mutable = on;
        self
    }

    fn assign_id(&mut self, action: &mut Action) -> ActionId {
        let id = ActionId(self.next_action_id);
        self.next_action_id += 1;
        action.set_id(id);
        id
    }

    pub fn add_init_action(&mut self, mut action: Action) -> ActionId {
        let id = self.assign_id(&mut action);
        self.init_actions.push(action);
        id
    }

    pub fn add_main_action(&mut self, mut action: Action) -> ActionId {
        let id = self.assign_id(&mut action);
        self.main_actions.push(action);
        id
    }

    pub fn insert_main_action(&mut self, index: usize, mut action: Action) -> ActionId {
        let id = self.assign_id(&mut action);
        let index = index.min(self.main_actions.len());
        self.main_actions.insert(index, action);
        self.drop_invalid_links();
        id
    }

    /// Remove a main action and every link touching it.
    pub fn remove_main_action(&mut self, index: usize) -> Option<Action> {
        if index >= self.main_actions.len() {
            return None;
        }
        let removed = self.main_actions.remove(index);
        self.remove_links_of(removed.id());
        Some(removed)
    }

    /// Swap two main actions; links whose order no longer holds are dropped.
    pub fn swap_main_actions(&mut self, a: usize, b: usize) -> ActionResult<()> {
        let len = self.main_actions.len();
        if a >= len || b >= len {
            return Err(ActionError::InvariantViolation(format!(
                "swap of {a} and {b} out of range for {len} main actions"
            )));
        }
        self.main_actions.swap(a, b);
        self.drop_invalid_links();
        Ok(())
    }

    pub fn init_actions(&self) -> &[Action] {
        &self.init_actions
    }

    pub fn main_actions(&self) -> &[Action] {
        &self.main_actions
    }

    pub fn main_action_mut(&mut self, index: usize) -> Option<&mut Action> {
        self.main_actions.get_mut(index)
    }

    /// Initializing actions followed by main actions.
    pub fn all_actions(&self) -> impl Iterator<Item = &Action> {
        self.init_actions.iter().chain(self.main_actions.iter())
    }

    /// Number of main actions.
    pub fn size(&self) -> usize {
        self.main_actions.len()
    }

    pub fn tracking(&self) -> &Tracking {
        &self.tracking
    }

    pub fn tracking_mut(&mut self) -> &mut Tracking {
        &mut self.tracking
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn is_structure_mutable(&self) -> bool {
        self.structure_mutable
    }

    /// Whether a repair pass removed initializing DB actions.
    pub fn db_removed_by_repair(&self) -> bool {
        self.db_removed_by_repair
    }

    pub fn position(&self, id: ActionId) -> Option<ActionPos> {
        if let Some(i) = self.init_actions.iter().position(|a| a.id() == id) {
            return Some(ActionPos::Init(i));
        }
        self.main_actions
            .iter()
            .position(|a| a.id() == id)
            .map(ActionPos::Main)
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.all_actions().find(|a| a.id() == id)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut Action> {
        self.init_actions
            .iter_mut()
            .chain(self.main_actions.iter_mut())
            .find(|a| a.id() == id)
    }

    /// Gene tree of one parameter.
    pub fn gene(&self, action: ActionId, param: usize) -> ActionResult<&GeneTree> {
        let a = self.action(action).ok_or(ActionError::UnknownAction(action))?;
        a.param(param)
            .map(|p| &p.gene)
            .ok_or(ActionError::UnknownParameter { action, index: param })
    }

    pub fn gene_mut(&mut self, action: ActionId, param: usize) -> ActionResult<&mut GeneTree> {
        let a = self.action_mut(action).ok_or(ActionError::UnknownAction(action))?;
        a.param_mut(param)
            .map(|p| &mut p.gene)
            .ok_or(ActionError::UnknownParameter { action, index: param })
    }

    /// Randomize every gene of every action.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ActionResult<()> {
        for a in self.init_actions.iter_mut().chain(self.main_actions.iter_mut()) {
            a.randomize(rng)?;
        }
        Ok(())
    }
}

// ── Binding Links ───────────────────────────────────────────────────

impl Individual {
    pub fn links(&self) -> &[BindingLink] {
        &self.links
    }

    /// Links where `action` is source or target.
    pub fn links_of(&self, action: ActionId) -> impl Iterator<Item = &BindingLink> {
        self.links.iter().filter(move |l| l.involves(action))
    }

    pub fn remove_links_of(&mut self, action: ActionId) {
        self.links.retain(|l| !l.involves(action));
    }

    pub fn clear_links(&mut self) {
        self.links.clear();
    }

    fn check_addr(&self, addr: GeneAddr) -> ActionResult<()> {
        let tree = self.gene(addr.action, addr.param)?;
        tree.node(addr.node)?;
        Ok(())
    }

    /// Whether `link` respects the ordering rules.
    ///
    /// A parameter link may only take its value from the same action, an
    /// earlier main action or an initializing action. A database link pairs
    /// an initializing row with a main action in either direction, since the
    /// values are aligned before anything runs.
    fn link_order_holds(&self, link: &BindingLink) -> bool {
        let (Some(src), Some(dst)) = (self.position(link.source.action), self.position(link.target.action)) else {
            return false;
        };
        match link.origin {
            BindingOrigin::Params => src <= dst,
            BindingOrigin::Database => !matches!((src, dst), (ActionPos::Main(_), ActionPos::Main(_))),
        }
    }

    /// Register a link. Returns `Ok(false)` if it is rejected.
    pub fn register_link(&mut self, link: BindingLink) -> ActionResult<bool> {
        self.check_addr(link.source)?;
        self.check_addr(link.target)?;
        if link.source == link.target || self.links.contains(&link) {
            return Ok(false);
        }
        if !self.link_order_holds(&link) {
            warn!(link = %link, "rejected binding link violating action order");
            return Ok(false);
        }
        self.links.push(link);
        Ok(true)
    }

    fn drop_invalid_links(&mut self) {
        let before = self.links.len();
        let links = std::mem::take(&mut self.links);
        self.links = links
            .into_iter()
            .filter(|l| self.link_order_holds(l))
            .collect();
        if self.links.len() != before {
            debug!(dropped = before - self.links.len(), "binding links dropped after reorder");
        }
    }

    /// Copy values along every link, in registration order.
    ///
    /// Returns how many links were applied. Links whose genes disappeared are
    /// skipped with a warning.
    pub fn sync_bindings(&mut self) -> ActionResult<usize> {
        let mut applied = 0;
        for link in self.links.clone() {
            let source = match self.gene(link.source.action, link.source.param) {
                Ok(tree) => match tree.copy_subtree(link.source.node) {
                    Ok(copy) => copy,
                    Err(e) => {
                        warn!(link = %link, error = %e, "binding source missing");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(link = %link, error = %e, "binding source missing");
                    continue;
                }
            };
            let target = self.gene_mut(link.target.action, link.target.param)?;
            if !target.contains(link.target.node) {
                warn!(link = %link, "binding target missing");
                continue;
            }
            if target.bind_value_from(link.target.node, &source, source.root())? {
                applied += 1;
            }
        }
        Ok(applied)
    }
}

// ── Initialization Repair ───────────────────────────────────────────

/// Foreign-key genes of one action: `(param, node, target table, value, nullable)`.
fn foreign_keys(action: &Action) -> Vec<(usize, NodeId, String, Option<i64>, bool)> {
    let mut out = Vec::new();
    for (i, p) in action.params().iter().enumerate() {
        for (id, node) in p.gene.flat_view_all(p.gene.root()) {
            if let GeneKind::SqlForeignKey {
                target_table,
                value,
                nullable,
            } = &node.kind
            {
                out.push((i, id, target_table.clone(), *value, *nullable));
            }
        }
    }
    out
}

/// Integer primary-key values of one action.
fn primary_keys(action: &Action) -> Vec<i64> {
    let mut out = Vec::new();
    for p in action.params() {
        for (id, node) in p.gene.flat_view_all(p.gene.root()) {
            if node.variant() == GeneVariant::SqlPrimaryKey {
                if let Ok(v) = p.gene.printable(id) {
                    if let Ok(n) = v.parse::<i64>() {
                        out.push(n);
                    }
                }
            }
        }
    }
    out
}

impl Individual {
    /// Primary keys available to the initializing action at `index`, by table.
    fn keys_before(&self, index: usize) -> BTreeMap<String, Vec<i64>> {
        let mut keys: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for a in &self.init_actions[..index] {
            if let Some(table) = a.table() {
                keys.entry(table.to_string()).or_default().extend(primary_keys(a));
            }
        }
        keys
    }

    /// Whether every foreign key of the initializing actions points at a
    /// primary key inserted earlier (or is null where allowed).
    pub fn verify_initialization_actions(&self) -> bool {
        for (i, action) in self.init_actions.iter().enumerate() {
            let keys = self.keys_before(i);
            for (_, _, table, value, nullable) in foreign_keys(action) {
                let ok = match value {
                    Some(v) => keys.get(&table).is_some_and(|ks| ks.contains(&v)),
                    None => nullable,
                };
                if !ok {
                    return false;
                }
            }
        }
        true
    }

    /// Point dangling foreign keys at earlier primary keys, null them where
    /// allowed, or drop the initializing action otherwise.
    ///
    /// Returns whether anything changed.
    pub fn repair_initialization_actions<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ActionResult<bool> {
        let mut changed = false;
        let mut i = 0;
        while i < self.init_actions.len() {
            let keys = self.keys_before(i);
            let mut remove = false;
            for (param, node, table, value, nullable) in foreign_keys(&self.init_actions[i]) {
                let candidates = keys.get(&table).cloned().unwrap_or_default();
                if value.is_some_and(|v| candidates.contains(&v)) || (value.is_none() && nullable) {
                    continue;
                }
                let fixed = if !candidates.is_empty() {
                    Some(candidates[rng.gen_range(0..candidates.len())])
                } else if nullable {
                    None
                } else {
                    remove = true;
                    break;
                };
                let action_id = self.init_actions[i].id();
                let tree = &mut self.init_actions[i]
                    .param_mut(param)
                    .ok_or(ActionError::UnknownParameter {
                        action: action_id,
                        index: param,
                    })?
                    .gene;
                tree.replace_leaf(
                    node,
                    GeneKind::SqlForeignKey {
                        target_table: table,
                        value: fixed,
                        nullable,
                    },
                )?;
                changed = true;
            }
            if remove {
                let removed = self.init_actions.remove(i);
                debug!(table = removed.table().unwrap_or_default(), "initializing action removed by repair");
                self.remove_links_of(removed.id());
                self.db_removed_by_repair = true;
                changed = true;
                continue;
            }
            i += 1;
        }
        Ok(changed)
    }
}
