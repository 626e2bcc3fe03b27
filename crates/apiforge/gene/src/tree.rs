//! Arena-backed gene tree.
//!
//! A [`GeneTree`] owns every node of one gene graph. Composite nodes refer to
//! children by index; a child has exactly one owner and only a non-owning
//! `parent` index back. Cloning the tree is a full deep copy.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{GeneError, GeneResult};
use crate::flat::FlatView;
use crate::node::{GeneKind, GeneNode, GeneVariant, NodeId};

/// Default bound for float/double genes built without explicit limits.
pub const DEFAULT_FLOAT_BOUND: f64 = 1_000_000.0;
/// Default maximum length for string genes built without explicit limits.
pub const DEFAULT_STRING_MAX_LEN: usize = 16;

/// One gene graph stored as an arena of nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneTree {
    nodes: Vec<Option<GeneNode>>,
    free: Vec<NodeId>,
    root: NodeId,
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// ── Construction ────────────────────────────────────────────────────

impl GeneTree {
    fn leaf(name: impl Into<String>, kind: GeneKind) -> Self {
        Self {
            nodes: vec![Some(GeneNode::new(name, kind))],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Build a composite root whose kind is derived from its grafted children.
    fn composite(
        name: impl Into<String>,
        children: Vec<GeneTree>,
        make: impl FnOnce(Vec<NodeId>) -> GeneKind,
    ) -> Self {
        let mut tree = Self::leaf(name, GeneKind::LimitPlaceholder);
        let root = tree.root;
        let ids = children
            .into_iter()
            .map(|c| tree.graft(c, Some(root)))
            .collect();
        if let Some(node) = tree.nodes[root.index()].as_mut() {
            node.kind = make(ids);
        }
        tree
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::integer_in(name, i32::MIN, i32::MAX)
    }

    pub fn integer_in(name: impl Into<String>, min: i32, max: i32) -> Self {
        let (min, max) = ordered(min, max);
        Self::leaf(
            name,
            GeneKind::Integer {
                value: 0.clamp(min, max),
                min,
                max,
            },
        )
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::long_in(name, i64::MIN, i64::MAX)
    }

    pub fn long_in(name: impl Into<String>, min: i64, max: i64) -> Self {
        let (min, max) = ordered(min, max);
        Self::leaf(
            name,
            GeneKind::Long {
                value: 0.clamp(min, max),
                min,
                max,
            },
        )
    }

    pub fn float(name: impl Into<String>) -> Self {
        let bound = DEFAULT_FLOAT_BOUND as f32;
        Self::float_in(name, -bound, bound)
    }

    pub fn float_in(name: impl Into<String>, min: f32, max: f32) -> Self {
        let (min, max) = ordered(min, max);
        Self::leaf(
            name,
            GeneKind::Float {
                value: 0.0f32.clamp(min, max),
                min,
                max,
            },
        )
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::double_in(name, -DEFAULT_FLOAT_BOUND, DEFAULT_FLOAT_BOUND)
    }

    pub fn double_in(name: impl Into<String>, min: f64, max: f64) -> Self {
        let (min, max) = ordered(min, max);
        Self::leaf(
            name,
            GeneKind::Double {
                value: 0.0f64.clamp(min, max),
                min,
                max,
            },
        )
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::Boolean(false))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::string_in(name, 0, DEFAULT_STRING_MAX_LEN)
    }

    pub fn string_in(name: impl Into<String>, min_len: usize, max_len: usize) -> Self {
        let (min_len, max_len) = ordered(min_len, max_len);
        Self::leaf(
            name,
            GeneKind::String {
                value: "a".repeat(min_len),
                min_len,
                max_len,
            },
        )
    }

    /// String gene holding `value`, with bounds wide enough to contain it.
    pub fn string_with(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let max_len = value.chars().count().max(DEFAULT_STRING_MAX_LEN);
        Self::leaf(
            name,
            GeneKind::String {
                value,
                min_len: 0,
                max_len,
            },
        )
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::leaf(
            name,
            GeneKind::Enum {
                values: values.into_iter().map(Into::into).collect(),
                index: 0,
            },
        )
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::Date(NaiveDate::default()))
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::Time(NaiveTime::default()))
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::DateTime(NaiveDateTime::default()))
    }

    pub fn base64(name: impl Into<String>) -> Self {
        Self::composite(name, vec![Self::string("data")], |ids| GeneKind::Base64 {
            data: ids[0],
        })
    }

    pub fn object(name: impl Into<String>, fields: Vec<GeneTree>) -> Self {
        Self::composite(name, fields, |fields| GeneKind::Object {
            fields,
            ref_type: None,
        })
    }

    /// Object gene tagged with the schema type it was built from.
    pub fn object_of(
        name: impl Into<String>,
        ref_type: impl Into<String>,
        fields: Vec<GeneTree>,
    ) -> Self {
        let ref_type = ref_type.into();
        Self::composite(name, fields, move |fields| GeneKind::Object {
            fields,
            ref_type: Some(ref_type),
        })
    }

    /// Empty array whose elements are copies of `template`.
    pub fn array(name: impl Into<String>, template: GeneTree, max_size: usize) -> Self {
        Self::composite(name, vec![template], move |ids| GeneKind::Array {
            template: ids[0],
            elements: Vec::new(),
            max_size,
        })
    }

    pub fn optional(name: impl Into<String>, inner: GeneTree, active: bool) -> Self {
        Self::composite(name, vec![inner], move |ids| GeneKind::Optional {
            gene: ids[0],
            active,
        })
    }

    /// Empty string-keyed map whose values are copies of `template`.
    pub fn map(name: impl Into<String>, template: GeneTree, max_size: usize) -> Self {
        Self::composite(name, vec![template], move |ids| GeneKind::Map {
            template: ids[0],
            entries: Vec::new(),
            max_size,
        })
    }

    pub fn primary_key(
        name: impl Into<String>,
        table: impl Into<String>,
        inner: GeneTree,
        unique_id: u64,
    ) -> Self {
        let table = table.into();
        Self::composite(name, vec![inner], move |ids| GeneKind::SqlPrimaryKey {
            table,
            gene: ids[0],
            unique_id,
        })
    }

    pub fn foreign_key(
        name: impl Into<String>,
        target_table: impl Into<String>,
        nullable: bool,
    ) -> Self {
        Self::leaf(
            name,
            GeneKind::SqlForeignKey {
                target_table: target_table.into(),
                value: None,
                nullable,
            },
        )
    }

    pub fn auto_increment(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::SqlAutoIncrement)
    }

    pub fn immutable(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(
            name,
            GeneKind::ImmutableData {
                value: value.into(),
            },
        )
    }

    pub fn cycle_placeholder(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::CyclePlaceholder)
    }

    pub fn limit_placeholder(name: impl Into<String>) -> Self {
        Self::leaf(name, GeneKind::LimitPlaceholder)
    }
}

// ── Arena Access ────────────────────────────────────────────────────

impl GeneTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    /// Number of live nodes, templates included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> GeneResult<&GeneNode> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(GeneError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> GeneResult<&mut GeneNode> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GeneError::UnknownNode(id))
    }

    pub fn kind(&self, id: NodeId) -> GeneResult<&GeneKind> {
        Ok(&self.node(id)?.kind)
    }

    pub fn variant(&self, id: NodeId) -> GeneResult<GeneVariant> {
        Ok(self.node(id)?.variant())
    }

    pub fn name(&self, id: NodeId) -> GeneResult<&str> {
        Ok(&self.node(id)?.name)
    }

    /// Children that make up the value of `id`.
    pub fn children(&self, id: NodeId) -> GeneResult<Vec<NodeId>> {
        Ok(self.kind(id)?.value_children())
    }

    /// Field of an object gene by exact name.
    pub fn field(&self, object: NodeId, name: &str) -> GeneResult<Option<NodeId>> {
        match self.kind(object)? {
            GeneKind::Object { fields, .. } => {
                for f in fields {
                    if self.name(*f)? == name {
                        return Ok(Some(*f));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Unwrap optional and primary-key wrappers down to the gene holding the value.
    pub fn value_node(&self, id: NodeId) -> GeneResult<NodeId> {
        let mut current = id;
        loop {
            match self.kind(current)? {
                GeneKind::Optional { gene, .. } | GeneKind::SqlPrimaryKey { gene, .. } => {
                    current = *gene
                }
                _ => return Ok(current),
            }
        }
    }

    /// Replace the value of a leaf with another value of the same variant.
    pub fn replace_leaf(&mut self, id: NodeId, kind: GeneKind) -> GeneResult<()> {
        let node = self.node_mut(id)?;
        let current = node.variant();
        if current != kind.variant() {
            return Err(GeneError::InvalidGeneType {
                expected: current,
                found: kind.variant(),
            });
        }
        if !node.kind.owned_children().is_empty() || !kind.owned_children().is_empty() {
            return Err(GeneError::IncompatibleStructure(node.name.clone()));
        }
        node.kind = kind;
        Ok(())
    }

    pub fn set_optional_active(&mut self, id: NodeId, on: bool) -> GeneResult<()> {
        let node = self.node_mut(id)?;
        match &mut node.kind {
            GeneKind::Optional { active, .. } => {
                *active = on;
                Ok(())
            }
            other => Err(GeneError::InvalidGeneType {
                expected: GeneVariant::Optional,
                found: other.variant(),
            }),
        }
    }

    pub(crate) fn set_collection(&mut self, id: NodeId, items: Vec<NodeId>) -> GeneResult<()> {
        let node = self.node_mut(id)?;
        match &mut node.kind {
            GeneKind::Array {
                elements, max_size, ..
            }
            | GeneKind::Map {
                entries: elements,
                max_size,
                ..
            } => {
                if items.len() > *max_size {
                    return Err(GeneError::SizeBoundExceeded {
                        name: node.name.clone(),
                        len: items.len(),
                        max_size: *max_size,
                    });
                }
                *elements = items;
                Ok(())
            }
            other => Err(GeneError::InvalidGeneType {
                expected: GeneVariant::Array,
                found: other.variant(),
            }),
        }
    }
}

// ── Subtree Operations ──────────────────────────────────────────────

impl GeneTree {
    fn reserve(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.nodes.push(None);
                NodeId((self.nodes.len() - 1) as u32)
            }
        }
    }

    /// Move every node of `other` into this arena under `parent`, returning the new root.
    pub fn graft(&mut self, other: GeneTree, parent: Option<NodeId>) -> NodeId {
        let mut mapping: Vec<Option<NodeId>> = vec![None; other.nodes.len()];
        for (i, slot) in other.nodes.iter().enumerate() {
            if slot.is_some() {
                mapping[i] = Some(self.reserve());
            }
        }
        let remap = |id: NodeId| mapping.get(id.index()).copied().flatten().unwrap_or(id);
        for (i, slot) in other.nodes.into_iter().enumerate() {
            if let (Some(mut node), Some(new_id)) = (slot, mapping[i]) {
                node.kind.remap_children(remap);
                node.parent = node.parent.map(remap);
                self.nodes[new_id.index()] = Some(node);
            }
        }
        let root = remap(other.root);
        if let Some(node) = self.nodes[root.index()].as_mut() {
            node.parent = parent;
        }
        root
    }

    /// Every node owned by `id` (itself included), templates included.
    fn subtree_ids(&self, id: NodeId) -> GeneResult<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.kind(current)?.owned_children());
        }
        Ok(out)
    }

    /// Independent compact tree holding a deep copy of the subtree at `id`.
    pub fn copy_subtree(&self, id: NodeId) -> GeneResult<GeneTree> {
        let ids = self.subtree_ids(id)?;
        let position = |old: NodeId| {
            ids.iter()
                .position(|x| *x == old)
                .map(|p| NodeId(p as u32))
                .unwrap_or(old)
        };
        let mut nodes = Vec::with_capacity(ids.len());
        for old in &ids {
            let mut node = self.node(*old)?.clone();
            node.kind.remap_children(position);
            node.parent = if *old == id {
                None
            } else {
                node.parent.map(position)
            };
            nodes.push(Some(node));
        }
        Ok(GeneTree {
            nodes,
            free: Vec::new(),
            root: NodeId(0),
        })
    }

    /// Copy a subtree of `src` into this arena under `parent`.
    pub fn import(&mut self, src: &GeneTree, src_id: NodeId, parent: Option<NodeId>) -> GeneResult<NodeId> {
        Ok(self.graft(src.copy_subtree(src_id)?, parent))
    }

    /// Free the subtree rooted at `id`. The caller detaches it from its parent.
    pub(crate) fn release(&mut self, id: NodeId) -> GeneResult<()> {
        for nid in self.subtree_ids(id)? {
            self.nodes[nid.index()] = None;
            self.free.push(nid);
        }
        Ok(())
    }

    /// Lazy depth-first view of `id` and its value descendants.
    ///
    /// Nodes matched by `exclude` are yielded but not descended into.
    pub fn flat_view<F>(&self, id: NodeId, exclude: F) -> FlatView<'_, F>
    where
        F: Fn(&GeneNode) -> bool,
    {
        FlatView::new(self, id, exclude)
    }

    /// `flat_view` with nothing excluded.
    pub fn flat_view_all(&self, id: NodeId) -> FlatView<'_, fn(&GeneNode) -> bool> {
        fn never(_: &GeneNode) -> bool {
            false
        }
        FlatView::new(self, id, never as fn(&GeneNode) -> bool)
    }

    /// Slash-separated path from the root, used as a stable structural identity.
    ///
    /// Wrapper internals (optional, primary key, base64) share the wrapper's
    /// segment; collection members render as `[*]` or by map key.
    pub fn field_path(&self, id: NodeId) -> GeneResult<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(nid) = current {
            let node = self.node(nid)?;
            let parent_kind = match node.parent {
                Some(p) => Some(self.kind(p)?),
                None => None,
            };
            match parent_kind {
                Some(GeneKind::Optional { .. })
                | Some(GeneKind::SqlPrimaryKey { .. })
                | Some(GeneKind::Base64 { .. }) => {}
                Some(GeneKind::Array { .. }) => segments.push("[*]".to_string()),
                _ => segments.push(node.name.clone()),
            }
            current = node.parent;
        }
        segments.reverse();
        Ok(segments.join("/"))
    }

    /// Whether a mutation operator can change the value at `id`.
    pub fn is_mutable(&self, id: NodeId) -> GeneResult<bool> {
        Ok(match self.kind(id)? {
            GeneKind::CyclePlaceholder
            | GeneKind::LimitPlaceholder
            | GeneKind::SqlAutoIncrement
            | GeneKind::SqlForeignKey { .. }
            | GeneKind::ImmutableData { .. } => false,
            GeneKind::Integer { min, max, .. } => min < max,
            GeneKind::Long { min, max, .. } => min < max,
            GeneKind::Float { min, max, .. } => min < max,
            GeneKind::Double { min, max, .. } => min < max,
            GeneKind::String { max_len, .. } => *max_len > 0,
            GeneKind::Enum { values, .. } => values.len() > 1,
            GeneKind::Array { max_size, .. } | GeneKind::Map { max_size, .. } => *max_size > 0,
            GeneKind::Object { fields, .. } => {
                for f in fields {
                    if self.is_mutable(*f)? {
                        return Ok(true);
                    }
                }
                false
            }
            GeneKind::Optional { gene, .. } | GeneKind::SqlPrimaryKey { gene, .. } => {
                self.is_mutable(*gene)?
            }
            GeneKind::Base64 { data } => self.is_mutable(*data)?,
            GeneKind::Boolean(_)
            | GeneKind::Date(_)
            | GeneKind::Time(_)
            | GeneKind::DateTime(_) => true,
        })
    }
}
