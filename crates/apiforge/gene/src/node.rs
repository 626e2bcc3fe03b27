//! Gene nodes: the closed set of gene variants stored in a [`GeneTree`](crate::GeneTree).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ── Identifiers ─────────────────────────────────────────────────────

/// Index of a node inside its owning tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Gene Kind ───────────────────────────────────────────────────────

/// The value carried by a node.
///
/// Composite variants refer to their children by [`NodeId`]; the children
/// live in the same arena and are owned exclusively by this node.
/// Collection templates are owned too, but are not part of the value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeneKind {
    Integer { value: i32, min: i32, max: i32 },
    Long { value: i64, min: i64, max: i64 },
    Float { value: f32, min: f32, max: f32 },
    Double { value: f64, min: f64, max: f64 },
    Boolean(bool),
    String {
        value: String,
        min_len: usize,
        max_len: usize,
    },
    Enum { values: Vec<String>, index: usize },
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Base64 view over a string leaf child.
    Base64 { data: NodeId },

    SqlPrimaryKey {
        table: String,
        gene: NodeId,
        unique_id: u64,
    },
    /// Value is assigned by repairing the owning individual, never by mutation.
    SqlForeignKey {
        target_table: String,
        value: Option<i64>,
        nullable: bool,
    },
    SqlAutoIncrement,
    /// Data that already exists in the SUT and must not be altered.
    ImmutableData { value: String },

    Object {
        fields: Vec<NodeId>,
        ref_type: Option<String>,
    },
    Array {
        template: NodeId,
        elements: Vec<NodeId>,
        max_size: usize,
    },
    Optional { gene: NodeId, active: bool },
    /// Entries are keyed by their node name.
    Map {
        template: NodeId,
        entries: Vec<NodeId>,
        max_size: usize,
    },

    /// Stands in for a field that would re-enter an ancestor object type.
    CyclePlaceholder,
    /// Stands in for a subtree cut off by a depth limit.
    LimitPlaceholder,
}

/// Discriminant of [`GeneKind`], used for variant comparisons and binding priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeneVariant {
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    String,
    Enum,
    Date,
    Time,
    DateTime,
    Base64,
    SqlPrimaryKey,
    SqlForeignKey,
    SqlAutoIncrement,
    ImmutableData,
    Object,
    Array,
    Optional,
    Map,
    CyclePlaceholder,
    LimitPlaceholder,
}

impl std::fmt::Display for GeneVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl GeneVariant {
    pub fn is_placeholder(self) -> bool {
        matches!(self, Self::CyclePlaceholder | Self::LimitPlaceholder)
    }

    pub fn is_sql_key(self) -> bool {
        matches!(
            self,
            Self::SqlPrimaryKey | Self::SqlForeignKey | Self::SqlAutoIncrement
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::DateTime)
    }
}

impl GeneKind {
    pub fn variant(&self) -> GeneVariant {
        match self {
            Self::Integer { .. } => GeneVariant::Integer,
            Self::Long { .. } => GeneVariant::Long,
            Self::Float { .. } => GeneVariant::Float,
            Self::Double { .. } => GeneVariant::Double,
            Self::Boolean(_) => GeneVariant::Boolean,
            Self::String { .. } => GeneVariant::String,
            Self::Enum { .. } => GeneVariant::Enum,
            Self::Date(_) => GeneVariant::Date,
            Self::Time(_) => GeneVariant::Time,
            Self::DateTime(_) => GeneVariant::DateTime,
            Self::Base64 { .. } => GeneVariant::Base64,
            Self::SqlPrimaryKey { .. } => GeneVariant::SqlPrimaryKey,
            Self::SqlForeignKey { .. } => GeneVariant::SqlForeignKey,
            Self::SqlAutoIncrement => GeneVariant::SqlAutoIncrement,
            Self::ImmutableData { .. } => GeneVariant::ImmutableData,
            Self::Object { .. } => GeneVariant::Object,
            Self::Array { .. } => GeneVariant::Array,
            Self::Optional { .. } => GeneVariant::Optional,
            Self::Map { .. } => GeneVariant::Map,
            Self::CyclePlaceholder => GeneVariant::CyclePlaceholder,
            Self::LimitPlaceholder => GeneVariant::LimitPlaceholder,
        }
    }

    /// Children that make up the value, in order.
    pub fn value_children(&self) -> Vec<NodeId> {
        match self {
            Self::Base64 { data } => vec![*data],
            Self::SqlPrimaryKey { gene, .. } => vec![*gene],
            Self::Object { fields, .. } => fields.clone(),
            Self::Array { elements, .. } => elements.clone(),
            Self::Optional { gene, .. } => vec![*gene],
            Self::Map { entries, .. } => entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Every child owned by this node, templates included.
    pub fn owned_children(&self) -> Vec<NodeId> {
        match self {
            Self::Array {
                template, elements, ..
            } => std::iter::once(*template).chain(elements.iter().copied()).collect(),
            Self::Map {
                template, entries, ..
            } => std::iter::once(*template).chain(entries.iter().copied()).collect(),
            other => other.value_children(),
        }
    }

    /// Rewrite every owned child id through `f`.
    pub(crate) fn remap_children(&mut self, f: impl Fn(NodeId) -> NodeId) {
        match self {
            Self::Base64 { data } => *data = f(*data),
            Self::SqlPrimaryKey { gene, .. } => *gene = f(*gene),
            Self::Object { fields, .. } => fields.iter_mut().for_each(|c| *c = f(*c)),
            Self::Array {
                template, elements, ..
            } => {
                *template = f(*template);
                elements.iter_mut().for_each(|c| *c = f(*c));
            }
            Self::Optional { gene, .. } => *gene = f(*gene),
            Self::Map {
                template, entries, ..
            } => {
                *template = f(*template);
                entries.iter_mut().for_each(|c| *c = f(*c));
            }
            _ => {}
        }
    }
}

// ── Gene Node ───────────────────────────────────────────────────────

/// One arena slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneNode {
    /// Field or parameter name.
    pub name: String,
    /// Variant and value.
    pub kind: GeneKind,
    /// Non-owning back-reference, only used for contextual queries.
    pub(crate) parent: Option<NodeId>,
}

impl GeneNode {
    pub fn new(name: impl Into<String>, kind: GeneKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn variant(&self) -> GeneVariant {
        self.kind.variant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_children_include_template() {
        let kind = GeneKind::Array {
            template: NodeId(1),
            elements: vec![NodeId(2), NodeId(3)],
            max_size: 4,
        };
        assert_eq!(kind.value_children(), vec![NodeId(2), NodeId(3)]);
        assert_eq!(kind.owned_children(), vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn remap_shifts_all_children() {
        let mut kind = GeneKind::Map {
            template: NodeId(1),
            entries: vec![NodeId(2)],
            max_size: 2,
        };
        kind.remap_children(|c| NodeId(c.0 + 10));
        assert_eq!(kind.owned_children(), vec![NodeId(11), NodeId(12)]);
    }

    #[test]
    fn variant_classification() {
        assert!(GeneVariant::CyclePlaceholder.is_placeholder());
        assert!(GeneVariant::SqlForeignKey.is_sql_key());
        assert!(GeneVariant::DateTime.is_temporal());
        assert!(!GeneVariant::String.is_temporal());
    }
}
