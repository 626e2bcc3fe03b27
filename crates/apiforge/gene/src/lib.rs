//! Gene Graph: typed, recursive value model for generated API test data.
//!
//! A gene tree describes one piece of request or database data: a scalar, an
//! object of named fields, a bounded collection, an optional wrapper, an SQL
//! key, or a placeholder standing in for a subtree that was cut off.
//!
//! # Representation
//!
//! Nodes live in an arena ([`GeneTree`]) and are addressed by [`NodeId`].
//! Composite nodes own their children by index; `parent` is a plain back
//! index used for field paths only. Recursive schemas never produce live
//! cycles: re-entry of an ancestor type is materialised as a
//! [`GeneKind::CyclePlaceholder`].
//!
//! # Operations
//!
//! - randomize, deep copy, value copy, value comparison
//! - printable / JSON rendering
//! - cross-variant value binding
//! - flattened depth-first views
//! - elementary mutation steered by a [`MutationGuide`]

#![deny(unsafe_code)]

pub mod error;
pub mod flat;
pub mod mutation;
pub mod node;
pub mod randomize;
pub mod schema;
pub mod tree;
pub mod value;

// ── Re-exports ──────────────────────────────────────────────────────

pub use error::{GeneError, GeneResult};
pub use flat::FlatView;
pub use mutation::{pick_weighted, GeneMutationConfig, MutationGuide, Uniform};
pub use node::{GeneKind, GeneNode, GeneVariant, NodeId};
pub use schema::{FieldSchema, FieldType, ObjectSchema, SchemaRegistry};
pub use tree::GeneTree;
