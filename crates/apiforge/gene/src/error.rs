//! Error types for the gene graph.

use thiserror::Error;

use crate::node::{GeneVariant, NodeId};

/// Errors raised by gene graph operations.
///
/// All of these indicate a broken invariant or a malformed caller request,
/// never a transient condition.
#[derive(Debug, Error, PartialEq)]
pub enum GeneError {
    /// Two genes were expected to share a variant but do not.
    #[error("invalid gene type: expected {expected}, found {found}")]
    InvalidGeneType {
        expected: GeneVariant,
        found: GeneVariant,
    },

    /// Composite genes with the same variant but a different shape.
    #[error("incompatible gene structure at '{0}'")]
    IncompatibleStructure(String),

    /// A value outside the target gene's legal domain.
    #[error("value out of bounds for gene '{0}'")]
    OutOfBounds(String),

    /// Attempted to mutate a gene that cannot change.
    #[error("gene '{0}' is immutable")]
    ImmutableGene(String),

    /// Asked for the value of a gene that has none.
    #[error("gene '{0}' has no printable value")]
    NotPrintable(String),

    /// A node index that does not belong to the tree.
    #[error("unknown gene node: {0}")]
    UnknownNode(NodeId),

    /// Object schema missing from the registry.
    #[error("unknown object schema: {0}")]
    UnknownSchema(String),

    /// A collection would exceed its bound.
    #[error("collection '{name}' bound exceeded: {len} > {max_size}")]
    SizeBoundExceeded {
        name: String,
        len: usize,
        max_size: usize,
    },

    /// Rejected mutation configuration.
    #[error("invalid gene mutation config: {0}")]
    InvalidConfig(String),
}

/// Result type for gene graph operations.
pub type GeneResult<T> = Result<T, GeneError>;
