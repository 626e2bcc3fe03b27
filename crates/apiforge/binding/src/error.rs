//! Error types for binding resolution.

use apiforge_action::ActionError;
use apiforge_gene::GeneError;
use thiserror::Error;

/// Errors raised by the binding resolver.
///
/// Unmatched fields and missing DB actions are not errors; they are logged
/// and the link is omitted.
#[derive(Debug, Error, PartialEq)]
pub enum BindingError {
    /// A DB directive names a table the schema does not know.
    #[error("binding directive refers to unknown table '{0}'")]
    UnknownTable(String),

    /// Rejected binding configuration.
    #[error("invalid binding config: {0}")]
    InvalidConfig(String),

    #[error("action error: {0}")]
    Action(#[from] ActionError),

    #[error("gene error: {0}")]
    Gene(#[from] GeneError),
}

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;
