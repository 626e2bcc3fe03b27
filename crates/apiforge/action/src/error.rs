//! Error types for actions and individuals.

use apiforge_gene::GeneError;
use thiserror::Error;

use crate::action::ActionId;

/// Errors raised while building or editing individuals.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    /// An edit would break the initializing/main ordering rules.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// No action with this id in the individual.
    #[error("unknown action: {0}")]
    UnknownAction(ActionId),

    /// Parameter index out of range for the action.
    #[error("action {action} has no parameter #{index}")]
    UnknownParameter { action: ActionId, index: usize },

    /// Underlying gene graph failure.
    #[error("gene error: {0}")]
    Gene(#[from] GeneError),
}

/// Result type for action operations.
pub type ActionResult<T> = Result<T, ActionError>;
