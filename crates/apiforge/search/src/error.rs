//! Error types for the search layer.

use std::time::Duration;

use apiforge_action::ActionError;
use apiforge_binding::BindingError;
use apiforge_gene::GeneError;
use thiserror::Error;

/// Rejected configuration, raised at construction time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be in [0,1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("action catalog is empty")]
    EmptyCatalog,

    #[error("max_test_size must be >= 1")]
    InvalidTestSize,

    /// A seed skeleton names an action the catalog does not have.
    #[error("seed '{seed}' refers to unknown action '{action}'")]
    UnknownSeedAction { seed: String, action: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot parse configuration: {0}")]
    Parse(String),
}

/// Whole-individual evaluation failure. Never fatal to the search.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by the search layer.
#[derive(Debug, Error, PartialEq)]
pub enum SearchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("action error: {0}")]
    Action(#[from] ActionError),

    #[error("gene error: {0}")]
    Gene(#[from] GeneError),
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

pub(crate) fn check_prob(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}
