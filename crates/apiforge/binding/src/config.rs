//! Binding configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BindingError, BindingResult};

/// Tunables for binding resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Minimum similarity for two field names to count as a match.
    pub similarity_threshold: f64,
    /// Chance that an inactive optional field still takes part in
    /// object-to-object matching.
    pub inactive_optional_bind_prob: f64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            inactive_optional_bind_prob: 0.5,
        }
    }
}

impl BindingConfig {
    pub fn with_similarity_threshold(mut self, t: f64) -> Self {
        self.similarity_threshold = t;
        self
    }

    pub fn with_inactive_optional_bind_prob(mut self, p: f64) -> Self {
        self.inactive_optional_bind_prob = p;
        self
    }

    pub fn validate(&self) -> BindingResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(BindingError::InvalidConfig(format!(
                "similarity_threshold must be in [0,1], got {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.inactive_optional_bind_prob) {
            return Err(BindingError::InvalidConfig(format!(
                "inactive_optional_bind_prob must be in [0,1], got {}",
                self.inactive_optional_bind_prob
            )));
        }
        Ok(())
    }
}
