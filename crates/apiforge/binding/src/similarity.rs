//! Field-name similarity.

use strsim::normalized_levenshtein;

/// Similarity score in `[0, 1]` between two names.
pub trait StringSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Case-insensitive normalized Levenshtein similarity.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizedLevenshtein;

impl StringSimilarity for NormalizedLevenshtein {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
    }
}
