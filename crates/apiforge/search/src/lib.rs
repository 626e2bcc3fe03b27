//! Search engine for API test generation.
//!
//! The [`SearchLoop`] alternates between sampling fresh individuals from the
//! [`ActionCatalog`] and mutating individuals drawn from the [`Archive`].
//! Candidates are scored by a [`FitnessEvaluator`]; mutation outcomes feed the
//! [`ImpactTracker`], which the adaptive [`Mutator`] strategy reads back to
//! favour genes and structural operators that changed fitness before.
//!
//! ```text
//! Sampler ──► Individual ──► FitnessEvaluator ──► Archive
//!    ▲                                              │
//!    └──────── Mutator ◄── ImpactTracker ◄──────────┘
//! ```

#![deny(unsafe_code)]

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod impact;
pub mod mutator;
pub mod sampler;

// ── Re-exports ──────────────────────────────────────────────────────

pub use archive::{Archive, ArchiveEntry, ArchiveUpdate};
pub use config::{ArchiveConfig, MutationStrategy, MutatorConfig, SamplerConfig, SearchConfig};
pub use engine::{SearchLoop, SearchSummary, StepOutcome};
pub use error::{ConfigError, EvaluationError, SearchError, SearchResult};
pub use evaluator::{
    normalize_score, ActionStatus, EvaluatedIndividual, EvaluationReport, FitnessEvaluator, SimulatedEvaluator,
    TargetScore,
};
pub use impact::{gene_identity, ImpactGuide, ImpactRecord, ImpactTracker, MutationOutcome, STRUCTURE_IDENTITY};
pub use mutator::{GeneCandidate, MutationResult, Mutator, StructuralOp};
pub use sampler::{ActionCatalog, Sampler, SeedDbBinding, SeedSkeleton};
