//! Binding Resolver: data-flow links between genes.
//!
//! A link says that one gene takes its value from another: a path `id`
//! from the `id` returned by an earlier POST body, a query parameter from a
//! primary key inserted during initialization, and so on. The resolver
//! only proposes links; [`apiforge_action::Individual`] stores them and
//! copies values along them.
//!
//! Matching works on three levels:
//!
//! - same-named parameters of the same role
//! - body fields against non-body parameters, using qualified name maps
//! - object fields against object fields, using name similarity
//!
//! DB rows are linked through explicit [`DbBindingDirective`]s. The direction
//! of every link follows [`resolve_direction`].

#![deny(unsafe_code)]

pub mod config;
pub mod db;
pub mod direction;
pub mod error;
pub mod names;
pub mod resolver;
pub mod similarity;

// ── Re-exports ──────────────────────────────────────────────────────

pub use config::BindingConfig;
pub use db::DbBindingDirective;
pub use direction::{binding_priority, resolve_direction, Direction, ExistingData};
pub use error::{BindingError, BindingResult};
pub use resolver::{BindingResolver, ParamView};
pub use similarity::{NormalizedLevenshtein, StringSimilarity};
