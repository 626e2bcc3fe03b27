//! Actions and Individuals: the call-sequence layer over gene trees.
//!
//! A [`Parameter`] gives a gene tree a name and a role; an [`Action`]
//! groups parameters into one interaction with the system under test (HTTP,
//! GraphQL, RPC, DB insertion, external-service stub). An [`Individual`]
//! is a candidate test case: initializing actions followed by main actions,
//! plus the [`BindingLink`]s that keep dependent genes equal.
//!
//! # Ordering
//!
//! - Initializing actions never take values from main actions through
//!   parameter links.
//! - A main action only takes values from itself, earlier main actions or
//!   initializing actions.

#![deny(unsafe_code)]

pub mod action;
pub mod error;
pub mod individual;
pub mod link;
pub mod param;

// ── Re-exports ──────────────────────────────────────────────────────

pub use action::{
    Action, ActionId, ActionKind, AuthContext, GraphQlOperation, HttpVerb, PathSegment,
    PathTemplate,
};
pub use error::{ActionError, ActionResult};
pub use individual::{ActionPos, Individual, SampleType, Tracking};
pub use link::{BindingLink, BindingOrigin, GeneAddr};
pub use param::{ParamRole, Parameter};
