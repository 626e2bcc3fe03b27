//! Binding links between genes of different parameters.

use apiforge_gene::NodeId;
use serde::{Deserialize, Serialize};

use crate::action::ActionId;

/// Address of one gene node inside an individual.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneAddr {
    pub action: ActionId,
    pub param: usize,
    pub node: NodeId,
}

impl GeneAddr {
    pub fn new(action: ActionId, param: usize, node: NodeId) -> Self {
        Self { action, param, node }
    }
}

impl std::fmt::Display for GeneAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.p{}{}", self.action, self.param, self.node)
    }
}

/// How a link was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingOrigin {
    /// Parameter-to-parameter matching.
    Params,
    /// A DB-to-parameter directive.
    Database,
}

/// `target` takes its value from `source` whenever bindings are synchronised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingLink {
    pub source: GeneAddr,
    pub target: GeneAddr,
    pub origin: BindingOrigin,
}

impl BindingLink {
    pub fn new(source: GeneAddr, target: GeneAddr, origin: BindingOrigin) -> Self {
        Self {
            source,
            target,
            origin,
        }
    }

    pub fn involves(&self, action: ActionId) -> bool {
        self.source.action == action || self.target.action == action
    }
}

impl std::fmt::Display for BindingLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
