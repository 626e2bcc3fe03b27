//! Named, role-tagged parameters.

use apiforge_gene::GeneTree;
use serde::{Deserialize, Serialize};

/// Where a parameter's value goes when the action is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParamRole {
    Path,
    Query,
    Body,
    Header,
    Form,
    DbColumn,
    Return,
}

impl std::fmt::Display for ParamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
            Self::Header => "header",
            Self::Form => "form",
            Self::DbColumn => "db",
            Self::Return => "return",
        };
        f.write_str(s)
    }
}

/// A `(name, role, gene)` triple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub role: ParamRole,
    pub gene: GeneTree,
}

impl Parameter {
    pub fn new(name: impl Into<String>, role: ParamRole, gene: GeneTree) -> Self {
        Self {
            name: name.into(),
            role,
            gene,
        }
    }

    pub fn path(name: impl Into<String>, gene: GeneTree) -> Self {
        Self::new(name, ParamRole::Path, gene)
    }

    pub fn query(name: impl Into<String>, gene: GeneTree) -> Self {
        Self::new(name, ParamRole::Query, gene)
    }

    pub fn body(gene: GeneTree) -> Self {
        Self::new("body", ParamRole::Body, gene)
    }

    pub fn header(name: impl Into<String>, gene: GeneTree) -> Self {
        Self::new(name, ParamRole::Header, gene)
    }

    pub fn column(name: impl Into<String>, gene: GeneTree) -> Self {
        Self::new(name, ParamRole::DbColumn, gene)
    }

    pub fn is_body(&self) -> bool {
        self.role == ParamRole::Body
    }
}
