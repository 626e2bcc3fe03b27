//! Actions: one unit of interaction with the system under test.

use std::collections::BTreeMap;

use apiforge_gene::GeneResult;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::param::{ParamRole, Parameter};

// ── Identifiers ─────────────────────────────────────────────────────

/// Stable id of an action within one individual. Templates use `ActionId(0)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub u64);

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

// ── Auth ────────────────────────────────────────────────────────────

/// Named bundle of headers and cookies attached to HTTP-shaped calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub name: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
}

impl AuthContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_cookie(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(key.into(), value.into());
        self
    }
}

// ── Path Templates ──────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    Literal(String),
    Param(String),
}

/// URL template such as `/users/{id}/orders`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<PathSegment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Literal segments, in path order.
    pub fn non_parameter_tokens(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PathSegment::Literal(l) => Some(l.clone()),
                PathSegment::Param(_) => None,
            })
            .collect()
    }

    pub fn is_last_segment_parameter(&self) -> bool {
        matches!(self.segments.last(), Some(PathSegment::Param(_)))
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

// ── Action Kind ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphQlOperation {
    Query,
    Mutation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Http {
        verb: HttpVerb,
        path: PathTemplate,
        auth: Option<AuthContext>,
    },
    GraphQl {
        operation: GraphQlOperation,
        name: String,
        auth: Option<AuthContext>,
    },
    Rpc {
        interface: String,
        method: String,
    },
    /// Row insertion into `table`.
    Db {
        table: String,
        represents_existing_data: bool,
    },
    /// Response stub for an external service the SUT calls.
    ExternalStub { service: String },
}

// ── Action ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    id: ActionId,
    name: String,
    kind: ActionKind,
    params: Vec<Parameter>,
    counts_for_fitness: bool,
}

impl Action {
    fn build(name: String, kind: ActionKind, params: Vec<Parameter>, counts_for_fitness: bool) -> Self {
        Self {
            id: ActionId::default(),
            name,
            kind,
            params,
            counts_for_fitness,
        }
    }

    pub fn http(verb: HttpVerb, path: &str, params: Vec<Parameter>) -> Self {
        let path = PathTemplate::parse(path);
        Self::build(
            format!("{verb}:{path}"),
            ActionKind::Http {
                verb,
                path,
                auth: None,
            },
            params,
            true,
        )
    }

    pub fn graphql(operation: GraphQlOperation, name: &str, params: Vec<Parameter>) -> Self {
        let prefix = match operation {
            GraphQlOperation::Query => "query",
            GraphQlOperation::Mutation => "mutation",
        };
        Self::build(
            format!("{prefix}:{name}"),
            ActionKind::GraphQl {
                operation,
                name: name.to_string(),
                auth: None,
            },
            params,
            true,
        )
    }

    pub fn rpc(interface: &str, method: &str, params: Vec<Parameter>) -> Self {
        Self::build(
            format!("{interface}::{method}"),
            ActionKind::Rpc {
                interface: interface.to_string(),
                method: method.to_string(),
            },
            params,
            true,
        )
    }

    /// Row insertion. Every parameter should have the `DbColumn` role.
    pub fn db(table: &str, columns: Vec<Parameter>) -> Self {
        Self::build(
            table.to_string(),
            ActionKind::Db {
                table: table.to_string(),
                represents_existing_data: false,
            },
            columns,
            true,
        )
    }

    pub fn stub(service: &str, params: Vec<Parameter>) -> Self {
        Self::build(
            format!("stub:{service}"),
            ActionKind::ExternalStub {
                service: service.to_string(),
            },
            params,
            false,
        )
    }

    /// Mark a DB action as a row that already exists in the SUT.
    pub fn as_existing_data(mut self) -> Self {
        if let ActionKind::Db {
            represents_existing_data,
            ..
        } = &mut self.kind
        {
            *represents_existing_data = true;
        }
        self
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ActionId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn counts_for_fitness(&self) -> bool {
        self.counts_for_fitness
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    pub fn param_mut(&mut self, index: usize) -> Option<&mut Parameter> {
        self.params.get_mut(index)
    }

    /// Index of the first parameter with `name` and `role`.
    pub fn find_param(&self, name: &str, role: ParamRole) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.role == role && p.name == name)
    }

    pub fn path_template(&self) -> Option<&PathTemplate> {
        match &self.kind {
            ActionKind::Http { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Db { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn represents_existing_data(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::Db {
                represents_existing_data: true,
                ..
            }
        )
    }

    pub fn is_http_shaped(&self) -> bool {
        matches!(self.kind, ActionKind::Http { .. } | ActionKind::GraphQl { .. })
    }

    pub fn auth(&self) -> Option<&AuthContext> {
        match &self.kind {
            ActionKind::Http { auth, .. } | ActionKind::GraphQl { auth, .. } => auth.as_ref(),
            _ => None,
        }
    }

    /// Attach an auth context. Returns `false` for actions that carry none.
    pub fn set_auth(&mut self, context: Option<AuthContext>) -> bool {
        match &mut self.kind {
            ActionKind::Http { auth, .. } | ActionKind::GraphQl { auth, .. } => {
                *auth = context;
                true
            }
            _ => false,
        }
    }

    /// Randomize every parameter gene.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> GeneResult<()> {
        for p in &mut self.params {
            p.gene.randomize_all(rng)?;
        }
        Ok(())
    }

    /// Whether any parameter gene can be mutated.
    pub fn has_mutable_genes(&self) -> GeneResult<bool> {
        for p in &self.params {
            if p.gene.is_mutable(p.gene.root())? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_gene::GeneTree;

    #[test]
    fn names_follow_action_shape() {
        assert_eq!(Action::http(HttpVerb::Get, "/users/{id}", vec![]).name(), "GET:/users/{id}");
        assert_eq!(Action::db("users", vec![]).name(), "users");
        assert_eq!(Action::rpc("UserService", "find", vec![]).name(), "UserService::find");
        assert_eq!(
            Action::graphql(GraphQlOperation::Mutation, "addUser", vec![]).name(),
            "mutation:addUser"
        );
        let stub = Action::stub("payments", vec![]);
        assert_eq!(stub.name(), "stub:payments");
        assert!(!stub.counts_for_fitness());
    }

    #[test]
    fn path_template_tokens() {
        let t = PathTemplate::parse("/shops/{shopId}/items/{id}");
        assert_eq!(t.non_parameter_tokens(), vec!["shops", "items"]);
        assert!(t.is_last_segment_parameter());
        assert!(!PathTemplate::parse("/shops").is_last_segment_parameter());
    }

    #[test]
    fn auth_only_on_http_shaped_actions() {
        let mut get = Action::http(HttpVerb::Get, "/a", vec![]);
        assert!(get.set_auth(Some(AuthContext::new("admin").with_header("Authorization", "t"))));
        assert_eq!(get.auth().map(|a| a.name.as_str()), Some("admin"));
        let mut db = Action::db("t", vec![]);
        assert!(!db.set_auth(Some(AuthContext::new("admin"))));
    }

    #[test]
    fn existing_data_flag() {
        let a = Action::db("users", vec![Parameter::column("id", GeneTree::long("id"))]).as_existing_data();
        assert!(a.represents_existing_data());
        assert_eq!(a.find_param("id", ParamRole::DbColumn), Some(0));
    }
}
