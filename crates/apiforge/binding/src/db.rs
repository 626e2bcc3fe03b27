//! DB-to-parameter binding.
//!
//! Directives come from outside (usually a seed skeleton) and say which
//! inserted column feeds which parameter of a main action.

use apiforge_action::{ActionError, ActionId, BindingLink, BindingOrigin, GeneAddr, Individual, ParamRole};
use apiforge_gene::GeneVariant;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::direction::{resolve_direction, Direction, ExistingData};
use crate::error::{BindingError, BindingResult};
use crate::resolver::{lift_optional, BindingResolver};

/// One `table.column → parameter` directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbBindingDirective {
    pub table: String,
    pub column: String,
    /// Name of the parameter in the bound action.
    pub param_id: String,
    /// The column binds into a field of the parameter rather than the
    /// parameter as a whole.
    #[serde(default)]
    pub is_element_of_param: bool,
    /// Field name when `is_element_of_param` is set. Defaults to the column.
    #[serde(default)]
    pub field: Option<String>,
}

impl DbBindingDirective {
    pub fn new(table: impl Into<String>, column: impl Into<String>, param_id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            param_id: param_id.into(),
            is_element_of_param: false,
            field: None,
        }
    }

    /// Bind into `field` of the parameter.
    pub fn into_field(mut self, field: impl Into<String>) -> Self {
        self.is_element_of_param = true;
        self.field = Some(field.into());
        self
    }
}

impl BindingResolver {
    /// Link DB init actions to the parameters of main action `action`.
    ///
    /// Returns the number of links registered.
    pub fn bind_db(
        &self,
        individual: &mut Individual,
        action: ActionId,
        directives: &[DbBindingDirective],
    ) -> BindingResult<usize> {
        let mut proposed = Vec::new();
        {
            let Some(target_action) = individual.action(action) else {
                return Err(ActionError::UnknownAction(action).into());
            };
            for d in directives {
                if let Some(known) = self.known_tables() {
                    if !known.contains(&d.table) {
                        return Err(BindingError::UnknownTable(d.table.clone()));
                    }
                }
                let Some(row) = individual
                    .init_actions()
                    .iter()
                    .rev()
                    .find(|a| a.table() == Some(d.table.as_str()))
                else {
                    if !individual.db_removed_by_repair() {
                        warn!(table = %d.table, column = %d.column, "no DB action for binding directive");
                    }
                    continue;
                };
                let Some(col_idx) = row.find_param(&d.column, ParamRole::DbColumn) else {
                    debug!(table = %d.table, column = %d.column, "column not in DB action");
                    continue;
                };
                let Some(param_idx) = target_action.params().iter().position(|p| p.name == d.param_id) else {
                    debug!(param = %d.param_id, "parameter not in action");
                    continue;
                };
                let Some(column) = row.param(col_idx) else {
                    continue;
                };
                let Some(param) = target_action.param(param_idx) else {
                    continue;
                };

                let col_tree = &column.gene;
                let col_node = col_tree.root();
                let p_tree = &param.gene;
                let mut p_node = p_tree.value_node(p_tree.root())?;
                if d.is_element_of_param {
                    let name = d.field.as_deref().unwrap_or(&d.column);
                    if p_tree.variant(p_node)? != GeneVariant::Object {
                        debug!(param = %d.param_id, "parameter is not an object");
                        continue;
                    }
                    match p_tree.field(p_node, name)? {
                        Some(f) => p_node = p_tree.value_node(f)?,
                        None => {
                            debug!(param = %d.param_id, field = name, "field not in parameter");
                            continue;
                        }
                    }
                }

                let existing = row.represents_existing_data().then_some(ExistingData::Source);
                let db_addr = GeneAddr::new(row.id(), col_idx, col_node);
                let link = match resolve_direction(col_tree.variant(col_node)?, p_tree.variant(p_node)?, existing) {
                    Direction::AsAsserted => BindingLink::new(
                        db_addr,
                        GeneAddr::new(action, param_idx, lift_optional(p_tree, p_node)?),
                        BindingOrigin::Database,
                    ),
                    Direction::Reversed => BindingLink::new(
                        GeneAddr::new(action, param_idx, p_node),
                        db_addr,
                        BindingOrigin::Database,
                    ),
                };
                proposed.push(link);
            }
        }
        let mut registered = 0;
        for link in proposed {
            if individual.register_link(link)? {
                registered += 1;
            }
        }
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_action::{Action, HttpVerb, Parameter, SampleType};
    use apiforge_gene::GeneTree;

    fn users_row() -> Action {
        Action::db(
            "users",
            vec![
                Parameter::column("id", GeneTree::primary_key("id", "users", GeneTree::long("id"), 1)),
                Parameter::column("email", GeneTree::string("email")),
            ],
        )
    }

    fn get_user() -> Action {
        Action::http(HttpVerb::Get, "/users/{id}", vec![Parameter::path("id", GeneTree::long("id"))])
    }

    #[test]
    fn primary_key_feeds_path_param() {
        let mut ind = Individual::new(SampleType::Seeded);
        let row = ind.add_init_action(users_row());
        let call = ind.add_main_action(get_user());
        let n = BindingResolver::default()
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
            .unwrap();
        assert_eq!(n, 1);
        let link = ind.links()[0];
        assert_eq!(link.source.action, row);
        assert_eq!(link.target.action, call);
        assert_eq!(link.origin, BindingOrigin::Database);
    }

    #[test]
    fn unknown_table_fails_fast() {
        let mut ind = Individual::new(SampleType::Seeded);
        ind.add_init_action(users_row());
        let call = ind.add_main_action(get_user());
        let resolver = BindingResolver::default().with_known_tables(["users"]);
        let err = resolver
            .bind_db(&mut ind, call, &[DbBindingDirective::new("ghosts", "id", "id")])
            .unwrap_err();
        assert_eq!(err, BindingError::UnknownTable("ghosts".into()));
    }

    #[test]
    fn missing_db_action_is_skipped() {
        let mut ind = Individual::new(SampleType::Seeded);
        let call = ind.add_main_action(get_user());
        let resolver = BindingResolver::default().with_known_tables(["users"]);
        let n = resolver
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn missing_column_or_param_is_skipped() {
        let mut ind = Individual::new(SampleType::Seeded);
        ind.add_init_action(users_row());
        let call = ind.add_main_action(get_user());
        let n = BindingResolver::default()
            .bind_db(
                &mut ind,
                call,
                &[
                    DbBindingDirective::new("users", "nickname", "id"),
                    DbBindingDirective::new("users", "id", "userId"),
                ],
            )
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn column_binds_into_body_field() {
        let mut ind = Individual::new(SampleType::Seeded);
        let row = ind.add_init_action(users_row());
        let body = GeneTree::object_of("body", "Invite", vec![GeneTree::string("email"), GeneTree::integer("days")]);
        let call = ind.add_main_action(Action::http(HttpVerb::Post, "/invites", vec![Parameter::body(body)]));
        let n = BindingResolver::default()
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "email", "body").into_field("email")])
            .unwrap();
        assert_eq!(n, 1);
        let link = ind.links()[0];
        assert_eq!(link.source, GeneAddr::new(row, 1, ind.gene(row, 1).unwrap().root()));
        assert_eq!(ind.gene(call, 0).unwrap().name(link.target.node).unwrap(), "email");
    }

    #[test]
    fn existing_string_column_is_not_overwritten() {
        let mut ind = Individual::new(SampleType::Seeded);
        let row = ind.add_init_action(Action::db("users", vec![Parameter::column("id", GeneTree::string("id"))]).as_existing_data());
        let call = ind.add_main_action(get_user());
        BindingResolver::default()
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
            .unwrap();
        assert_eq!(ind.links()[0].source.action, row);
    }

    #[test]
    fn fresh_string_column_takes_value_from_numeric_param() {
        let mut ind = Individual::new(SampleType::Seeded);
        let row = ind.add_init_action(Action::db("users", vec![Parameter::column("id", GeneTree::string("id"))]));
        let call = ind.add_main_action(get_user());
        BindingResolver::default()
            .bind_db(&mut ind, call, &[DbBindingDirective::new("users", "id", "id")])
            .unwrap();
        let link = ind.links()[0];
        assert_eq!(link.source.action, call);
        assert_eq!(link.target.action, row);
    }
}
