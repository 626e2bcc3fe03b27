#[path = "property/gene_bounds.rs"]
mod gene_bounds;

#[path = "property/copy_semantics.rs"]
mod copy_semantics;

#[path = "property/binding_rules.rs"]
mod binding_rules;

#[path = "property/archive_monotonicity.rs"]
mod archive_monotonicity;
