#[path = "e2e/lone_path_parameter.rs"]
mod lone_path_parameter;

#[path = "e2e/db_primary_key_binding.rs"]
mod db_primary_key_binding;

#[path = "e2e/array_growth.rs"]
mod array_growth;

#[path = "e2e/impact_bias.rs"]
mod impact_bias;

#[path = "e2e/search_against_simulator.rs"]
mod search_against_simulator;
