//! Simulated pet-store API for the demo.
//!
//! Provides the action catalog, seed skeletons and authentication contexts
//! of a small REST service backed by a `pets` and an `owners` table, without
//! requiring any running system under test.

use apiforge_action::{Action, AuthContext, HttpVerb, Parameter};
use apiforge_binding::DbBindingDirective;
use apiforge_gene::{FieldSchema, FieldType, GeneResult, GeneTree, ObjectSchema, SchemaRegistry};
use apiforge_search::{ActionCatalog, SeedSkeleton};

pub struct PetStore;

impl PetStore {
    /// Object schemas. `Pet.owner.pets` refers back to `Pet`.
    pub fn schemas() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_max_depth(3)
            .with_object(ObjectSchema {
                name: "Pet".into(),
                fields: vec![
                    FieldSchema::required("id", FieldType::Long),
                    FieldSchema::required("name", FieldType::String),
                    FieldSchema::optional(
                        "status",
                        FieldType::Enum(vec!["available".into(), "pending".into(), "sold".into()]),
                    ),
                    FieldSchema::optional("tags", FieldType::Array(Box::new(FieldType::String), 4)),
                    FieldSchema::optional("owner", FieldType::Ref("Owner".into())),
                ],
            })
            .with_object(ObjectSchema {
                name: "Owner".into(),
                fields: vec![
                    FieldSchema::required("id", FieldType::Long),
                    FieldSchema::required("email", FieldType::String),
                    FieldSchema::optional("pets", FieldType::Array(Box::new(FieldType::Ref("Pet".into())), 2)),
                ],
            })
    }

    pub fn catalog() -> GeneResult<ActionCatalog> {
        let schemas = Self::schemas();
        let id = |name: &str| GeneTree::long_in(name, 1, 10_000);
        Ok(ActionCatalog::new([
            Action::http(HttpVerb::Post, "/pets", vec![Parameter::body(schemas.build("Pet", "body")?)]),
            Action::http(HttpVerb::Get, "/pets/{petId}", vec![Parameter::path("petId", id("petId"))]),
            Action::http(
                HttpVerb::Put,
                "/pets/{petId}",
                vec![Parameter::path("petId", id("petId")), Parameter::body(schemas.build("Pet", "body")?)],
            ),
            Action::http(HttpVerb::Delete, "/pets/{petId}", vec![Parameter::path("petId", id("petId"))]),
            Action::http(
                HttpVerb::Get,
                "/pets",
                vec![
                    Parameter::query("limit", GeneTree::integer_in("limit", 0, 100)),
                    Parameter::query("status", GeneTree::enumeration("status", ["available", "pending", "sold"])),
                ],
            ),
            Action::http(HttpVerb::Get, "/owners/{ownerId}", vec![Parameter::path("ownerId", id("ownerId"))]),
        ]))
    }

    fn owner_row() -> Action {
        Action::db(
            "owners",
            vec![
                Parameter::column(
                    "id",
                    GeneTree::primary_key("id", "owners", GeneTree::long_in("id", 1, 10_000), 1),
                ),
                Parameter::column("email", GeneTree::string("email")),
            ],
        )
    }

    pub fn seeds() -> Vec<SeedSkeleton> {
        vec![
            SeedSkeleton::new("create-read-update", ["POST:/pets", "GET:/pets/{petId}", "PUT:/pets/{petId}"]),
            SeedSkeleton::new("create-delete-read", ["POST:/pets", "DELETE:/pets/{petId}", "GET:/pets/{petId}"]),
            SeedSkeleton::new("stored-owner", ["GET:/owners/{ownerId}"])
                .with_init(Self::owner_row())
                .with_db_binding(0, vec![DbBindingDirective::new("owners", "id", "ownerId")]),
        ]
    }

    pub fn auth() -> Vec<AuthContext> {
        vec![
            AuthContext::new("admin").with_header("Authorization", "Bearer admin-token"),
            AuthContext::new("customer").with_cookie("session", "c-42"),
        ]
    }
}
