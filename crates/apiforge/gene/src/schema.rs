//! Schema-driven construction of gene trees.
//!
//! Object schemas may refer to each other, including to themselves. The
//! builder tracks the object types on the current build path and emits a
//! cycle placeholder instead of re-entering one, and a limit placeholder once
//! the configured depth is reached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeneError, GeneResult};
use crate::tree::GeneTree;

/// Default nesting depth for object references.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Field type as declared by an ingested schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    String,
    Enum(Vec<String>),
    Date,
    Time,
    DateTime,
    Base64,
    /// Reference to a named object schema.
    Ref(String),
    Array(Box<FieldType>, usize),
    Map(Box<FieldType>, usize),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSchema {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

/// Named object schemas and the depth limit used when expanding them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaRegistry {
    objects: BTreeMap<String, ObjectSchema>,
    max_depth: usize,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_object(mut self, schema: ObjectSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn register(&mut self, schema: ObjectSchema) {
        self.objects.insert(schema.name.clone(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&ObjectSchema> {
        self.objects.get(name)
    }

    /// Build an object gene named `gene_name` for the schema `type_name`.
    pub fn build(&self, type_name: &str, gene_name: &str) -> GeneResult<GeneTree> {
        let mut path = Vec::new();
        self.build_object(gene_name, type_name, &mut path)
    }

    /// Build a gene for an arbitrary field type, e.g. a top-level array parameter.
    pub fn build_type(&self, gene_name: &str, ty: &FieldType) -> GeneResult<GeneTree> {
        let mut path = Vec::new();
        self.build_field(gene_name, ty, &mut path)
    }

    fn build_object(&self, gene_name: &str, type_name: &str, path: &mut Vec<String>) -> GeneResult<GeneTree> {
        let schema = self
            .objects
            .get(type_name)
            .ok_or_else(|| GeneError::UnknownSchema(type_name.to_string()))?;
        path.push(type_name.to_string());
        let mut fields = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let gene = self.build_field(&field.name, &field.ty, path)?;
            let is_placeholder = gene.variant(gene.root())?.is_placeholder();
            fields.push(if field.required || is_placeholder {
                gene
            } else {
                GeneTree::optional(field.name.clone(), gene, true)
            });
        }
        path.pop();
        Ok(GeneTree::object_of(gene_name, type_name, fields))
    }

    fn build_field(&self, name: &str, ty: &FieldType, path: &mut Vec<String>) -> GeneResult<GeneTree> {
        Ok(match ty {
            FieldType::Integer => GeneTree::integer(name),
            FieldType::Long => GeneTree::long(name),
            FieldType::Float => GeneTree::float(name),
            FieldType::Double => GeneTree::double(name),
            FieldType::Boolean => GeneTree::boolean(name),
            FieldType::String => GeneTree::string(name),
            FieldType::Enum(values) => GeneTree::enumeration(name, values.iter().cloned()),
            FieldType::Date => GeneTree::date(name),
            FieldType::Time => GeneTree::time(name),
            FieldType::DateTime => GeneTree::date_time(name),
            FieldType::Base64 => GeneTree::base64(name),
            FieldType::Ref(target) => {
                if path.iter().any(|t| t == target) {
                    debug!(field = name, schema = %target, "cycle cut with placeholder");
                    GeneTree::cycle_placeholder(name)
                } else if path.len() >= self.max_depth {
                    debug!(field = name, depth = path.len(), "depth limit reached");
                    GeneTree::limit_placeholder(name)
                } else {
                    self.build_object(name, target, path)?
                }
            }
            FieldType::Array(inner, max_size) => {
                let template = self.build_field(name, inner, path)?;
                match template.variant(template.root())? {
                    v if v.is_placeholder() => template,
                    _ => GeneTree::array(name, template, *max_size),
                }
            }
            FieldType::Map(inner, max_size) => {
                let template = self.build_field(name, inner, path)?;
                match template.variant(template.root())? {
                    v if v.is_placeholder() => template,
                    _ => GeneTree::map(name, template, *max_size),
                }
            }
        })
    }
}
