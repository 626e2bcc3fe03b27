//! Value-level operations: copy, compare, print, and cross-variant binding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map as JsonMap, Number, Value};
use tracing::debug;

use crate::error::{GeneError, GeneResult};
use crate::node::{GeneKind, GeneVariant, NodeId};
use crate::tree::GeneTree;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn in_bounds(name: &str, ok: bool) -> GeneResult<()> {
    if ok {
        Ok(())
    } else {
        Err(GeneError::OutOfBounds(name.to_string()))
    }
}

enum CopyStep {
    Done,
    Pairs(Vec<(NodeId, NodeId)>),
    Replace { old: Vec<NodeId>, new: Vec<NodeId> },
}

// ── Copy ────────────────────────────────────────────────────────────

impl GeneTree {
    /// Make the value at `id` equal to the value at `src_id` in `src`.
    ///
    /// The whole source shape is checked before anything is written, so a
    /// failed copy leaves this tree unchanged.
    pub fn copy_value_from(&mut self, id: NodeId, src: &GeneTree, src_id: NodeId) -> GeneResult<()> {
        self.check_copy(id, src, src_id)?;
        self.apply_copy(id, src, src_id)
    }

    fn check_copy(&self, id: NodeId, src: &GeneTree, src_id: NodeId) -> GeneResult<()> {
        let mine = self.node(id)?;
        let theirs = src.node(src_id)?;
        if mine.variant() != theirs.variant() {
            return Err(GeneError::InvalidGeneType {
                expected: mine.variant(),
                found: theirs.variant(),
            });
        }
        match (&mine.kind, &theirs.kind) {
            (GeneKind::Object { fields: a, .. }, GeneKind::Object { fields: b, .. }) => {
                if a.len() != b.len() {
                    return Err(GeneError::IncompatibleStructure(mine.name.clone()));
                }
                for (x, y) in a.iter().zip(b) {
                    self.check_copy(*x, src, *y)?;
                }
                Ok(())
            }
            (
                GeneKind::Array {
                    template, max_size, ..
                },
                GeneKind::Array { elements, .. },
            )
            | (
                GeneKind::Map {
                    template, max_size, ..
                },
                GeneKind::Map {
                    entries: elements, ..
                },
            ) => {
                if elements.len() > *max_size {
                    return Err(GeneError::SizeBoundExceeded {
                        name: mine.name.clone(),
                        len: elements.len(),
                        max_size: *max_size,
                    });
                }
                for e in elements {
                    self.check_copy(*template, src, *e)?;
                }
                Ok(())
            }
            (GeneKind::Enum { values, .. }, GeneKind::Enum { values: v, index }) => {
                match v.get(*index) {
                    Some(value) if values.contains(value) => Ok(()),
                    _ => Err(GeneError::IncompatibleStructure(mine.name.clone())),
                }
            }
            (GeneKind::Integer { min, max, .. }, GeneKind::Integer { value, .. }) => {
                in_bounds(&mine.name, (*min..=*max).contains(value))
            }
            (GeneKind::Long { min, max, .. }, GeneKind::Long { value, .. }) => {
                in_bounds(&mine.name, (*min..=*max).contains(value))
            }
            (GeneKind::Float { min, max, .. }, GeneKind::Float { value, .. }) => {
                in_bounds(&mine.name, (*min..=*max).contains(value))
            }
            (GeneKind::Double { min, max, .. }, GeneKind::Double { value, .. }) => {
                in_bounds(&mine.name, (*min..=*max).contains(value))
            }
            (GeneKind::String { min_len, max_len, .. }, GeneKind::String { value, .. }) => {
                in_bounds(&mine.name, (*min_len..=*max_len).contains(&value.chars().count()))
            }
            (GeneKind::Optional { gene: a, .. }, GeneKind::Optional { gene: b, .. })
            | (GeneKind::SqlPrimaryKey { gene: a, .. }, GeneKind::SqlPrimaryKey { gene: b, .. })
            | (GeneKind::Base64 { data: a }, GeneKind::Base64 { data: b }) => {
                self.check_copy(*a, src, *b)
            }
            _ => Ok(()),
        }
    }

    fn apply_copy(&mut self, id: NodeId, src: &GeneTree, src_id: NodeId) -> GeneResult<()> {
        let theirs = src.kind(src_id)?;
        let step = {
            let node = self.node_mut(id)?;
            match (&mut node.kind, theirs) {
                (GeneKind::Integer { value, .. }, GeneKind::Integer { value: v, .. }) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::Long { value, .. }, GeneKind::Long { value: v, .. }) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::Float { value, .. }, GeneKind::Float { value: v, .. }) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::Double { value, .. }, GeneKind::Double { value: v, .. }) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::Boolean(value), GeneKind::Boolean(v)) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::String { value, .. }, GeneKind::String { value: v, .. })
                | (GeneKind::ImmutableData { value }, GeneKind::ImmutableData { value: v }) => {
                    value.clone_from(v);
                    CopyStep::Done
                }
                (GeneKind::Enum { values, index }, GeneKind::Enum { values: v, index: i }) => {
                    if let Some(pos) = v.get(*i).and_then(|value| values.iter().position(|x| x == value)) {
                        *index = pos;
                    }
                    CopyStep::Done
                }
                (GeneKind::Date(value), GeneKind::Date(v)) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::Time(value), GeneKind::Time(v)) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::DateTime(value), GeneKind::DateTime(v)) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::SqlForeignKey { value, .. }, GeneKind::SqlForeignKey { value: v, .. }) => {
                    *value = *v;
                    CopyStep::Done
                }
                (GeneKind::Object { fields, .. }, GeneKind::Object { fields: f, .. }) => {
                    CopyStep::Pairs(fields.iter().copied().zip(f.iter().copied()).collect())
                }
                (GeneKind::Optional { gene, active }, GeneKind::Optional { gene: g, active: a }) => {
                    *active = *a;
                    CopyStep::Pairs(vec![(*gene, *g)])
                }
                (GeneKind::SqlPrimaryKey { gene, .. }, GeneKind::SqlPrimaryKey { gene: g, .. }) => {
                    CopyStep::Pairs(vec![(*gene, *g)])
                }
                (GeneKind::Base64 { data }, GeneKind::Base64 { data: d }) => {
                    CopyStep::Pairs(vec![(*data, *d)])
                }
                (GeneKind::Array { elements, .. }, GeneKind::Array { elements: e, .. })
                | (GeneKind::Map { entries: elements, .. }, GeneKind::Map { entries: e, .. }) => {
                    CopyStep::Replace {
                        old: elements.clone(),
                        new: e.clone(),
                    }
                }
                _ => CopyStep::Done,
            }
        };
        match step {
            CopyStep::Done => Ok(()),
            CopyStep::Pairs(pairs) => {
                for (a, b) in pairs {
                    self.apply_copy(a, src, b)?;
                }
                Ok(())
            }
            CopyStep::Replace { old, new } => {
                for e in old {
                    self.release(e)?;
                }
                let mut items = Vec::with_capacity(new.len());
                for e in new {
                    items.push(self.import(src, e, Some(id))?);
                }
                self.set_collection(id, items)
            }
        }
    }
}

// ── Comparison ──────────────────────────────────────────────────────

impl GeneTree {
    /// Deep value equality with a gene of the same variant.
    pub fn contains_same_value_as(&self, id: NodeId, other: &GeneTree, other_id: NodeId) -> GeneResult<bool> {
        let a = self.kind(id)?;
        let b = other.kind(other_id)?;
        if a.variant() != b.variant() {
            return Err(GeneError::InvalidGeneType {
                expected: a.variant(),
                found: b.variant(),
            });
        }
        let pairs: Vec<(NodeId, NodeId)> = match (a, b) {
            (GeneKind::Integer { value: x, .. }, GeneKind::Integer { value: y, .. }) => return Ok(x == y),
            (GeneKind::Long { value: x, .. }, GeneKind::Long { value: y, .. }) => return Ok(x == y),
            (GeneKind::Float { value: x, .. }, GeneKind::Float { value: y, .. }) => return Ok(x == y),
            (GeneKind::Double { value: x, .. }, GeneKind::Double { value: y, .. }) => return Ok(x == y),
            (GeneKind::Boolean(x), GeneKind::Boolean(y)) => return Ok(x == y),
            (GeneKind::String { value: x, .. }, GeneKind::String { value: y, .. }) => return Ok(x == y),
            (GeneKind::ImmutableData { value: x }, GeneKind::ImmutableData { value: y }) => return Ok(x == y),
            (GeneKind::Enum { values: vx, index: x }, GeneKind::Enum { values: vy, index: y }) => {
                return Ok(vx.get(*x) == vy.get(*y))
            }
            (GeneKind::Date(x), GeneKind::Date(y)) => return Ok(x == y),
            (GeneKind::Time(x), GeneKind::Time(y)) => return Ok(x == y),
            (GeneKind::DateTime(x), GeneKind::DateTime(y)) => return Ok(x == y),
            (GeneKind::SqlForeignKey { value: x, .. }, GeneKind::SqlForeignKey { value: y, .. }) => {
                return Ok(x == y)
            }
            (GeneKind::Optional { gene: x, active: ax }, GeneKind::Optional { gene: y, active: ay }) => {
                if ax != ay {
                    return Ok(false);
                }
                if !ax {
                    return Ok(true);
                }
                vec![(*x, *y)]
            }
            (GeneKind::Map { entries: x, .. }, GeneKind::Map { entries: y, .. }) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (p, q) in x.iter().zip(y) {
                    if self.name(*p)? != other.name(*q)? {
                        return Ok(false);
                    }
                }
                x.iter().copied().zip(y.iter().copied()).collect()
            }
            (x, y) => {
                let xs = x.value_children();
                let ys = y.value_children();
                if xs.len() != ys.len() {
                    return Ok(false);
                }
                xs.into_iter().zip(ys).collect()
            }
        };
        for (x, y) in pairs {
            if !self.contains_same_value_as(x, other, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// ── Printing ────────────────────────────────────────────────────────

fn skipped_in_object(tree: &GeneTree, id: NodeId) -> GeneResult<bool> {
    if let GeneKind::Optional { active: false, .. } = tree.kind(id)? {
        return Ok(true);
    }
    Ok(tree.variant(tree.value_node(id)?)?.is_placeholder())
}

impl GeneTree {
    /// JSON rendering of the value at `id`.
    pub fn to_json(&self, id: NodeId) -> GeneResult<Value> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            GeneKind::Integer { value, .. } => Value::from(*value),
            GeneKind::Long { value, .. } => Value::from(*value),
            GeneKind::Float { value, .. } => Number::from_f64(f64::from(*value))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            GeneKind::Double { value, .. } => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            GeneKind::Boolean(b) => Value::Bool(*b),
            GeneKind::String { value, .. } | GeneKind::ImmutableData { value } => Value::String(value.clone()),
            GeneKind::Enum { values, index } => values
                .get(*index)
                .cloned()
                .map(Value::String)
                .ok_or_else(|| GeneError::NotPrintable(node.name.clone()))?,
            GeneKind::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            GeneKind::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
            GeneKind::DateTime(dt) => Value::String(dt.format(DATE_TIME_FORMAT).to_string()),
            GeneKind::Base64 { data } => Value::String(STANDARD.encode(self.raw_string(*data)?)),
            GeneKind::SqlPrimaryKey { gene, .. } => self.to_json(*gene)?,
            GeneKind::SqlForeignKey { value, .. } => value.map(Value::from).unwrap_or(Value::Null),
            GeneKind::SqlAutoIncrement => Value::Null,
            GeneKind::Optional { gene, active } => {
                if *active {
                    self.to_json(*gene)?
                } else {
                    Value::Null
                }
            }
            GeneKind::Object { fields, .. } => {
                let mut out = JsonMap::new();
                for f in fields {
                    if skipped_in_object(self, *f)? {
                        continue;
                    }
                    out.insert(self.name(*f)?.to_string(), self.to_json(*f)?);
                }
                Value::Object(out)
            }
            GeneKind::Array { elements, .. } => Value::Array(
                elements
                    .iter()
                    .map(|e| self.to_json(*e))
                    .collect::<GeneResult<Vec<_>>>()?,
            ),
            GeneKind::Map { entries, .. } => {
                let mut out = JsonMap::new();
                for e in entries {
                    out.insert(self.name(*e)?.to_string(), self.to_json(*e)?);
                }
                Value::Object(out)
            }
            GeneKind::CyclePlaceholder | GeneKind::LimitPlaceholder => {
                return Err(GeneError::NotPrintable(node.name.clone()))
            }
        })
    }

    /// Textual value as it would appear in a request: strings unquoted, everything else as JSON.
    pub fn printable(&self, id: NodeId) -> GeneResult<String> {
        Ok(match self.to_json(id)? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    fn raw_string(&self, id: NodeId) -> GeneResult<String> {
        match self.kind(id)? {
            GeneKind::String { value, .. } => Ok(value.clone()),
            _ => self.printable(id),
        }
    }
}

// ── Binding ─────────────────────────────────────────────────────────

/// Owned view of a source value used when converting between variants.
enum Scalar {
    Int(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Real(v) => v.to_string(),
            Scalar::Bool(v) => v.to_string(),
            Scalar::Text(v) => v.clone(),
            Scalar::Date(v) => v.format(DATE_FORMAT).to_string(),
            Scalar::Time(v) => v.format(TIME_FORMAT).to_string(),
            Scalar::DateTime(v) => v.format(DATE_TIME_FORMAT).to_string(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Real(v) if v.is_finite() => Some(v.trunc() as i64),
            Scalar::Bool(v) => Some(i64::from(*v)),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Real(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            Scalar::Int(v) => Some(*v != 0),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl GeneTree {
    fn scalar(&self, id: NodeId) -> GeneResult<Option<Scalar>> {
        let id = self.value_node(id)?;
        Ok(match self.kind(id)? {
            GeneKind::Integer { value, .. } => Some(Scalar::Int(i64::from(*value))),
            GeneKind::Long { value, .. } => Some(Scalar::Int(*value)),
            GeneKind::Float { value, .. } => Some(Scalar::Real(f64::from(*value))),
            GeneKind::Double { value, .. } => Some(Scalar::Real(*value)),
            GeneKind::Boolean(b) => Some(Scalar::Bool(*b)),
            GeneKind::SqlForeignKey { value, .. } => value.map(Scalar::Int),
            GeneKind::Date(d) => Some(Scalar::Date(*d)),
            GeneKind::Time(t) => Some(Scalar::Time(*t)),
            GeneKind::DateTime(dt) => Some(Scalar::DateTime(*dt)),
            GeneKind::CyclePlaceholder | GeneKind::LimitPlaceholder | GeneKind::SqlAutoIncrement => None,
            _ => Some(Scalar::Text(self.raw_string(id)?)),
        })
    }

    /// Assign the value at `id` from a gene of any variant, converting where
    /// a sensible conversion exists.
    ///
    /// Returns `Ok(false)` when the target cannot hold the source value
    /// (immutable targets, unparsable text, placeholders, values outside
    /// the target's bounds).
    pub fn bind_value_from(&mut self, id: NodeId, src: &GeneTree, src_id: NodeId) -> GeneResult<bool> {
        let target_variant = self.variant(id)?;
        let source_variant = src.variant(src_id)?;
        if target_variant == source_variant && !target_variant.is_placeholder() {
            return match self.copy_value_from(id, src, src_id) {
                Ok(()) => Ok(true),
                Err(GeneError::IncompatibleStructure(_))
                | Err(GeneError::SizeBoundExceeded { .. })
                | Err(GeneError::OutOfBounds(_)) => {
                    debug!(node = %id, "same-variant binding fell back to no-op");
                    Ok(false)
                }
                Err(e) => Err(e),
            };
        }

        match target_variant {
            GeneVariant::Optional => {
                let inner = self.value_node(id)?;
                let bound = self.bind_value_from(inner, src, src_id)?;
                if bound {
                    self.set_optional_active(id, true)?;
                }
                return Ok(bound);
            }
            GeneVariant::SqlPrimaryKey => {
                let inner = self.value_node(id)?;
                return self.bind_value_from(inner, src, src_id);
            }
            GeneVariant::SqlAutoIncrement
            | GeneVariant::ImmutableData
            | GeneVariant::CyclePlaceholder
            | GeneVariant::LimitPlaceholder => return Ok(false),
            _ => {}
        }

        let Some(scalar) = src.scalar(src_id)? else {
            return Ok(false);
        };
        if let GeneKind::Base64 { data } = self.kind(id)? {
            let data = *data;
            return self.bind_base64(data, scalar);
        }

        let node = self.node_mut(id)?;
        let bound = match &mut node.kind {
            GeneKind::Integer { value, min, max } => scalar
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .filter(|v| (*min..=*max).contains(v))
                .map(|v| *value = v)
                .is_some(),
            GeneKind::Long { value, min, max } => scalar
                .as_i64()
                .filter(|v| (*min..=*max).contains(v))
                .map(|v| *value = v)
                .is_some(),
            GeneKind::Float { value, min, max } => scalar
                .as_f64()
                .map(|v| v as f32)
                .filter(|v| (*min..=*max).contains(v))
                .map(|v| *value = v)
                .is_some(),
            GeneKind::Double { value, min, max } => scalar
                .as_f64()
                .filter(|v| (*min..=*max).contains(v))
                .map(|v| *value = v)
                .is_some(),
            GeneKind::Boolean(value) => scalar.as_bool().map(|v| *value = v).is_some(),
            GeneKind::String { value, min_len, max_len } => {
                let text = scalar.as_text();
                if (*min_len..=*max_len).contains(&text.chars().count()) {
                    *value = text;
                    true
                } else {
                    false
                }
            }
            GeneKind::Enum { values, index } => {
                let text = scalar.as_text();
                match values.iter().position(|v| *v == text) {
                    Some(i) => {
                        *index = i;
                        true
                    }
                    None => false,
                }
            }
            GeneKind::SqlForeignKey { value, .. } => scalar.as_i64().map(|v| *value = Some(v)).is_some(),
            GeneKind::Date(value) => match scalar {
                Scalar::Date(d) => {
                    *value = d;
                    true
                }
                Scalar::DateTime(dt) => {
                    *value = dt.date();
                    true
                }
                other => NaiveDate::parse_from_str(&other.as_text(), DATE_FORMAT)
                    .map(|d| *value = d)
                    .is_ok(),
            },
            GeneKind::Time(value) => match scalar {
                Scalar::Time(t) => {
                    *value = t;
                    true
                }
                Scalar::DateTime(dt) => {
                    *value = dt.time();
                    true
                }
                other => NaiveTime::parse_from_str(&other.as_text(), TIME_FORMAT)
                    .map(|t| *value = t)
                    .is_ok(),
            },
            GeneKind::DateTime(value) => match scalar {
                Scalar::DateTime(dt) => {
                    *value = dt;
                    true
                }
                Scalar::Date(d) => {
                    *value = d.and_time(NaiveTime::default());
                    true
                }
                other => NaiveDateTime::parse_from_str(&other.as_text(), DATE_TIME_FORMAT)
                    .map(|dt| *value = dt)
                    .is_ok(),
            },
            GeneKind::Object { .. } | GeneKind::Array { .. } | GeneKind::Map { .. } => {
                debug!(node = %id, source = %source_variant, "no conversion into composite gene");
                false
            }
            _ => false,
        };
        Ok(bound)
    }

    fn bind_base64(&mut self, data: NodeId, scalar: Scalar) -> GeneResult<bool> {
        let text = scalar.as_text();
        let decoded = STANDARD
            .decode(text.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or(text);
        match &mut self.node_mut(data)?.kind {
            GeneKind::String { value, min_len, max_len } => {
                if !(*min_len..=*max_len).contains(&decoded.chars().count()) {
                    return Ok(false);
                }
                *value = decoded;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
