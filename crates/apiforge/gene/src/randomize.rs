//! Random value generation for gene subtrees.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::GeneResult;
use crate::node::{GeneKind, NodeId};
use crate::tree::GeneTree;

/// Probability that randomizing an optional gene leaves it active.
pub const OPTIONAL_ACTIVE_PROB: f64 = 0.5;
/// Year range used for random dates.
pub const MIN_YEAR: i32 = 1970;
pub const MAX_YEAR: i32 = 2030;
/// Attempts made to draw a different value when one is requested.
const NEW_VALUE_ATTEMPTS: usize = 10;

pub(crate) fn random_text<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

pub(crate) fn random_date<R: Rng + ?Sized>(rng: &mut R) -> NaiveDate {
    let year = rng.gen_range(MIN_YEAR..=MAX_YEAR);
    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=28);
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

pub(crate) fn random_time<R: Rng + ?Sized>(rng: &mut R) -> NaiveTime {
    NaiveTime::from_hms_opt(rng.gen_range(0..24), rng.gen_range(0..60), rng.gen_range(0..60))
        .unwrap_or_default()
}

/// Fresh value of the same leaf variant within its bounds.
///
/// Returns `None` for kinds that are not randomizable leaves.
fn random_leaf<R: Rng + ?Sized>(kind: &GeneKind, rng: &mut R) -> Option<GeneKind> {
    Some(match kind {
        GeneKind::Integer { min, max, .. } => GeneKind::Integer {
            value: rng.gen_range(*min..=*max),
            min: *min,
            max: *max,
        },
        GeneKind::Long { min, max, .. } => GeneKind::Long {
            value: rng.gen_range(*min..=*max),
            min: *min,
            max: *max,
        },
        GeneKind::Float { min, max, .. } => GeneKind::Float {
            value: if min < max { rng.gen_range(*min..*max) } else { *min },
            min: *min,
            max: *max,
        },
        GeneKind::Double { min, max, .. } => GeneKind::Double {
            value: if min < max { rng.gen_range(*min..*max) } else { *min },
            min: *min,
            max: *max,
        },
        GeneKind::Boolean(_) => GeneKind::Boolean(rng.gen_bool(0.5)),
        GeneKind::String { min_len, max_len, .. } => {
            let len = rng.gen_range(*min_len..=*max_len);
            GeneKind::String {
                value: random_text(rng, len),
                min_len: *min_len,
                max_len: *max_len,
            }
        }
        GeneKind::Enum { values, .. } => GeneKind::Enum {
            values: values.clone(),
            index: if values.is_empty() { 0 } else { rng.gen_range(0..values.len()) },
        },
        GeneKind::Date(_) => GeneKind::Date(random_date(rng)),
        GeneKind::Time(_) => GeneKind::Time(random_time(rng)),
        GeneKind::DateTime(_) => GeneKind::DateTime(random_date(rng).and_time(random_time(rng))),
        _ => return None,
    })
}

impl GeneTree {
    /// Assign random values to the subtree at `id`, respecting every bound.
    ///
    /// With `force_new_value` a leaf whose domain allows it is guaranteed to
    /// end up with a value different from the current one. Keys, immutable
    /// data and placeholders are left untouched.
    pub fn randomize<R: Rng + ?Sized>(&mut self, id: NodeId, rng: &mut R, force_new_value: bool) -> GeneResult<()> {
        let kind = self.kind(id)?.clone();
        if let Some(mut fresh) = random_leaf(&kind, rng) {
            if force_new_value && self.is_mutable(id)? {
                if fresh == kind {
                    match &mut fresh {
                        GeneKind::Boolean(b) => *b = !*b,
                        GeneKind::Enum { values, index } => {
                            *index = (*index + rng.gen_range(1..values.len())) % values.len();
                        }
                        _ => {}
                    }
                }
                let mut attempts = 0;
                while fresh == kind && attempts < NEW_VALUE_ATTEMPTS {
                    if let Some(next) = random_leaf(&kind, rng) {
                        fresh = next;
                    }
                    attempts += 1;
                }
            }
            self.node_mut(id)?.kind = fresh;
            return Ok(());
        }

        match kind {
            GeneKind::Object { fields, .. } => {
                for f in fields {
                    self.randomize(f, rng, force_new_value)?;
                }
            }
            GeneKind::Optional { gene, .. } => {
                self.set_optional_active(id, rng.gen_bool(OPTIONAL_ACTIVE_PROB))?;
                self.randomize(gene, rng, force_new_value)?;
            }
            GeneKind::SqlPrimaryKey { gene, .. } => self.randomize(gene, rng, force_new_value)?,
            GeneKind::Base64 { data } => self.randomize(data, rng, force_new_value)?,
            GeneKind::Array {
                template,
                elements,
                max_size,
            } => {
                for e in elements {
                    self.release(e)?;
                }
                let n = rng.gen_range(0..=max_size);
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.new_element(id, template, rng)?);
                }
                self.set_collection(id, items)?;
            }
            GeneKind::Map {
                template,
                entries,
                max_size,
            } => {
                for e in entries {
                    self.release(e)?;
                }
                let n = rng.gen_range(0..=max_size);
                let mut keys = BTreeSet::new();
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    let entry = self.new_entry(id, template, &mut keys, rng)?;
                    items.push(entry);
                }
                self.set_collection(id, items)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Randomize the whole tree.
    pub fn randomize_all<R: Rng + ?Sized>(&mut self, rng: &mut R) -> GeneResult<()> {
        self.randomize(self.root(), rng, false)
    }

    /// Copy `template` under `collection` as a randomized, unattached element.
    pub(crate) fn new_element<R: Rng + ?Sized>(
        &mut self,
        collection: NodeId,
        template: NodeId,
        rng: &mut R,
    ) -> GeneResult<NodeId> {
        let copy = self.copy_subtree(template)?;
        let element = self.graft(copy, Some(collection));
        self.randomize(element, rng, false)?;
        Ok(element)
    }

    /// Like [`new_element`](Self::new_element) but named by a key not in `used`.
    pub(crate) fn new_entry<R: Rng + ?Sized>(
        &mut self,
        map: NodeId,
        template: NodeId,
        used: &mut BTreeSet<String>,
        rng: &mut R,
    ) -> GeneResult<NodeId> {
        let entry = self.new_element(map, template, rng)?;
        let mut key = String::new();
        while key.is_empty() || used.contains(&key) {
            let len = rng.gen_range(3..=8);
            key = random_text(rng, len);
        }
        used.insert(key.clone());
        self.node_mut(entry)?.name = key;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn bounded_integer_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = GeneTree::integer_in("n", 3, 7);
        for _ in 0..100 {
            tree.randomize(tree.root(), &mut rng, false).unwrap();
            match tree.kind(tree.root()).unwrap() {
                GeneKind::Integer { value, .. } => assert!((3..=7).contains(value)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn force_new_value_changes_boolean() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = GeneTree::boolean("b");
        for _ in 0..20 {
            let before = tree.clone();
            tree.randomize(tree.root(), &mut rng, true).unwrap();
            assert_ne!(tree, before);
        }
    }

    #[test]
    fn array_size_within_bound() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = GeneTree::array("a", GeneTree::string_in("s", 1, 4), 3);
        for _ in 0..50 {
            tree.randomize_all(&mut rng).unwrap();
            assert!(tree.children(tree.root()).unwrap().len() <= 3);
        }
    }

    #[test]
    fn map_keys_are_unique() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree = GeneTree::map("m", GeneTree::integer("v"), 6);
        tree.randomize_all(&mut rng).unwrap();
        let entries = tree.children(tree.root()).unwrap();
        let keys: BTreeSet<_> = entries.iter().map(|e| tree.name(*e).unwrap().to_string()).collect();
        assert_eq!(keys.len(), entries.len());
    }

    #[test]
    fn keys_and_placeholders_are_untouched() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tree = GeneTree::object(
            "row",
            vec![
                GeneTree::auto_increment("id"),
                GeneTree::foreign_key("owner", "users", true),
                GeneTree::cycle_placeholder("parent"),
            ],
        );
        let before = tree.clone();
        tree.randomize_all(&mut rng).unwrap();
        assert_eq!(tree, before);
    }
}
