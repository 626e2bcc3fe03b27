//! Name heuristics shared by the matchers.

use apiforge_gene::{GeneKind, GeneResult, GeneTree, GeneVariant, NodeId};

/// Names too generic to identify a field on their own.
const GENERAL_NAMES: [&str; 6] = ["id", "name", "value", "key", "body", "data"];

pub fn is_general_name(name: &str) -> bool {
    GENERAL_NAMES.iter().any(|g| g.eq_ignore_ascii_case(name))
}

/// Whether a field called `field_name` inside an object of type `ref_type`
/// is the thing another side calls `other_name`.
pub fn find_field(field_name: &str, ref_type: Option<&str>, other_name: &str) -> bool {
    field_name.eq_ignore_ascii_case(other_name)
        || ref_type.is_some_and(|r| format!("{r}{field_name}").eq_ignore_ascii_case(other_name))
}

fn normalize(key: &str) -> String {
    let lowered: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    match lowered.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => lowered,
    }
}

/// Edit distance between two keys after normalising case, `_`/`-` and a
/// plural `s`. Zero means the keys name the same thing.
pub fn score_of_match(a: &str, b: &str) -> usize {
    strsim::levenshtein(&normalize(a), &normalize(b))
}

/// Nearest object strictly above `node`.
fn enclosing_object(tree: &GeneTree, node: NodeId) -> GeneResult<Option<NodeId>> {
    let mut current = tree.node(node)?.parent();
    while let Some(id) = current {
        if tree.variant(id)? == GeneVariant::Object {
            return Ok(Some(id));
        }
        current = tree.node(id)?.parent();
    }
    Ok(None)
}

/// Field name qualified by its object when the bare name is too generic.
pub fn modify_field_name(tree: &GeneTree, object: NodeId, field: NodeId) -> GeneResult<String> {
    let name = tree.name(field)?;
    if !is_general_name(name) {
        return Ok(name.to_string());
    }
    let prefix = match tree.kind(object)? {
        GeneKind::Object {
            ref_type: Some(r), ..
        } => r.clone(),
        _ => tree.name(object)?.to_string(),
    };
    Ok(format!("{prefix}{name}"))
}

/// Ordered `(key, node)` pairs naming every value gene of a parameter.
///
/// Collection contents are not entered. Generic names are qualified by the
/// enclosing object type and then by each path token, most specific first;
/// the first node to claim a key keeps it.
pub fn gene_name_map(tree: &GeneTree, tokens: &[String]) -> GeneResult<Vec<(String, NodeId)>> {
    let mut out: Vec<(String, NodeId)> = Vec::new();
    let root = tree.root();
    let view = tree.flat_view(root, |n| {
        matches!(n.variant(), GeneVariant::Array | GeneVariant::Map | GeneVariant::Base64)
    });
    for (id, node) in view {
        let variant = node.variant();
        if variant.is_placeholder()
            || matches!(
                variant,
                GeneVariant::Object | GeneVariant::Optional | GeneVariant::SqlPrimaryKey
            )
        {
            continue;
        }
        let name = node.name.as_str();
        let mut keys = Vec::new();
        if is_general_name(name) {
            if let Some(obj) = enclosing_object(tree, id)? {
                if let GeneKind::Object {
                    ref_type: Some(r), ..
                } = tree.kind(obj)?
                {
                    keys.push(format!("{r}{name}"));
                } else if obj != root {
                    keys.push(format!("{}{name}", tree.name(obj)?));
                }
            }
            keys.extend(tokens.iter().map(|t| format!("{t}{name}")));
        }
        if keys.is_empty() {
            keys.push(name.to_string());
        }
        for k in keys {
            if !out.iter().any(|(existing, _)| *existing == k) {
                out.push((k, id));
            }
        }
    }
    Ok(out)
}
