//! Bind-direction rule.
//!
//! When two genes are linked, the value of the variant that is more likely
//! to be authoritative flows into the other one. Keys and persisted data
//! rank first, strings last.

use apiforge_gene::GeneVariant;

/// Rank of a variant as a binding source; lower wins. `None` is unranked.
pub fn binding_priority(v: GeneVariant) -> Option<u8> {
    use GeneVariant::*;
    Some(match v {
        SqlPrimaryKey | SqlForeignKey | SqlAutoIncrement | ImmutableData => 0,
        Date | Time | DateTime => 1,
        Boolean => 2,
        Integer => 3,
        Long => 4,
        Float => 5,
        Double => 6,
        Array | Object | Enum | CyclePlaceholder | Map => 7,
        String | Base64 => 8,
        Optional | LimitPlaceholder => return None,
    })
}

/// Which side of a proposed link holds already-persisted data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExistingData {
    Source,
    Target,
}

/// Outcome of [`resolve_direction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Keep the proposed source → target.
    AsAsserted,
    /// Swap source and target.
    Reversed,
}

/// Decide the direction of a proposed `source → target` link.
///
/// Persisted data is never overwritten, so it always ends up as the source.
/// Otherwise the higher-ranked variant becomes the source; ties and unranked
/// variants keep the proposal.
pub fn resolve_direction(
    source: GeneVariant,
    target: GeneVariant,
    existing: Option<ExistingData>,
) -> Direction {
    match existing {
        Some(ExistingData::Source) => return Direction::AsAsserted,
        Some(ExistingData::Target) => return Direction::Reversed,
        None => {}
    }
    match (binding_priority(source), binding_priority(target)) {
        (Some(s), Some(t)) if t < s => Direction::Reversed,
        _ => Direction::AsAsserted,
    }
}
