//! Resolve an extracted fund name against the directory.
//!
//! Names are compared after Unicode lowercasing and trimming. A name matches
//! an entity when the two are equal or either contains the other. Under
//! [`MatchStrategy::FirstHit`] the first such entity in directory order wins,
//! so a short extracted name like `"易方达"` resolves to whichever `易方达…`
//! fund is listed first.

use fundsync_core::{LedgerEntity, MatchStrategy};

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// First-hit match in directory order.
pub fn match_entity<'a>(name: &str, entities: &'a [LedgerEntity]) -> Option<&'a LedgerEntity> {
    match_with_strategy(name, entities, MatchStrategy::FirstHit)
}

pub fn match_with_strategy<'a>(
    name: &str,
    entities: &'a [LedgerEntity],
    strategy: MatchStrategy,
) -> Option<&'a LedgerEntity> {
    let wanted = normalize_name(name);
    if wanted.is_empty() {
        return None;
    }

    let candidates = entities.iter().filter_map(|entity| {
        let normalized = normalize_name(&entity.name);
        (!normalized.is_empty()).then_some((entity, normalized))
    });

    match strategy {
        MatchStrategy::FirstHit => candidates
            .into_iter()
            .find(|(_, n)| *n == wanted || overlaps(&wanted, n))
            .map(|(entity, _)| entity),
        MatchStrategy::Longest => {
            let mut best: Option<(&LedgerEntity, usize)> = None;
            for (entity, normalized) in candidates {
                if normalized == wanted {
                    return Some(entity);
                }
                if !overlaps(&wanted, &normalized) {
                    continue;
                }
                let len = normalized.chars().count();
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((entity, len));
                }
            }
            best.map(|(entity, _)| entity)
        }
    }
}
