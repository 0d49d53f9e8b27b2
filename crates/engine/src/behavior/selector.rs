use std::cmp::Ordering;

use crate::content::{BehaviorDef, BehaviorId, ContentCatalog, StatRef};
use crate::world::{EntityId, WorldState};

use super::{ContentIntegrityError, PriorityTieBreak};

/// `current value - threshold` for the behavior's trigger, `None` when the
/// character (or, for conditions, every building) has no value for it.
/// The behavior is eligible when the margin is `<= 0`.
pub(crate) fn trigger_margin(
    catalog: &ContentCatalog,
    world: &WorldState,
    character: EntityId,
    behavior: &BehaviorDef,
) -> Result<Option<f32>, ContentIntegrityError> {
    let value = match behavior.trigger {
        StatRef::Need(need) => {
            catalog
                .need(need)
                .ok_or(ContentIntegrityError::MissingNeed(need))?;
            world.need(character, need)
        }
        StatRef::Condition(condition) => {
            catalog
                .condition(condition)
                .ok_or(ContentIntegrityError::MissingCondition(condition))?;
            world
                .condition_values()
                .filter(|(_, id, _)| *id == condition)
                .map(|(_, _, value)| value)
                .min_by(f32::total_cmp)
        }
    };
    Ok(value.map(|value| value - behavior.threshold))
}

/// Behaviors whose trigger currently holds, highest priority first.
pub fn eligible_behaviors(
    catalog: &ContentCatalog,
    world: &WorldState,
    character: EntityId,
    tie_break: PriorityTieBreak,
) -> Result<Vec<BehaviorId>, ContentIntegrityError> {
    let mut eligible = Vec::new();
    for behavior in catalog.behaviors() {
        let Some(margin) = trigger_margin(catalog, world, character, behavior)? else {
            continue;
        };
        if margin <= 0.0 {
            eligible.push((behavior.id, behavior.priority, margin));
        }
    }

    eligible.sort_by(|a, b| {
        let by_priority = b.1.cmp(&a.1);
        let by_tie_break = match tie_break {
            PriorityTieBreak::CatalogOrder => Ordering::Equal,
            PriorityTieBreak::MostUrgent => a.2.total_cmp(&b.2),
        };
        by_priority.then(by_tie_break).then(a.0.cmp(&b.0))
    });
    Ok(eligible.into_iter().map(|(id, _, _)| id).collect())
}
