use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::content::{
    BehaviorActionDef, BehaviorActionKind, BehaviorDef, StatRef, TargetSelection,
};
use crate::world::{EntityId, EntityKind, Vec2, WorldState};

use super::{
    BehaviorContext, BehaviorError, BehaviorEvent, CharacterBehaviorState, ContentIntegrityError,
};

/// Targets currently claimed by characters, rebuilt before every character's
/// pipeline call so a released target is free again on the same tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservations {
    holders_by_target: BTreeMap<EntityId, EntityId>,
}

impl Reservations {
    pub fn from_states<'a>(
        states: impl IntoIterator<Item = (EntityId, &'a CharacterBehaviorState)>,
    ) -> Self {
        let mut reservations = Self::default();
        for (character, state) in states {
            if let Some(target) = state.target() {
                reservations.reserve(target, character);
            }
        }
        reservations
    }

    /// First claim wins.
    pub fn reserve(&mut self, target: EntityId, character: EntityId) {
        self.holders_by_target.entry(target).or_insert(character);
    }

    pub fn holder(&self, target: EntityId) -> Option<EntityId> {
        self.holders_by_target.get(&target).copied()
    }

    pub fn is_reserved_by_other(&self, target: EntityId, character: EntityId) -> bool {
        self.holder(target)
            .is_some_and(|holder| holder != character)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// In range (or no target needed); the interaction may run this tick.
    Ready,
    /// A path is cached and the character is moving.
    Travelling,
    /// No usable target this tick.
    Unresolved,
}

/// Ensures the character has a reachable target for `action`.
pub fn resolve_target(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    action: &BehaviorActionDef,
    behavior: &BehaviorDef,
) -> Result<TargetStatus, BehaviorError> {
    if action.kind == BehaviorActionKind::Idle {
        return Ok(TargetStatus::Ready);
    }
    let origin = context
        .world
        .position(character)
        .ok_or(BehaviorError::UnknownCharacter(character))?;

    if let Some(target) = state.target() {
        return Ok(track_existing_target(context, character, state, origin, target));
    }

    let interactions = context.catalog.search_interactions(action, behavior);
    if interactions.is_empty() && action.target_selection == TargetSelection::Explicit {
        let error = match action.interaction {
            Some(interaction) => ContentIntegrityError::MissingInteraction(interaction),
            None => ContentIntegrityError::ActionWithoutInteraction(action.id),
        };
        return Err(error.into());
    }
    let sources = interactions
        .iter()
        .map(|interaction| interaction.target)
        .collect::<BTreeSet<_>>();

    let held = context.world.held_items(character).to_vec();
    for item in held {
        let Some(entity) = context.world.entity(item) else {
            warn!(character = ?character, item = ?item, "held_item_missing");
            context.world.forget_held_item(character, item);
            continue;
        };
        if sources.contains(&entity.template) {
            acquire(context, character, state, item, Vec::new());
            return Ok(TargetStatus::Ready);
        }
    }

    let mut candidates = context
        .world
        .physical_entities()
        .filter(|entity| entity.id != character && sources.contains(&entity.template))
        .filter(|entity| {
            entity.kind != EntityKind::Item
                || !context.reservations.is_reserved_by_other(entity.id, character)
        })
        .filter(|entity| {
            entity.kind != EntityKind::Building
                || needs_attention(&*context.world, entity.id, behavior)
        })
        .filter_map(|entity| {
            let position = context.world.position(entity.id)?;
            Some((origin.distance_sq(position), entity.id, position))
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let arrival_radius_sq = context.config.arrival_radius_sq();
    for (distance_sq, candidate, position) in candidates {
        if distance_sq < arrival_radius_sq {
            acquire(context, character, state, candidate, Vec::new());
            return Ok(TargetStatus::Ready);
        }
        let path = context.pathfinder.find_path(origin, position);
        if !path.is_empty() {
            acquire(context, character, state, candidate, path);
            return Ok(TargetStatus::Travelling);
        }
    }

    debug!(character = ?character, action = %action.def_name, "no_reachable_target");
    Ok(TargetStatus::Unresolved)
}

/// Condition-triggered behaviors only go after buildings that are themselves
/// at or below the trigger threshold.
fn needs_attention(world: &WorldState, building: EntityId, behavior: &BehaviorDef) -> bool {
    match behavior.trigger {
        StatRef::Need(_) => true,
        StatRef::Condition(condition) => world
            .building_condition(building, condition)
            .is_some_and(|value| value <= behavior.threshold),
    }
}

fn track_existing_target(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    origin: Vec2,
    target: EntityId,
) -> TargetStatus {
    let Some(position) = context.world.position(target) else {
        warn!(character = ?character, target = ?target, "target_lost");
        state.drop_target();
        context
            .events
            .emit(BehaviorEvent::TargetLost { character, target });
        return TargetStatus::Unresolved;
    };
    context.reservations.reserve(target, character);

    if origin.distance_sq(position) < context.config.arrival_radius_sq() {
        state.path.clear();
        return TargetStatus::Ready;
    }
    let path = context.pathfinder.find_path(origin, position);
    if path.is_empty() {
        state.path.clear();
        return TargetStatus::Unresolved;
    }
    state.path = path;
    TargetStatus::Travelling
}

fn acquire(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    target: EntityId,
    path: Vec<Vec2>,
) {
    state.set_target(target, path);
    context.reservations.reserve(target, character);
    context
        .events
        .emit(BehaviorEvent::TargetAcquired { character, target });
}
