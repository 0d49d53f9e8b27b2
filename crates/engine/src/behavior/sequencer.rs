use tracing::{debug, warn};

use crate::content::{BehaviorActionDef, BehaviorActionKind, TargetSelection};
use crate::world::EntityId;

use super::resolver::{resolve_target, TargetStatus};
use super::runner::{advance_interaction, InteractionStatus};
use super::selector::eligible_behaviors;
use super::{
    BehaviorContext, BehaviorError, BehaviorEvent, BehaviorPhase, CharacterBehaviorState,
    ContentIntegrityError, Tick,
};

/// Where a character's pipeline stopped on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NoEligibleBehavior,
    Waiting,
    Travelling,
    Unresolved,
    Interacting,
    /// The current action finished and the next one is active.
    Advanced,
    /// The last action finished; the next tick selects again.
    Finished,
    StallReset,
}

/// Runs one simulated tick of the behavior pipeline for `character`.
///
/// Each stage may end the tick early: select, idle wait, target acquisition,
/// interaction, then advance along the behavior's action chain.
pub fn tick_character(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
) -> Result<TickOutcome, BehaviorError> {
    if state.phase == BehaviorPhase::Unselected && !select(context, character, state)? {
        return Ok(TickOutcome::NoEligibleBehavior);
    }

    let Some(action_id) = state.phase.action() else {
        return Ok(TickOutcome::NoEligibleBehavior);
    };
    let catalog = context.catalog;
    let action = catalog
        .behavior_action(action_id)
        .ok_or(ContentIntegrityError::MissingBehaviorAction(action_id))?;
    let behavior = catalog
        .behavior(action.behavior)
        .ok_or(ContentIntegrityError::MissingBehavior(action.behavior))?;

    if let BehaviorPhase::Waiting { started_at, .. } = state.phase {
        if context.now.saturating_sub(started_at) < action.idle_duration_ticks {
            return Ok(TickOutcome::Waiting);
        }
        return advance(context, character, state, action);
    }

    match resolve_target(context, character, state, action, behavior)? {
        TargetStatus::Ready => state.stalled_ticks = 0,
        TargetStatus::Travelling => {
            state.stalled_ticks = 0;
            return Ok(TickOutcome::Travelling);
        }
        TargetStatus::Unresolved => return Ok(record_stall(context, character, state)),
    }

    if action.kind != BehaviorActionKind::Idle {
        let Some(target) = state.target else {
            return Ok(record_stall(context, character, state));
        };
        match advance_interaction(context, character, state, action, behavior, target)? {
            InteractionStatus::InProgress => return Ok(TickOutcome::Interacting),
            InteractionStatus::Completed => {}
        }
    }

    advance(context, character, state, action)
}

/// Picks the highest ranked eligible behavior and enters its root action.
fn select(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
) -> Result<bool, BehaviorError> {
    state.clear();
    let candidates = eligible_behaviors(
        context.catalog,
        context.world,
        character,
        context.config.tie_break,
    )?;
    let Some(&behavior) = candidates.first() else {
        return Ok(false);
    };
    let root = context
        .catalog
        .root_behavior_action(behavior)
        .ok_or(ContentIntegrityError::MissingRootBehaviorAction(behavior))?;

    state.candidates = candidates;
    enter_action(state, root, context.now);
    context
        .events
        .emit(BehaviorEvent::BehaviorSelected { character, behavior });
    debug!(character = ?character, behavior = ?behavior, "behavior_selected");
    Ok(true)
}

fn enter_action(state: &mut CharacterBehaviorState, action: &BehaviorActionDef, now: Tick) {
    state.stalled_ticks = 0;
    state.phase = if action.kind == BehaviorActionKind::Idle {
        BehaviorPhase::Waiting {
            action: action.id,
            started_at: now,
        }
    } else {
        BehaviorPhase::Targeting {
            action: action.id,
            started_at: now,
        }
    };
}

/// Moves to the next action, keeping the target only for `SearchOrContinue`.
fn advance(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    action: &BehaviorActionDef,
) -> Result<TickOutcome, BehaviorError> {
    let Some(next_id) = action.next else {
        state.clear();
        context
            .events
            .emit(BehaviorEvent::BehaviorFinished { character });
        debug!(character = ?character, "behavior_finished");
        return Ok(TickOutcome::Finished);
    };
    let next = context
        .catalog
        .behavior_action(next_id)
        .ok_or(ContentIntegrityError::MissingBehaviorAction(next_id))?;

    state.path.clear();
    if next.target_selection != TargetSelection::SearchOrContinue {
        state.target = None;
    }
    enter_action(state, next, context.now);
    Ok(TickOutcome::Advanced)
}

fn record_stall(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
) -> TickOutcome {
    state.stalled_ticks = state.stalled_ticks.saturating_add(1);
    let max_stall_ticks = context.config.max_stall_ticks;
    if max_stall_ticks == 0 || state.stalled_ticks < max_stall_ticks {
        return TickOutcome::Unresolved;
    }
    warn!(
        character = ?character,
        stalled_ticks = state.stalled_ticks,
        "behavior_stall_reset"
    );
    state.clear();
    context
        .events
        .emit(BehaviorEvent::BehaviorReset { character });
    TickOutcome::StallReset
}
