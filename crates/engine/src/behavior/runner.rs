use tracing::{debug, warn};

use crate::content::{
    BehaviorActionDef, BehaviorActionKind, BehaviorDef, InteractionId, StatRef, TargetSelection,
};
use crate::world::{EntityId, EntityKind, ItemOwnership};

use super::{
    ActiveInteraction, BehaviorContext, BehaviorError, BehaviorEvent, BehaviorPhase,
    CharacterBehaviorState, ContentIntegrityError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionStatus {
    InProgress,
    Completed,
}

/// Starts or advances the interaction chain for `action` against `target`.
///
/// Fulfillments apply once on every tick the chain is active, from the tick
/// that activates its root through the tick that completes it. Node durations
/// compare strictly, so a zero-tick node finishes the tick it starts.
pub fn advance_interaction(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    action: &BehaviorActionDef,
    behavior: &BehaviorDef,
    target: EntityId,
) -> Result<InteractionStatus, BehaviorError> {
    let catalog = context.catalog;
    let (action_id, started_at, mut active) = match state.phase {
        BehaviorPhase::Targeting {
            action: action_id,
            started_at,
        } => {
            let Some(interaction) = select_interaction(context, action, behavior, target)? else {
                abandon_target(context, character, state, target);
                return Ok(InteractionStatus::InProgress);
            };
            let root = catalog
                .root_interaction_action(interaction)
                .ok_or(ContentIntegrityError::MissingRootInteractionAction(interaction))?;
            context.events.emit(BehaviorEvent::InteractionStarted {
                character,
                target,
                interaction,
            });
            debug!(
                character = ?character,
                target = ?target,
                interaction = ?interaction,
                "interaction_started"
            );
            let active = ActiveInteraction {
                interaction,
                node: root.id,
                started_at: context.now,
            };
            apply_fulfillments(context, character, target, interaction)?;
            (action_id, started_at, active)
        }
        BehaviorPhase::Interacting {
            action: action_id,
            started_at,
            interaction,
        } => {
            apply_fulfillments(context, character, target, interaction.interaction)?;
            (action_id, started_at, interaction)
        }
        BehaviorPhase::Unselected | BehaviorPhase::Waiting { .. } => {
            return Ok(InteractionStatus::Completed)
        }
    };

    let node = catalog
        .interaction_action(active.node)
        .ok_or(ContentIntegrityError::MissingInteractionAction(active.node))?;
    let elapsed = context.now.saturating_sub(active.started_at);
    let finished_node = elapsed >= node.duration_ticks;
    if finished_node {
        if let Some(next) = node.next {
            catalog
                .interaction_action(next)
                .ok_or(ContentIntegrityError::MissingInteractionAction(next))?;
            active.node = next;
            active.started_at = context.now;
        } else {
            complete(context, character, state, action, target)?;
            context.events.emit(BehaviorEvent::InteractionCompleted {
                character,
                target,
                interaction: active.interaction,
            });
            state.phase = BehaviorPhase::Targeting {
                action: action_id,
                started_at,
            };
            return Ok(InteractionStatus::Completed);
        }
    }

    state.phase = BehaviorPhase::Interacting {
        action: action_id,
        started_at,
        interaction: active,
    };
    Ok(InteractionStatus::InProgress)
}

/// First interaction available to `action` that can be performed on `target`.
fn select_interaction(
    context: &BehaviorContext<'_>,
    action: &BehaviorActionDef,
    behavior: &BehaviorDef,
    target: EntityId,
) -> Result<Option<InteractionId>, BehaviorError> {
    let interactions = context.catalog.search_interactions(action, behavior);
    if interactions.is_empty() && action.target_selection == TargetSelection::Explicit {
        let error = match action.interaction {
            Some(interaction) => ContentIntegrityError::MissingInteraction(interaction),
            None => ContentIntegrityError::ActionWithoutInteraction(action.id),
        };
        return Err(error.into());
    }
    let template = context.world.entity(target).map(|entity| entity.template);
    Ok(interactions
        .iter()
        .find(|interaction| Some(interaction.target) == template)
        .map(|interaction| interaction.id))
}

fn abandon_target(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    target: EntityId,
) {
    warn!(character = ?character, target = ?target, "target_not_interactable");
    state.drop_target();
    context
        .events
        .emit(BehaviorEvent::TargetLost { character, target });
}

/// Needs rise on the acting character, conditions on the target building.
fn apply_fulfillments(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    target: EntityId,
    interaction: InteractionId,
) -> Result<(), BehaviorError> {
    let catalog = context.catalog;
    for fulfillment in catalog.fulfillments(interaction) {
        match fulfillment.target {
            StatRef::Need(need) => {
                let max_value = catalog
                    .need(need)
                    .ok_or(ContentIntegrityError::MissingNeed(need))?
                    .max_value;
                if let Some(value) = context.world.need(character, need) {
                    let next = (value + fulfillment.increase_per_tick).min(max_value);
                    context.world.set_need(character, need, next);
                }
            }
            StatRef::Condition(condition) => {
                let max_value = catalog
                    .condition(condition)
                    .ok_or(ContentIntegrityError::MissingCondition(condition))?
                    .max_value;
                if let Some(value) = context.world.building_condition(target, condition) {
                    let next = (value + fulfillment.increase_per_tick).min(max_value);
                    context
                        .world
                        .set_building_condition(target, condition, next);
                }
            }
        }
    }
    Ok(())
}

fn complete(
    context: &mut BehaviorContext<'_>,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    action: &BehaviorActionDef,
    target: EntityId,
) -> Result<(), BehaviorError> {
    match action.kind {
        BehaviorActionKind::SystemItemPick => {
            context
                .world
                .transfer_item_ownership(target, ItemOwnership::HeldBy(character))?;
            context.events.emit(BehaviorEvent::ItemPicked {
                character,
                item: target,
            });
            debug!(character = ?character, item = ?target, "item_picked");
        }
        BehaviorActionKind::Once => {
            let is_item = context
                .world
                .entity(target)
                .is_some_and(|entity| entity.kind == EntityKind::Item);
            if is_item {
                context.world.forget_held_item(character, target);
                context.world.remove_entity(target);
                state.drop_target();
                context.events.emit(BehaviorEvent::ItemConsumed {
                    character,
                    item: target,
                });
                debug!(character = ?character, item = ?target, "item_consumed");
            }
        }
        BehaviorActionKind::Fulfill | BehaviorActionKind::Idle => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::fixtures::{
        add_behavior, add_fulfillment, add_interaction, add_need, eat_fixture, ActionShape,
        EatFixture, Harness,
    };
    use crate::behavior::{Reservations, Tick};
    use crate::content::{
        BehaviorActionId, BehaviorId, ContentCatalog, EntityTemplate, InteractionCategory,
        InteractionKind, NeedId,
    };

    fn action_def(catalog: &ContentCatalog, behavior: BehaviorId, index: usize) -> BehaviorActionDef {
        let mut cursor = catalog.root_behavior_action(behavior).expect("root").clone();
        for _ in 0..index {
            let next = cursor.next.expect("next action");
            cursor = catalog.behavior_action(next).expect("action").clone();
        }
        cursor
    }

    fn targeting(action: BehaviorActionId) -> BehaviorPhase {
        BehaviorPhase::Targeting {
            action,
            started_at: 0,
        }
    }

    fn run(
        harness: &mut Harness,
        character: EntityId,
        state: &mut CharacterBehaviorState,
        action: &BehaviorActionDef,
        target: EntityId,
        now: Tick,
    ) -> Result<InteractionStatus, BehaviorError> {
        let behavior = harness
            .catalog
            .behavior(action.behavior)
            .expect("behavior")
            .clone();
        let mut reservations = Reservations::default();
        let mut context = BehaviorContext {
            catalog: &harness.catalog,
            world: &mut harness.world,
            pathfinder: harness.pathfinder.as_ref(),
            config: &harness.config,
            events: &mut harness.events,
            reservations: &mut reservations,
            now,
        };
        advance_interaction(&mut context, character, state, action, &behavior, target)
    }

    struct Eating {
        harness: Harness,
        fixture: EatFixture,
        villager: EntityId,
        apple: EntityId,
        state: CharacterBehaviorState,
        eat_action: BehaviorActionDef,
    }

    fn eating(hunger: f32) -> Eating {
        let fixture = eat_fixture();
        let mut harness = Harness::new(fixture.catalog.clone());
        let villager = harness.spawn(fixture.villager, 0.0, 0.0);
        let apple = harness.spawn(fixture.apple, 0.0, 0.0);
        harness
            .world
            .transfer_item_ownership(apple, ItemOwnership::HeldBy(villager))
            .expect("hold");
        harness.world.set_need(villager, fixture.hunger, hunger);
        let eat_action = action_def(&harness.catalog, fixture.eat, 1);
        let mut state = CharacterBehaviorState::new();
        state.set_target(apple, Vec::new());
        state.phase = targeting(eat_action.id);
        Eating {
            harness,
            fixture,
            villager,
            apple,
            state,
            eat_action,
        }
    }

    #[test]
    fn three_tick_interaction_adds_exactly_fifteen() {
        let mut eating = eating(0.0);
        let mut hunger_by_tick = Vec::new();
        for now in 0..2 {
            let status = run(
                &mut eating.harness,
                eating.villager,
                &mut eating.state,
                &eating.eat_action,
                eating.apple,
                now,
            )
            .expect("advance");
            assert_eq!(status, InteractionStatus::InProgress);
            assert_eq!(
                eating.state.phase().active_interaction().map(|active| active.interaction),
                Some(eating.fixture.eat_apple)
            );
            hunger_by_tick.push(
                eating
                    .harness
                    .world
                    .need(eating.villager, eating.fixture.hunger)
                    .expect("hunger"),
            );
        }
        assert_eq!(hunger_by_tick, vec![5.0, 10.0]);

        let status = run(
            &mut eating.harness,
            eating.villager,
            &mut eating.state,
            &eating.eat_action,
            eating.apple,
            2,
        )
        .expect("advance");
        assert_eq!(status, InteractionStatus::Completed);
        assert_eq!(
            eating.harness.world.need(eating.villager, eating.fixture.hunger),
            Some(15.0)
        );
    }

    #[test]
    fn fulfillment_clamps_at_need_max() {
        let mut eating = eating(93.0);
        for now in 0..=2 {
            run(
                &mut eating.harness,
                eating.villager,
                &mut eating.state,
                &eating.eat_action,
                eating.apple,
                now,
            )
            .expect("advance");
        }
        assert_eq!(
            eating.harness.world.need(eating.villager, eating.fixture.hunger),
            Some(100.0)
        );
    }

    #[test]
    fn completing_once_item_use_consumes_the_item() {
        let mut eating = eating(0.0);
        for now in 0..=2 {
            run(
                &mut eating.harness,
                eating.villager,
                &mut eating.state,
                &eating.eat_action,
                eating.apple,
                now,
            )
            .expect("advance");
        }
        assert!(!eating.harness.world.contains(eating.apple));
        assert!(eating.harness.world.held_items(eating.villager).is_empty());
        assert_eq!(eating.state.target(), None);
        assert!(eating.state.phase().active_interaction().is_none());
        assert!(eating
            .harness
            .events
            .iter_emitted_so_far()
            .any(|event| matches!(event, BehaviorEvent::ItemConsumed { .. })));
    }

    #[test]
    fn completing_pickup_moves_item_into_held_list() {
        let fixture = eat_fixture();
        let mut harness = Harness::new(fixture.catalog.clone());
        let villager = harness.spawn(fixture.villager, 0.0, 0.0);
        let apple = harness.spawn(fixture.apple, 0.3, 0.0);
        let pick_action = action_def(&harness.catalog, fixture.eat, 0);
        let mut state = CharacterBehaviorState::new();
        state.set_target(apple, Vec::new());
        state.phase = targeting(pick_action.id);

        let first = run(&mut harness, villager, &mut state, &pick_action, apple, 0).expect("start");
        assert_eq!(first, InteractionStatus::InProgress);
        assert_eq!(
            state.phase().active_interaction().map(|active| active.interaction),
            Some(fixture.pick_apple)
        );

        let second = run(&mut harness, villager, &mut state, &pick_action, apple, 1).expect("finish");
        assert_eq!(second, InteractionStatus::Completed);
        assert!(harness.world.contains(apple));
        assert_eq!(harness.world.held_items(villager), &[apple]);
        assert_eq!(
            harness.world.entity(apple).and_then(|entity| entity.ownership),
            Some(ItemOwnership::HeldBy(villager))
        );
        assert!(harness
            .world
            .physical_entities()
            .all(|entity| entity.id != apple));
        assert_eq!(state.target(), Some(apple));
    }

    struct Chain {
        harness: Harness,
        villager: EntityId,
        rock: EntityId,
        hunger: NeedId,
        action: BehaviorActionDef,
    }

    fn chain(durations: &[u64]) -> Chain {
        let mut builder = ContentCatalog::builder();
        let hunger = add_need(&mut builder, "need.hunger", 100.0, 0.0, 0.0);
        let villager_template = builder.add_template(EntityTemplate::character("villager", 3.0));
        let rock_template = builder.add_template(EntityTemplate::building("rock"));
        let sit = add_interaction(
            &mut builder,
            "interaction.sit",
            InteractionKind::Building,
            InteractionCategory::Repeat,
            rock_template,
            durations,
        );
        add_fulfillment(&mut builder, sit, StatRef::Need(hunger), 1.0);
        let rest = add_behavior(
            &mut builder,
            "behavior.rest",
            StatRef::Need(hunger),
            50.0,
            1,
            &[ActionShape::explicit(BehaviorActionKind::Fulfill, sit)],
        );
        let mut harness = Harness::new(builder.build());
        let villager = harness.spawn(villager_template, 0.0, 0.0);
        let rock = harness.spawn(rock_template, 0.2, 0.0);
        let action = action_def(&harness.catalog, rest, 0);
        Chain {
            harness,
            villager,
            rock,
            hunger,
            action,
        }
    }

    #[test]
    fn zero_duration_root_completes_on_start_tick() {
        let mut chain = chain(&[0]);
        let mut state = CharacterBehaviorState::new();
        state.set_target(chain.rock, Vec::new());
        state.phase = targeting(chain.action.id);
        let status = run(
            &mut chain.harness,
            chain.villager,
            &mut state,
            &chain.action,
            chain.rock,
            4,
        )
        .expect("advance");
        assert_eq!(status, InteractionStatus::Completed);
        assert_eq!(chain.harness.world.need(chain.villager, chain.hunger), Some(1.0));
        assert_eq!(state.target(), Some(chain.rock));
    }

    #[test]
    fn chained_nodes_restart_the_clock() {
        let mut chain = chain(&[1, 2]);
        let mut state = CharacterBehaviorState::new();
        state.set_target(chain.rock, Vec::new());
        state.phase = targeting(chain.action.id);

        let statuses = (10..=13)
            .map(|now| {
                run(
                    &mut chain.harness,
                    chain.villager,
                    &mut state,
                    &chain.action,
                    chain.rock,
                    now,
                )
                .expect("advance")
            })
            .collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![
                InteractionStatus::InProgress,
                InteractionStatus::InProgress,
                InteractionStatus::InProgress,
                InteractionStatus::Completed,
            ]
        );
        assert_eq!(chain.harness.world.need(chain.villager, chain.hunger), Some(4.0));
    }

    #[test]
    fn interaction_without_root_action_is_integrity_error() {
        let mut chain = chain(&[]);
        let mut state = CharacterBehaviorState::new();
        state.set_target(chain.rock, Vec::new());
        state.phase = targeting(chain.action.id);
        let err = run(
            &mut chain.harness,
            chain.villager,
            &mut state,
            &chain.action,
            chain.rock,
            0,
        )
        .expect_err("missing root");
        assert!(matches!(
            err,
            BehaviorError::Integrity(ContentIntegrityError::MissingRootInteractionAction(_))
        ));
    }

    #[test]
    fn target_without_matching_interaction_is_dropped() {
        let mut chain = chain(&[1]);
        let stranger = chain.harness.spawn(
            chain
                .harness
                .world
                .entity(chain.villager)
                .expect("villager")
                .template,
            0.1,
            0.0,
        );
        let mut state = CharacterBehaviorState::new();
        state.set_target(stranger, Vec::new());
        state.phase = targeting(chain.action.id);
        let status = run(
            &mut chain.harness,
            chain.villager,
            &mut state,
            &chain.action,
            stranger,
            0,
        )
        .expect("advance");
        assert_eq!(status, InteractionStatus::InProgress);
        assert_eq!(state.target(), None);
    }
}
