//! Catalog and world helpers shared by the behavior pipeline tests.

use crate::content::{
    BehaviorActionDef, BehaviorActionId, BehaviorActionKind, BehaviorDef, BehaviorId,
    CatalogBuilder, ConditionDef, ConditionId, ContentCatalog, EntityTemplate, FulfillmentDef,
    InteractionActionDef, InteractionActionId, InteractionCategory, InteractionDef, InteractionId,
    InteractionKind, NeedDef, NeedId, StatRef, TargetSelection, TemplateId,
};
use crate::world::{EntityId, Pathfinder, StraightLinePathfinder, Vec2, WorldState};

use super::{
    tick_character, BehaviorContext, BehaviorError, BehaviorEventBus, CharacterBehaviorState,
    Reservations, SimConfig, Tick, TickOutcome,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ActionShape {
    pub kind: BehaviorActionKind,
    pub selection: TargetSelection,
    pub interaction: Option<InteractionId>,
    pub idle_ticks: u64,
}

impl ActionShape {
    pub(crate) fn idle(ticks: u64) -> Self {
        Self {
            kind: BehaviorActionKind::Idle,
            selection: TargetSelection::Explicit,
            interaction: None,
            idle_ticks: ticks,
        }
    }

    pub(crate) fn search(kind: BehaviorActionKind) -> Self {
        Self {
            kind,
            selection: TargetSelection::Search,
            interaction: None,
            idle_ticks: 0,
        }
    }

    pub(crate) fn search_or_continue(kind: BehaviorActionKind) -> Self {
        Self {
            selection: TargetSelection::SearchOrContinue,
            ..Self::search(kind)
        }
    }

    pub(crate) fn explicit(kind: BehaviorActionKind, interaction: InteractionId) -> Self {
        Self {
            kind,
            selection: TargetSelection::Explicit,
            interaction: Some(interaction),
            idle_ticks: 0,
        }
    }
}

pub(crate) fn add_need(
    builder: &mut CatalogBuilder,
    name: &str,
    max_value: f32,
    initial_value: f32,
    decrease_per_tick: f32,
) -> NeedId {
    builder.add_need(NeedDef {
        id: NeedId(0),
        def_name: name.to_string(),
        label: name.to_string(),
        max_value,
        initial_value,
        decrease_per_tick,
    })
}

pub(crate) fn add_condition(
    builder: &mut CatalogBuilder,
    name: &str,
    max_value: f32,
    initial_value: f32,
    decrease_per_tick: f32,
) -> ConditionId {
    builder.add_condition(ConditionDef {
        id: ConditionId(0),
        def_name: name.to_string(),
        label: name.to_string(),
        max_value,
        initial_value,
        decrease_per_tick,
    })
}

/// Adds an interaction with a linear chain of nodes, one per duration.
pub(crate) fn add_interaction(
    builder: &mut CatalogBuilder,
    name: &str,
    kind: InteractionKind,
    category: InteractionCategory,
    target: TemplateId,
    durations: &[u64],
) -> InteractionId {
    let interaction = builder.add_interaction(InteractionDef {
        id: InteractionId(0),
        def_name: name.to_string(),
        label: name.to_string(),
        kind,
        category,
        target,
    });
    for (index, duration_ticks) in durations.iter().enumerate() {
        let id = builder.next_interaction_action_id();
        let next = (index + 1 < durations.len()).then(|| InteractionActionId(id.0 + 1));
        builder.add_interaction_action(InteractionActionDef {
            id,
            def_name: format!("{name}.{index}"),
            interaction,
            duration_ticks: *duration_ticks,
            next,
            is_root: index == 0,
        });
    }
    interaction
}

pub(crate) fn add_fulfillment(
    builder: &mut CatalogBuilder,
    interaction: InteractionId,
    target: StatRef,
    increase_per_tick: f32,
) {
    builder.add_fulfillment(FulfillmentDef {
        def_name: format!("fulfillment.{}", interaction.0),
        interaction,
        target,
        increase_per_tick,
    });
}

/// Adds a behavior whose actions run in the given order.
pub(crate) fn add_behavior(
    builder: &mut CatalogBuilder,
    name: &str,
    trigger: StatRef,
    threshold: f32,
    priority: i32,
    actions: &[ActionShape],
) -> BehaviorId {
    let behavior = builder.add_behavior(BehaviorDef {
        id: BehaviorId(0),
        def_name: name.to_string(),
        label: name.to_string(),
        trigger,
        threshold,
        priority,
    });
    for (index, shape) in actions.iter().enumerate() {
        let id = builder.next_behavior_action_id();
        let next = (index + 1 < actions.len()).then(|| BehaviorActionId(id.0 + 1));
        builder.add_behavior_action(BehaviorActionDef {
            id,
            def_name: format!("{name}.{index}"),
            behavior,
            kind: shape.kind,
            target_selection: shape.selection,
            interaction: shape.interaction,
            next,
            is_root: index == 0,
            idle_duration_ticks: shape.idle_ticks,
        });
    }
    behavior
}

/// Hunger satisfied by picking up an apple and eating it (active for 3 ticks,
/// +5 per tick).
pub(crate) struct EatFixture {
    pub catalog: ContentCatalog,
    pub hunger: NeedId,
    pub villager: TemplateId,
    pub apple: TemplateId,
    pub pick_apple: InteractionId,
    pub eat_apple: InteractionId,
    pub eat: BehaviorId,
}

pub(crate) fn eat_fixture() -> EatFixture {
    let mut builder = ContentCatalog::builder();
    let hunger = add_need(&mut builder, "need.hunger", 100.0, 100.0, 0.0);
    let villager = builder.add_template(EntityTemplate::character("character.villager", 3.0));
    let apple = builder.add_template(EntityTemplate::item("item.apple"));
    let pick_apple = add_interaction(
        &mut builder,
        "interaction.pick_apple",
        InteractionKind::Item,
        InteractionCategory::System,
        apple,
        &[1],
    );
    let eat_apple = add_interaction(
        &mut builder,
        "interaction.eat_apple",
        InteractionKind::Item,
        InteractionCategory::Once,
        apple,
        &[2],
    );
    add_fulfillment(&mut builder, eat_apple, StatRef::Need(hunger), 5.0);
    let eat = add_behavior(
        &mut builder,
        "behavior.eat",
        StatRef::Need(hunger),
        40.0,
        10,
        &[
            ActionShape::search(BehaviorActionKind::SystemItemPick),
            ActionShape::search_or_continue(BehaviorActionKind::Once),
        ],
    );
    EatFixture {
        catalog: builder.build(),
        hunger,
        villager,
        apple,
        pick_apple,
        eat_apple,
        eat,
    }
}

/// World plus collaborators for driving single characters by hand.
pub(crate) struct Harness {
    pub catalog: ContentCatalog,
    pub world: WorldState,
    pub config: SimConfig,
    pub events: BehaviorEventBus,
    pub pathfinder: Box<dyn Pathfinder>,
}

impl Harness {
    pub(crate) fn new(catalog: ContentCatalog) -> Self {
        Self {
            catalog,
            world: WorldState::new(),
            config: SimConfig::default(),
            events: BehaviorEventBus::default(),
            pathfinder: Box::new(StraightLinePathfinder),
        }
    }

    pub(crate) fn spawn(&mut self, template: TemplateId, x: f32, y: f32) -> EntityId {
        self.world
            .spawn(&self.catalog, template, Vec2 { x, y })
            .expect("spawn")
    }

    pub(crate) fn tick_at(
        &mut self,
        character: EntityId,
        state: &mut CharacterBehaviorState,
        now: Tick,
    ) -> Result<TickOutcome, BehaviorError> {
        let mut reservations = Reservations::default();
        self.tick_reserved(character, state, now, &mut reservations)
    }

    pub(crate) fn tick_reserved(
        &mut self,
        character: EntityId,
        state: &mut CharacterBehaviorState,
        now: Tick,
        reservations: &mut Reservations,
    ) -> Result<TickOutcome, BehaviorError> {
        let mut context = BehaviorContext {
            catalog: &self.catalog,
            world: &mut self.world,
            pathfinder: self.pathfinder.as_ref(),
            config: &self.config,
            events: &mut self.events,
            reservations,
            now,
        };
        tick_character(&mut context, character, state)
    }
}
