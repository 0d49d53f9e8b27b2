use std::collections::BTreeMap;

use tracing::{debug, error, warn};

use crate::behavior::{
    advance_motion, apply_condition_decay, apply_need_decay, tick_character, BehaviorContext,
    BehaviorEventBus, BehaviorEventCounts, CharacterBehaviorState, Reservations, SimConfig, Tick,
};
use crate::content::{ContentCatalog, TemplateId};
use crate::world::{Entity, EntityId, EntityKind, Pathfinder, Vec2, WorldError, WorldState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: Tick,
    pub characters: usize,
    pub failures: usize,
    pub events: BehaviorEventCounts,
}

/// Owns one scenario instance: catalog, world, collaborators and the runtime
/// state of every live character.
pub struct Simulation {
    catalog: ContentCatalog,
    world: WorldState,
    pathfinder: Box<dyn Pathfinder>,
    config: SimConfig,
    tick: Tick,
    states: BTreeMap<EntityId, CharacterBehaviorState>,
    events: BehaviorEventBus,
}

impl Simulation {
    pub fn new(
        catalog: ContentCatalog,
        world: WorldState,
        pathfinder: Box<dyn Pathfinder>,
        config: SimConfig,
    ) -> Self {
        let mut simulation = Self {
            catalog,
            world,
            pathfinder,
            config,
            tick: 0,
            states: BTreeMap::new(),
            events: BehaviorEventBus::default(),
        };
        simulation.sync_runtime_states();
        simulation
    }

    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The tick the next `step_tick` call will run.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn state(&self, character: EntityId) -> Option<&CharacterBehaviorState> {
        self.states.get(&character)
    }

    pub fn runtime_states(&self) -> &BTreeMap<EntityId, CharacterBehaviorState> {
        &self.states
    }

    pub fn events(&self) -> &BehaviorEventBus {
        &self.events
    }

    pub fn spawn(&mut self, template: TemplateId, position: Vec2) -> Result<EntityId, WorldError> {
        let id = self.world.spawn(&self.catalog, template, position)?;
        if self.is_character(id) {
            self.states.insert(id, CharacterBehaviorState::new());
        }
        Ok(id)
    }

    pub fn despawn(&mut self, entity: EntityId) -> Option<Entity> {
        self.states.remove(&entity);
        self.world.remove_entity(entity)
    }

    /// Replaces runtime states with previously captured ones and resumes at
    /// `tick`. States for characters that no longer exist are dropped; live
    /// characters without a captured state start cleared.
    pub fn restore_runtime_states(
        &mut self,
        tick: Tick,
        states: BTreeMap<EntityId, CharacterBehaviorState>,
    ) {
        self.tick = tick;
        self.states.clear();
        for (character, mut state) in states {
            if !self.is_character(character) {
                warn!(character = ?character, "runtime_state_dropped");
                continue;
            }
            state.normalize();
            self.states.insert(character, state);
        }
        self.sync_runtime_states();
        self.events.clear_current_tick();
    }

    /// Runs one simulation tick: decay, then the behavior pipeline once per
    /// character in ascending id order.
    pub fn step_tick(&mut self) -> TickReport {
        self.sync_runtime_states();
        apply_need_decay(&self.catalog, &mut self.world);
        apply_condition_decay(&self.catalog, &mut self.world);

        let now = self.tick;
        let characters = self.states.keys().copied().collect::<Vec<_>>();
        let mut failures = 0usize;
        for &character in &characters {
            let Some(mut state) = self.states.remove(&character) else {
                continue;
            };
            let mut reservations =
                Reservations::from_states(self.states.iter().map(|(id, other)| (*id, other)));
            let mut context = BehaviorContext {
                catalog: &self.catalog,
                world: &mut self.world,
                pathfinder: self.pathfinder.as_ref(),
                config: &self.config,
                events: &mut self.events,
                reservations: &mut reservations,
                now,
            };
            match tick_character(&mut context, character, &mut state) {
                Ok(outcome) => debug!(tick = now, character = ?character, ?outcome, "character_ticked"),
                Err(err) => {
                    failures = failures.saturating_add(1);
                    error!(tick = now, character = ?character, error = %err, "behavior_tick_failed");
                    state.clear();
                }
            }
            self.states.insert(character, state);
        }

        let events = self.events.finish_tick_rollover();
        self.tick = self.tick.saturating_add(1);
        TickReport {
            tick: now,
            characters: characters.len(),
            failures,
            events,
        }
    }

    /// Per-frame motion for every character along its cached path.
    pub fn advance_frame(&mut self, dt_seconds: f32) {
        for (&character, state) in self.states.iter_mut() {
            advance_motion(
                &self.catalog,
                &mut self.world,
                &self.config,
                character,
                state,
                dt_seconds,
            );
        }
    }

    fn is_character(&self, id: EntityId) -> bool {
        self.world
            .entity(id)
            .is_some_and(|entity| entity.kind == EntityKind::Character)
    }

    fn sync_runtime_states(&mut self) {
        let live = self.world.character_ids();
        self.states.retain(|id, _| live.binary_search(id).is_ok());
        for id in live {
            self.states.entry(id).or_default();
        }
    }
}
