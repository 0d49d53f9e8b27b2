//! Per-character behavior pipeline: selection, target resolution, interaction
//! execution and the chain sequencer, plus the per-frame motion pass and
//! building condition decay that run alongside it.

mod config;
mod decay;
mod error;
mod events;
mod motion;
mod resolver;
mod runner;
mod selector;
mod sequencer;
mod state;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::content::ContentCatalog;
use crate::world::{Pathfinder, WorldState};

pub use config::{PriorityTieBreak, SimConfig};
pub use decay::{apply_condition_decay, apply_need_decay};
pub use error::{BehaviorError, ContentIntegrityError};
pub use events::{BehaviorEvent, BehaviorEventBus, BehaviorEventCounts, BehaviorEventKind};
pub use motion::{advance_motion, step_toward};
pub use resolver::{resolve_target, Reservations, TargetStatus};
pub use runner::{advance_interaction, InteractionStatus};
pub use selector::eligible_behaviors;
pub use sequencer::{tick_character, TickOutcome};
pub use state::{ActiveInteraction, BehaviorPhase, CharacterBehaviorState, Facing, Tick};

/// Collaborators handed to every pipeline step. The world is the only shared
/// mutable store; nothing here is global.
pub struct BehaviorContext<'a> {
    pub catalog: &'a ContentCatalog,
    pub world: &'a mut WorldState,
    pub pathfinder: &'a dyn Pathfinder,
    pub config: &'a SimConfig,
    pub events: &'a mut BehaviorEventBus,
    pub reservations: &'a mut Reservations,
    pub now: Tick,
}
