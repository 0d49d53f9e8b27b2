use serde::{Deserialize, Serialize};

use crate::content::{BehaviorActionId, BehaviorId, InteractionActionId, InteractionId};
use crate::world::{EntityId, Vec2};

/// Simulation tick counter; advanced by the host only.
pub type Tick = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// The interaction chain node currently running and when it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveInteraction {
    pub interaction: InteractionId,
    pub node: InteractionActionId,
    pub started_at: Tick,
}

/// Where a character is inside its active behavior chain.
///
/// `started_at` is the tick the current behavior action became active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BehaviorPhase {
    #[default]
    Unselected,
    Waiting {
        action: BehaviorActionId,
        started_at: Tick,
    },
    Targeting {
        action: BehaviorActionId,
        started_at: Tick,
    },
    Interacting {
        action: BehaviorActionId,
        started_at: Tick,
        interaction: ActiveInteraction,
    },
}

impl BehaviorPhase {
    pub fn action(self) -> Option<BehaviorActionId> {
        match self {
            Self::Unselected => None,
            Self::Waiting { action, .. }
            | Self::Targeting { action, .. }
            | Self::Interacting { action, .. } => Some(action),
        }
    }

    pub fn started_at(self) -> Option<Tick> {
        match self {
            Self::Unselected => None,
            Self::Waiting { started_at, .. }
            | Self::Targeting { started_at, .. }
            | Self::Interacting { started_at, .. } => Some(started_at),
        }
    }

    pub fn active_interaction(self) -> Option<ActiveInteraction> {
        match self {
            Self::Interacting { interaction, .. } => Some(interaction),
            _ => None,
        }
    }
}

/// Per-character runtime state owned by the behavior pipeline.
///
/// A non-empty path or a running interaction always comes with a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterBehaviorState {
    pub(crate) candidates: Vec<BehaviorId>,
    pub(crate) phase: BehaviorPhase,
    pub(crate) target: Option<EntityId>,
    pub(crate) path: Vec<Vec2>,
    pub(crate) facing: Facing,
    pub(crate) stalled_ticks: u32,
}

impl CharacterBehaviorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&self) -> &[BehaviorId] {
        &self.candidates
    }

    pub fn phase(&self) -> BehaviorPhase {
        self.phase
    }

    pub fn active_behavior(&self) -> Option<BehaviorId> {
        self.phase.action().and(self.candidates.first().copied())
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn path(&self) -> &[Vec2] {
        &self.path
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn stalled_ticks(&self) -> u32 {
        self.stalled_ticks
    }

    /// Nothing selected and nothing cached.
    pub fn is_cleared(&self) -> bool {
        self.phase == BehaviorPhase::Unselected
            && self.target.is_none()
            && self.path.is_empty()
            && self.candidates.is_empty()
    }

    /// Drops all behavior progress. Facing survives, it is presentation only.
    pub fn clear(&mut self) {
        let facing = self.facing;
        *self = Self {
            facing,
            ..Self::default()
        };
    }

    pub(crate) fn set_target(&mut self, target: EntityId, path: Vec<Vec2>) {
        self.target = Some(target);
        self.path = path;
    }

    /// Forgets the target together with anything that depends on it.
    pub(crate) fn drop_target(&mut self) {
        self.target = None;
        self.path.clear();
        if let BehaviorPhase::Interacting {
            action, started_at, ..
        } = self.phase
        {
            self.phase = BehaviorPhase::Targeting { action, started_at };
        }
    }

    /// Restores invariants on state loaded from outside the pipeline.
    pub(crate) fn normalize(&mut self) {
        if self.target.is_none() {
            self.drop_target();
        }
        if self.phase == BehaviorPhase::Unselected {
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interacting_state() -> CharacterBehaviorState {
        CharacterBehaviorState {
            candidates: vec![BehaviorId(2)],
            phase: BehaviorPhase::Interacting {
                action: BehaviorActionId(4),
                started_at: 7,
                interaction: ActiveInteraction {
                    interaction: InteractionId(1),
                    node: InteractionActionId(3),
                    started_at: 9,
                },
            },
            target: Some(EntityId(5)),
            path: vec![Vec2 { x: 1.0, y: 2.0 }],
            facing: Facing::Left,
            stalled_ticks: 0,
        }
    }

    #[test]
    fn clear_keeps_facing_only() {
        let mut state = interacting_state();
        state.clear();
        assert!(state.is_cleared());
        assert_eq!(state.facing(), Facing::Left);
    }

    #[test]
    fn dropping_target_demotes_interaction_to_targeting() {
        let mut state = interacting_state();
        state.drop_target();
        assert_eq!(state.target(), None);
        assert!(state.path().is_empty());
        assert_eq!(
            state.phase(),
            BehaviorPhase::Targeting {
                action: BehaviorActionId(4),
                started_at: 7
            }
        );
    }

    #[test]
    fn normalize_repairs_targetless_interaction() {
        let mut state = interacting_state();
        state.target = None;
        state.normalize();
        assert!(state.phase().active_interaction().is_none());
        assert!(state.path().is_empty());
    }

    #[test]
    fn state_survives_json_round_trip() {
        let state = interacting_state();
        let json = serde_json::to_string(&state).expect("serialize");
        let restored: CharacterBehaviorState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, state);
    }
}
