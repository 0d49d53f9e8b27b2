use thiserror::Error;

use crate::content::{
    BehaviorActionId, BehaviorId, ConditionId, InteractionActionId, InteractionId, NeedId,
};
use crate::world::{EntityId, WorldError};

/// Dangling references in authored content. Fatal for the character's tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentIntegrityError {
    #[error("behavior {0:?} is not in the content catalog")]
    MissingBehavior(BehaviorId),
    #[error("behavior {0:?} has no root action")]
    MissingRootBehaviorAction(BehaviorId),
    #[error("behavior action {0:?} is not in the content catalog")]
    MissingBehaviorAction(BehaviorActionId),
    #[error("behavior action {0:?} needs an interaction but has none configured")]
    ActionWithoutInteraction(BehaviorActionId),
    #[error("interaction {0:?} is not in the content catalog")]
    MissingInteraction(InteractionId),
    #[error("interaction {0:?} has no root action")]
    MissingRootInteractionAction(InteractionId),
    #[error("interaction action {0:?} is not in the content catalog")]
    MissingInteractionAction(InteractionActionId),
    #[error("need {0:?} is not in the content catalog")]
    MissingNeed(NeedId),
    #[error("condition {0:?} is not in the content catalog")]
    MissingCondition(ConditionId),
}

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error(transparent)]
    Integrity(#[from] ContentIntegrityError),
    #[error("character {0:?} is not in the world")]
    UnknownCharacter(EntityId),
    #[error(transparent)]
    World(#[from] WorldError),
}
