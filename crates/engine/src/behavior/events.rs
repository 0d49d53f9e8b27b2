use crate::content::{BehaviorId, InteractionId};
use crate::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorEvent {
    BehaviorSelected {
        character: EntityId,
        behavior: BehaviorId,
    },
    BehaviorFinished {
        character: EntityId,
    },
    BehaviorReset {
        character: EntityId,
    },
    TargetAcquired {
        character: EntityId,
        target: EntityId,
    },
    TargetLost {
        character: EntityId,
        target: EntityId,
    },
    InteractionStarted {
        character: EntityId,
        target: EntityId,
        interaction: InteractionId,
    },
    InteractionCompleted {
        character: EntityId,
        target: EntityId,
        interaction: InteractionId,
    },
    ItemPicked {
        character: EntityId,
        item: EntityId,
    },
    ItemConsumed {
        character: EntityId,
        item: EntityId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorEventKind {
    BehaviorSelected,
    BehaviorFinished,
    BehaviorReset,
    TargetAcquired,
    TargetLost,
    InteractionStarted,
    InteractionCompleted,
    ItemPicked,
    ItemConsumed,
}

impl BehaviorEvent {
    pub fn kind(self) -> BehaviorEventKind {
        match self {
            Self::BehaviorSelected { .. } => BehaviorEventKind::BehaviorSelected,
            Self::BehaviorFinished { .. } => BehaviorEventKind::BehaviorFinished,
            Self::BehaviorReset { .. } => BehaviorEventKind::BehaviorReset,
            Self::TargetAcquired { .. } => BehaviorEventKind::TargetAcquired,
            Self::TargetLost { .. } => BehaviorEventKind::TargetLost,
            Self::InteractionStarted { .. } => BehaviorEventKind::InteractionStarted,
            Self::InteractionCompleted { .. } => BehaviorEventKind::InteractionCompleted,
            Self::ItemPicked { .. } => BehaviorEventKind::ItemPicked,
            Self::ItemConsumed { .. } => BehaviorEventKind::ItemConsumed,
        }
    }

    pub fn character(self) -> EntityId {
        match self {
            Self::BehaviorSelected { character, .. }
            | Self::BehaviorFinished { character }
            | Self::BehaviorReset { character }
            | Self::TargetAcquired { character, .. }
            | Self::TargetLost { character, .. }
            | Self::InteractionStarted { character, .. }
            | Self::InteractionCompleted { character, .. }
            | Self::ItemPicked { character, .. }
            | Self::ItemConsumed { character, .. } => character,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorEventCounts {
    pub total: u32,
    pub behavior_selected: u32,
    pub behavior_finished: u32,
    pub behavior_reset: u32,
    pub target_acquired: u32,
    pub target_lost: u32,
    pub interaction_started: u32,
    pub interaction_completed: u32,
    pub item_picked: u32,
    pub item_consumed: u32,
}

impl BehaviorEventCounts {
    fn record(&mut self, kind: BehaviorEventKind) {
        self.total = self.total.saturating_add(1);
        let slot = match kind {
            BehaviorEventKind::BehaviorSelected => &mut self.behavior_selected,
            BehaviorEventKind::BehaviorFinished => &mut self.behavior_finished,
            BehaviorEventKind::BehaviorReset => &mut self.behavior_reset,
            BehaviorEventKind::TargetAcquired => &mut self.target_acquired,
            BehaviorEventKind::TargetLost => &mut self.target_lost,
            BehaviorEventKind::InteractionStarted => &mut self.interaction_started,
            BehaviorEventKind::InteractionCompleted => &mut self.interaction_completed,
            BehaviorEventKind::ItemPicked => &mut self.item_picked,
            BehaviorEventKind::ItemConsumed => &mut self.item_consumed,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Change-notification seam: the pipeline emits, observers read the current
/// tick's events before rollover.
#[derive(Debug, Default)]
pub struct BehaviorEventBus {
    current_tick_events: Vec<BehaviorEvent>,
    last_tick_counts: BehaviorEventCounts,
}

impl BehaviorEventBus {
    pub fn emit(&mut self, event: BehaviorEvent) {
        self.current_tick_events.push(event);
    }

    pub fn iter_emitted_so_far(&self) -> impl Iterator<Item = &BehaviorEvent> {
        self.current_tick_events.iter()
    }

    pub fn clear_current_tick(&mut self) {
        self.current_tick_events.clear();
    }

    pub fn finish_tick_rollover(&mut self) -> BehaviorEventCounts {
        let mut counts = BehaviorEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.current_tick_events.clear();
        counts
    }

    pub fn last_tick_counts(&self) -> BehaviorEventCounts {
        self.last_tick_counts
    }
}
