use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeedId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConditionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BehaviorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BehaviorActionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionActionId(pub u32);

/// A need on a character or a condition on a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatRef {
    Need(NeedId),
    Condition(ConditionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeedDef {
    pub id: NeedId,
    pub def_name: String,
    pub label: String,
    pub max_value: f32,
    pub initial_value: f32,
    pub decrease_per_tick: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDef {
    pub id: ConditionId,
    pub def_name: String,
    pub label: String,
    pub max_value: f32,
    pub initial_value: f32,
    pub decrease_per_tick: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Character,
    Building,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingConditionSlot {
    pub condition: ConditionId,
    pub decrease_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityTemplate {
    pub id: TemplateId,
    pub def_name: String,
    pub label: String,
    pub kind: TemplateKind,
    pub move_speed: f32,
    pub conditions: Vec<BuildingConditionSlot>,
}

impl EntityTemplate {
    pub const DEFAULT_MOVE_SPEED: f32 = 5.0;

    pub fn character(def_name: &str, move_speed: f32) -> Self {
        Self::new(def_name, TemplateKind::Character, move_speed)
    }

    pub fn building(def_name: &str) -> Self {
        Self::new(def_name, TemplateKind::Building, 0.0)
    }

    pub fn item(def_name: &str) -> Self {
        Self::new(def_name, TemplateKind::Item, 0.0)
    }

    fn new(def_name: &str, kind: TemplateKind, move_speed: f32) -> Self {
        Self {
            id: TemplateId(0),
            def_name: def_name.to_string(),
            label: def_name.to_string(),
            kind,
            move_speed,
            conditions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorDef {
    pub id: BehaviorId,
    pub def_name: String,
    pub label: String,
    pub trigger: StatRef,
    pub threshold: f32,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorActionKind {
    Idle,
    SystemItemPick,
    Once,
    Fulfill,
}

impl BehaviorActionKind {
    /// Interaction category an action of this kind runs; idle runs none.
    pub fn required_category(self) -> Option<InteractionCategory> {
        match self {
            Self::Idle => None,
            Self::SystemItemPick => Some(InteractionCategory::System),
            Self::Once => Some(InteractionCategory::Once),
            Self::Fulfill => Some(InteractionCategory::Repeat),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelection {
    Explicit,
    Search,
    SearchOrContinue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorActionDef {
    pub id: BehaviorActionId,
    pub def_name: String,
    pub behavior: BehaviorId,
    pub kind: BehaviorActionKind,
    pub target_selection: TargetSelection,
    pub interaction: Option<InteractionId>,
    pub next: Option<BehaviorActionId>,
    pub is_root: bool,
    pub idle_duration_ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Building,
    Item,
    Character,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionCategory {
    Once,
    System,
    Repeat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDef {
    pub id: InteractionId,
    pub def_name: String,
    pub label: String,
    pub kind: InteractionKind,
    pub category: InteractionCategory,
    /// Template of the entities this interaction is performed on.
    pub target: TemplateId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionActionDef {
    pub id: InteractionActionId,
    pub def_name: String,
    pub interaction: InteractionId,
    pub duration_ticks: u64,
    pub next: Option<InteractionActionId>,
    pub is_root: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentDef {
    pub def_name: String,
    pub interaction: InteractionId,
    pub target: StatRef,
    pub increase_per_tick: f32,
}
