mod catalog;
mod compiler;
mod defs;
mod discovery;
mod hashing;
mod types;

pub use catalog::{CatalogBuilder, ContentCatalog};
pub use compiler::{
    compile_content_catalog, ContentCompileError, ContentErrorCode, SourceLocation,
};
pub use defs::{
    BehaviorActionDef, BehaviorActionId, BehaviorActionKind, BehaviorDef, BehaviorId,
    BuildingConditionSlot, ConditionDef, ConditionId, EntityTemplate, FulfillmentDef,
    InteractionActionDef, InteractionActionId, InteractionCategory, InteractionDef,
    InteractionId, InteractionKind, NeedDef, NeedId, StatRef, TargetSelection, TemplateId,
    TemplateKind,
};
pub use types::{ContentDiscoveryError, ContentLoadRequest};
