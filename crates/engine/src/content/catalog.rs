use std::collections::{HashMap, HashSet};

use super::defs::{
    BehaviorActionDef, BehaviorActionId, BehaviorActionKind, BehaviorDef, BehaviorId,
    ConditionDef, ConditionId, EntityTemplate, FulfillmentDef, InteractionActionDef,
    InteractionActionId, InteractionCategory, InteractionDef, InteractionId, NeedDef, NeedId,
    StatRef, TemplateId, TargetSelection,
};

/// Read-only lookup tables for authored content. Ids index the def vectors
/// directly; a def referring to an id outside them is a dangling reference.
#[derive(Debug, Default, Clone)]
pub struct ContentCatalog {
    needs: Vec<NeedDef>,
    conditions: Vec<ConditionDef>,
    templates: Vec<EntityTemplate>,
    behaviors: Vec<BehaviorDef>,
    behavior_actions: Vec<BehaviorActionDef>,
    interactions: Vec<InteractionDef>,
    interaction_actions: Vec<InteractionActionDef>,
    fulfillments: Vec<FulfillmentDef>,
    need_ids_by_name: HashMap<String, NeedId>,
    condition_ids_by_name: HashMap<String, ConditionId>,
    template_ids_by_name: HashMap<String, TemplateId>,
    behavior_ids_by_name: HashMap<String, BehaviorId>,
    interaction_ids_by_name: HashMap<String, InteractionId>,
    fingerprint: Option<String>,
}

impl ContentCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn needs(&self) -> &[NeedDef] {
        &self.needs
    }

    pub fn need(&self, id: NeedId) -> Option<&NeedDef> {
        self.needs.get(id.0 as usize)
    }

    pub fn need_id_by_name(&self, name: &str) -> Option<NeedId> {
        self.need_ids_by_name.get(name).copied()
    }

    pub fn conditions(&self) -> &[ConditionDef] {
        &self.conditions
    }

    pub fn condition(&self, id: ConditionId) -> Option<&ConditionDef> {
        self.conditions.get(id.0 as usize)
    }

    pub fn condition_id_by_name(&self, name: &str) -> Option<ConditionId> {
        self.condition_ids_by_name.get(name).copied()
    }

    pub fn templates(&self) -> &[EntityTemplate] {
        &self.templates
    }

    pub fn template(&self, id: TemplateId) -> Option<&EntityTemplate> {
        self.templates.get(id.0 as usize)
    }

    pub fn template_id_by_name(&self, name: &str) -> Option<TemplateId> {
        self.template_ids_by_name.get(name).copied()
    }

    /// Behaviors in catalog order.
    pub fn behaviors(&self) -> &[BehaviorDef] {
        &self.behaviors
    }

    pub fn behavior(&self, id: BehaviorId) -> Option<&BehaviorDef> {
        self.behaviors.get(id.0 as usize)
    }

    pub fn behavior_id_by_name(&self, name: &str) -> Option<BehaviorId> {
        self.behavior_ids_by_name.get(name).copied()
    }

    pub fn root_behavior_action(&self, behavior: BehaviorId) -> Option<&BehaviorActionDef> {
        self.behavior_actions
            .iter()
            .find(|action| action.behavior == behavior && action.is_root)
    }

    pub fn behavior_action(&self, id: BehaviorActionId) -> Option<&BehaviorActionDef> {
        self.behavior_actions.get(id.0 as usize)
    }

    pub fn behavior_actions(&self) -> &[BehaviorActionDef] {
        &self.behavior_actions
    }

    pub fn interaction(&self, id: InteractionId) -> Option<&InteractionDef> {
        self.interactions.get(id.0 as usize)
    }

    pub fn interactions(&self) -> &[InteractionDef] {
        &self.interactions
    }

    pub fn interaction_id_by_name(&self, name: &str) -> Option<InteractionId> {
        self.interaction_ids_by_name.get(name).copied()
    }

    pub fn root_interaction_action(
        &self,
        interaction: InteractionId,
    ) -> Option<&InteractionActionDef> {
        self.interaction_actions
            .iter()
            .find(|action| action.interaction == interaction && action.is_root)
    }

    pub fn interaction_action(&self, id: InteractionActionId) -> Option<&InteractionActionDef> {
        self.interaction_actions.get(id.0 as usize)
    }

    /// The interaction's chain from its root, stopping at a dangling or repeated link.
    pub fn interaction_actions(&self, interaction: InteractionId) -> Vec<&InteractionActionDef> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = self.root_interaction_action(interaction);
        while let Some(node) = cursor {
            if !visited.insert(node.id) {
                break;
            }
            chain.push(node);
            cursor = node.next.and_then(|next| self.interaction_action(next));
        }
        chain
    }

    pub fn fulfillments(
        &self,
        interaction: InteractionId,
    ) -> impl Iterator<Item = &FulfillmentDef> + '_ {
        self.fulfillments
            .iter()
            .filter(move |fulfillment| fulfillment.interaction == interaction)
    }

    pub fn all_fulfillments(&self) -> &[FulfillmentDef] {
        &self.fulfillments
    }

    fn fulfills(&self, interaction: InteractionId, stat: StatRef) -> bool {
        self.fulfillments(interaction)
            .any(|fulfillment| fulfillment.target == stat)
    }

    /// Interactions a behavior action may run against, in catalog order.
    ///
    /// Explicit actions use their configured interaction. Searching `Once` and
    /// `Fulfill` actions consider every interaction of the matching category
    /// that fulfills the behavior's trigger; searching `SystemItemPick` actions
    /// consider system interactions whose target is consumed by such an
    /// interaction.
    pub fn search_interactions(
        &self,
        action: &BehaviorActionDef,
        behavior: &BehaviorDef,
    ) -> Vec<&InteractionDef> {
        let Some(category) = action.kind.required_category() else {
            return Vec::new();
        };
        if action.target_selection == TargetSelection::Explicit {
            return action
                .interaction
                .and_then(|id| self.interaction(id))
                .into_iter()
                .collect();
        }

        match action.kind {
            BehaviorActionKind::SystemItemPick => {
                let useful_targets = self
                    .interactions
                    .iter()
                    .filter(|interaction| self.fulfills(interaction.id, behavior.trigger))
                    .map(|interaction| interaction.target)
                    .collect::<HashSet<_>>();
                self.interactions
                    .iter()
                    .filter(|interaction| {
                        interaction.category == InteractionCategory::System
                            && useful_targets.contains(&interaction.target)
                    })
                    .collect()
            }
            _ => self
                .interactions
                .iter()
                .filter(|interaction| {
                    interaction.category == category
                        && self.fulfills(interaction.id, behavior.trigger)
                })
                .collect(),
        }
    }
}

/// Assembles a catalog; ids follow insertion order per def type.
#[derive(Debug, Default, Clone)]
pub struct CatalogBuilder {
    catalog: ContentCatalog,
}

impl CatalogBuilder {
    pub fn add_need(&mut self, mut def: NeedDef) -> NeedId {
        let id = NeedId(self.catalog.needs.len() as u32);
        def.id = id;
        self.catalog.need_ids_by_name.insert(def.def_name.clone(), id);
        self.catalog.needs.push(def);
        id
    }

    pub fn add_condition(&mut self, mut def: ConditionDef) -> ConditionId {
        let id = ConditionId(self.catalog.conditions.len() as u32);
        def.id = id;
        self.catalog
            .condition_ids_by_name
            .insert(def.def_name.clone(), id);
        self.catalog.conditions.push(def);
        id
    }

    pub fn add_template(&mut self, mut def: EntityTemplate) -> TemplateId {
        let id = TemplateId(self.catalog.templates.len() as u32);
        def.id = id;
        self.catalog
            .template_ids_by_name
            .insert(def.def_name.clone(), id);
        self.catalog.templates.push(def);
        id
    }

    pub fn add_behavior(&mut self, mut def: BehaviorDef) -> BehaviorId {
        let id = BehaviorId(self.catalog.behaviors.len() as u32);
        def.id = id;
        self.catalog
            .behavior_ids_by_name
            .insert(def.def_name.clone(), id);
        self.catalog.behaviors.push(def);
        id
    }

    pub fn add_behavior_action(&mut self, mut def: BehaviorActionDef) -> BehaviorActionId {
        let id = BehaviorActionId(self.catalog.behavior_actions.len() as u32);
        def.id = id;
        self.catalog.behavior_actions.push(def);
        id
    }

    pub fn add_interaction(&mut self, mut def: InteractionDef) -> InteractionId {
        let id = InteractionId(self.catalog.interactions.len() as u32);
        def.id = id;
        self.catalog
            .interaction_ids_by_name
            .insert(def.def_name.clone(), id);
        self.catalog.interactions.push(def);
        id
    }

    pub fn add_interaction_action(&mut self, mut def: InteractionActionDef) -> InteractionActionId {
        let id = InteractionActionId(self.catalog.interaction_actions.len() as u32);
        def.id = id;
        self.catalog.interaction_actions.push(def);
        id
    }

    pub fn add_fulfillment(&mut self, def: FulfillmentDef) {
        self.catalog.fulfillments.push(def);
    }

    pub fn next_behavior_action_id(&self) -> BehaviorActionId {
        BehaviorActionId(self.catalog.behavior_actions.len() as u32)
    }

    pub fn next_interaction_action_id(&self) -> InteractionActionId {
        InteractionActionId(self.catalog.interaction_actions.len() as u32)
    }

    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.catalog.fingerprint = Some(fingerprint);
        self
    }

    pub fn build(self) -> ContentCatalog {
        self.catalog
    }
}
