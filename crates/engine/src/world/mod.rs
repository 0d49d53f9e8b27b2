mod nav;
mod tilemap;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::{ConditionId, ContentCatalog, NeedId, TemplateId, TemplateKind};

pub use nav::{GridPathfinder, Pathfinder, StraightLinePathfinder, NAV_BLOCKED_TILE_ID};
pub use tilemap::{Tilemap, TilemapError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn distance_sq(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Character,
    Building,
    Item,
    Tile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOwnership {
    Free,
    HeldBy(EntityId),
    PlacedIn(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub template: TemplateId,
    pub position: Vec2,
    /// Only items carry ownership.
    pub ownership: Option<ItemOwnership>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BuildingCondition {
    value: f32,
    decrease_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("entity template {0:?} is not in the content catalog")]
    UnknownTemplate(TemplateId),
    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),
    #[error("entity {entity:?} is a {actual:?}, expected {expected:?}")]
    WrongKind {
        entity: EntityId,
        expected: EntityKind,
        actual: EntityKind,
    },
}

/// Live per-scenario tables for characters, buildings, items and their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    next_entity_id: u64,
    entities: BTreeMap<EntityId, Entity>,
    held_items: BTreeMap<EntityId, Vec<EntityId>>,
    needs: BTreeMap<(EntityId, NeedId), f32>,
    conditions: BTreeMap<(EntityId, ConditionId), BuildingCondition>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns an entity from a catalog template, seeding character needs and
    /// building conditions from their initial values.
    pub fn spawn(
        &mut self,
        catalog: &ContentCatalog,
        template: TemplateId,
        position: Vec2,
    ) -> Result<EntityId, WorldError> {
        let def = catalog
            .template(template)
            .ok_or(WorldError::UnknownTemplate(template))?;
        let id = EntityId(self.next_entity_id);
        self.next_entity_id = self.next_entity_id.saturating_add(1);

        let kind = match def.kind {
            TemplateKind::Character => EntityKind::Character,
            TemplateKind::Building => EntityKind::Building,
            TemplateKind::Item => EntityKind::Item,
        };
        match kind {
            EntityKind::Character => {
                for need in catalog.needs() {
                    self.needs.insert((id, need.id), need.initial_value);
                }
                self.held_items.insert(id, Vec::new());
            }
            EntityKind::Building => {
                for slot in &def.conditions {
                    let initial = catalog
                        .condition(slot.condition)
                        .map(|condition| condition.initial_value)
                        .unwrap_or(0.0);
                    self.conditions.insert(
                        (id, slot.condition),
                        BuildingCondition {
                            value: initial,
                            decrease_multiplier: slot.decrease_multiplier,
                        },
                    );
                }
            }
            EntityKind::Item | EntityKind::Tile => {}
        }

        self.entities.insert(
            id,
            Entity {
                id,
                kind,
                template,
                position,
                ownership: (kind == EntityKind::Item).then_some(ItemOwnership::Free),
            },
        );
        Ok(id)
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn character_ids(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|entity| entity.kind == EntityKind::Character)
            .map(|entity| entity.id)
            .collect()
    }

    /// Held items follow their holder and placed items sit at their building.
    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        let entity = self.entities.get(&id)?;
        match entity.ownership {
            Some(ItemOwnership::HeldBy(owner)) | Some(ItemOwnership::PlacedIn(owner)) => self
                .entities
                .get(&owner)
                .map(|holder| holder.position)
                .or(Some(entity.position)),
            _ => Some(entity.position),
        }
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    /// Entities with a physical placement in the world; held items are excluded.
    pub fn physical_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(|entity| !matches!(entity.ownership, Some(ItemOwnership::HeldBy(_))))
    }

    pub fn held_items(&self, character: EntityId) -> &[EntityId] {
        self.held_items
            .get(&character)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drops a stale entry from a character's held list without touching the item.
    pub fn forget_held_item(&mut self, character: EntityId, item: EntityId) -> bool {
        let Some(held) = self.held_items.get_mut(&character) else {
            return false;
        };
        let before = held.len();
        held.retain(|held_id| *held_id != item);
        held.len() != before
    }

    pub fn need(&self, character: EntityId, need: NeedId) -> Option<f32> {
        self.needs.get(&(character, need)).copied()
    }

    pub fn set_need(&mut self, character: EntityId, need: NeedId, value: f32) {
        if self.entities.contains_key(&character) {
            self.needs.insert((character, need), value);
        }
    }

    pub fn need_values(&self) -> impl Iterator<Item = (EntityId, NeedId, f32)> + '_ {
        self.needs
            .iter()
            .map(|((character, need), value)| (*character, *need, *value))
    }

    pub fn building_condition(&self, building: EntityId, condition: ConditionId) -> Option<f32> {
        self.conditions
            .get(&(building, condition))
            .map(|entry| entry.value)
    }

    /// Only updates conditions the building actually carries.
    pub fn set_building_condition(
        &mut self,
        building: EntityId,
        condition: ConditionId,
        value: f32,
    ) -> bool {
        match self.conditions.get_mut(&(building, condition)) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    pub fn building_condition_multiplier(
        &self,
        building: EntityId,
        condition: ConditionId,
    ) -> Option<f32> {
        self.conditions
            .get(&(building, condition))
            .map(|entry| entry.decrease_multiplier)
    }

    pub fn condition_values(&self) -> impl Iterator<Item = (EntityId, ConditionId, f32)> + '_ {
        self.conditions
            .iter()
            .map(|((building, condition), entry)| (*building, *condition, entry.value))
    }

    /// Moves an item between owners, keeping held-item lists in step.
    pub fn transfer_item_ownership(
        &mut self,
        item: EntityId,
        ownership: ItemOwnership,
    ) -> Result<(), WorldError> {
        let anchor = match ownership {
            ItemOwnership::HeldBy(owner) | ItemOwnership::PlacedIn(owner) => {
                Some(self.entities.get(&owner).ok_or(WorldError::UnknownEntity(owner))?.position)
            }
            ItemOwnership::Free => None,
        };
        let dropped_at = self.position(item);
        let entity = self
            .entities
            .get_mut(&item)
            .ok_or(WorldError::UnknownEntity(item))?;
        if entity.kind != EntityKind::Item {
            return Err(WorldError::WrongKind {
                entity: item,
                expected: EntityKind::Item,
                actual: entity.kind,
            });
        }

        let previous = entity.ownership.replace(ownership);
        entity.position = anchor.or(dropped_at).unwrap_or(entity.position);

        if let Some(ItemOwnership::HeldBy(previous_holder)) = previous {
            if let Some(held) = self.held_items.get_mut(&previous_holder) {
                held.retain(|held_id| *held_id != item);
            }
        }
        if let ItemOwnership::HeldBy(holder) = ownership {
            let held = self.held_items.entry(holder).or_default();
            if !held.contains(&item) {
                held.push(item);
            }
        }
        Ok(())
    }

    /// Deletes an entity and every row keyed by it.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id)?;
        self.needs.retain(|(owner, _), _| *owner != id);
        self.conditions.retain(|(owner, _), _| *owner != id);
        for held in self.held_items.values_mut() {
            held.retain(|held_id| *held_id != id);
        }

        if let Some(held) = self.held_items.remove(&id) {
            for item in held {
                if let Some(entity) = self.entities.get_mut(&item) {
                    entity.ownership = Some(ItemOwnership::Free);
                    entity.position = removed.position;
                }
            }
        }
        for entity in self.entities.values_mut() {
            if entity.ownership == Some(ItemOwnership::PlacedIn(id)) {
                entity.ownership = Some(ItemOwnership::Free);
                entity.position = removed.position;
            }
        }
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{
        BuildingConditionSlot, CatalogBuilder, ConditionDef, EntityTemplate, NeedDef,
    };

    fn catalog() -> (ContentCatalog, TemplateId, TemplateId, TemplateId) {
        let mut builder = CatalogBuilder::default();
        builder.add_need(NeedDef {
            id: NeedId(0),
            def_name: "need.hunger".to_string(),
            label: "Hunger".to_string(),
            max_value: 100.0,
            initial_value: 60.0,
            decrease_per_tick: 1.0,
        });
        let dirt = builder.add_condition(ConditionDef {
            id: ConditionId(0),
            def_name: "condition.clean".to_string(),
            label: "Clean".to_string(),
            max_value: 10.0,
            initial_value: 8.0,
            decrease_per_tick: 1.0,
        });
        let villager = builder.add_template(EntityTemplate::character("villager", 3.0));
        let apple = builder.add_template(EntityTemplate::item("apple"));
        let mut well = EntityTemplate::building("well");
        well.conditions.push(BuildingConditionSlot {
            condition: dirt,
            decrease_multiplier: 2.0,
        });
        let well = builder.add_template(well);
        (builder.build(), villager, apple, well)
    }

    #[test]
    fn spawn_seeds_needs_and_conditions_from_catalog() {
        let (catalog, villager, _, well) = catalog();
        let mut world = WorldState::new();
        let character = world
            .spawn(&catalog, villager, Vec2::default())
            .expect("spawn villager");
        let building = world
            .spawn(&catalog, well, Vec2 { x: 2.0, y: 0.0 })
            .expect("spawn well");

        assert_eq!(world.need(character, NeedId(0)), Some(60.0));
        assert_eq!(world.building_condition(building, ConditionId(0)), Some(8.0));
        assert_eq!(
            world.building_condition_multiplier(building, ConditionId(0)),
            Some(2.0)
        );
        assert_ne!(character, building);
    }

    #[test]
    fn spawn_unknown_template_errors() {
        let (catalog, _, _, _) = catalog();
        let mut world = WorldState::new();
        let err = world
            .spawn(&catalog, TemplateId(42), Vec2::default())
            .expect_err("unknown template");
        assert_eq!(err, WorldError::UnknownTemplate(TemplateId(42)));
    }

    #[test]
    fn held_items_leave_physical_world_and_follow_holder() {
        let (catalog, villager, apple, _) = catalog();
        let mut world = WorldState::new();
        let character = world
            .spawn(&catalog, villager, Vec2 { x: 1.0, y: 1.0 })
            .expect("villager");
        let item = world
            .spawn(&catalog, apple, Vec2 { x: 5.0, y: 5.0 })
            .expect("apple");

        world
            .transfer_item_ownership(item, ItemOwnership::HeldBy(character))
            .expect("pick up");
        assert_eq!(world.held_items(character), &[item]);
        assert!(world.physical_entities().all(|entity| entity.id != item));

        world.set_position(character, Vec2 { x: 3.0, y: 4.0 });
        assert_eq!(world.position(item), Some(Vec2 { x: 3.0, y: 4.0 }));

        world
            .transfer_item_ownership(item, ItemOwnership::Free)
            .expect("drop");
        assert!(world.held_items(character).is_empty());
        assert_eq!(world.position(item), Some(Vec2 { x: 3.0, y: 4.0 }));
    }

    #[test]
    fn removing_holder_drops_items_to_ground() {
        let (catalog, villager, apple, _) = catalog();
        let mut world = WorldState::new();
        let character = world
            .spawn(&catalog, villager, Vec2 { x: 1.0, y: 2.0 })
            .expect("villager");
        let item = world
            .spawn(&catalog, apple, Vec2::default())
            .expect("apple");
        world
            .transfer_item_ownership(item, ItemOwnership::HeldBy(character))
            .expect("pick up");

        world.remove_entity(character).expect("removed");
        let entity = world.entity(item).expect("item survives");
        assert_eq!(entity.ownership, Some(ItemOwnership::Free));
        assert_eq!(entity.position, Vec2 { x: 1.0, y: 2.0 });
        assert_eq!(world.need(character, NeedId(0)), None);
    }

    #[test]
    fn transfer_rejects_non_items() {
        let (catalog, villager, _, well) = catalog();
        let mut world = WorldState::new();
        let character = world
            .spawn(&catalog, villager, Vec2::default())
            .expect("villager");
        let building = world
            .spawn(&catalog, well, Vec2::default())
            .expect("well");
        let err = world
            .transfer_item_ownership(building, ItemOwnership::HeldBy(character))
            .expect_err("not an item");
        assert!(matches!(err, WorldError::WrongKind { .. }));
    }
}
