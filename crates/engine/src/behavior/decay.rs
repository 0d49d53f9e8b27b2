use crate::content::ContentCatalog;
use crate::world::WorldState;

/// Lowers every character need by its per-tick decrease, floored at zero.
pub fn apply_need_decay(catalog: &ContentCatalog, world: &mut WorldState) {
    let updates = world
        .need_values()
        .filter_map(|(character, need, value)| {
            let decrease = catalog.need(need)?.decrease_per_tick;
            (decrease > 0.0).then(|| (character, need, (value - decrease).max(0.0)))
        })
        .collect::<Vec<_>>();
    for (character, need, value) in updates {
        world.set_need(character, need, value);
    }
}

/// Lowers every building condition by `decreasePerTick * decreaseMultiplier`,
/// floored at zero.
pub fn apply_condition_decay(catalog: &ContentCatalog, world: &mut WorldState) {
    let updates = world
        .condition_values()
        .filter_map(|(building, condition, value)| {
            let per_tick = catalog.condition(condition)?.decrease_per_tick;
            let multiplier = world.building_condition_multiplier(building, condition)?;
            let decrease = per_tick * multiplier;
            (decrease > 0.0).then(|| (building, condition, (value - decrease).max(0.0)))
        })
        .collect::<Vec<_>>();
    for (building, condition, value) in updates {
        world.set_building_condition(building, condition, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::fixtures::{add_condition, add_need};
    use crate::content::{BuildingConditionSlot, EntityTemplate};
    use crate::world::Vec2;

    #[test]
    fn conditions_decay_by_multiplier_and_floor_at_zero() {
        let mut builder = ContentCatalog::builder();
        let clean = add_condition(&mut builder, "condition.clean", 10.0, 10.0, 2.0);
        let mut shed = EntityTemplate::building("shed");
        shed.conditions.push(BuildingConditionSlot {
            condition: clean,
            decrease_multiplier: 1.5,
        });
        let shed = builder.add_template(shed);
        let catalog = builder.build();
        let mut world = WorldState::new();
        let building = world
            .spawn(&catalog, shed, Vec2::default())
            .expect("spawn");

        apply_condition_decay(&catalog, &mut world);
        assert_eq!(world.building_condition(building, clean), Some(7.0));
        for _ in 0..5 {
            apply_condition_decay(&catalog, &mut world);
        }
        assert_eq!(world.building_condition(building, clean), Some(0.0));
    }

    #[test]
    fn needs_decay_and_floor_at_zero() {
        let mut builder = ContentCatalog::builder();
        let hunger = add_need(&mut builder, "need.hunger", 100.0, 3.0, 2.0);
        let rest = add_need(&mut builder, "need.rest", 100.0, 50.0, 0.0);
        let villager = builder.add_template(EntityTemplate::character("villager", 3.0));
        let catalog = builder.build();
        let mut world = WorldState::new();
        let character = world
            .spawn(&catalog, villager, Vec2::default())
            .expect("spawn");

        apply_need_decay(&catalog, &mut world);
        assert_eq!(world.need(character, hunger), Some(1.0));
        apply_need_decay(&catalog, &mut world);
        assert_eq!(world.need(character, hunger), Some(0.0));
        assert_eq!(world.need(character, rest), Some(50.0));
    }
}
