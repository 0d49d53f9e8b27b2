use crate::content::{ContentCatalog, EntityTemplate};
use crate::world::{EntityId, Vec2, WorldState};

use super::{CharacterBehaviorState, Facing, SimConfig};

/// Moves `current` toward `target` by at most `speed * dt_seconds`, snapping
/// when within `arrival_threshold` or when the step would overshoot.
pub fn step_toward(
    current: Vec2,
    target: Vec2,
    speed: f32,
    dt_seconds: f32,
    arrival_threshold: f32,
) -> (Vec2, bool) {
    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let distance_sq = dx * dx + dy * dy;
    let threshold_sq = arrival_threshold * arrival_threshold;
    if distance_sq <= threshold_sq {
        return (target, true);
    }

    let distance = distance_sq.sqrt();
    let max_step = speed * dt_seconds;
    if max_step >= distance {
        return (target, true);
    }

    let inv_distance = distance.recip();
    (
        Vec2 {
            x: current.x + dx * inv_distance * max_step,
            y: current.y + dy * inv_distance * max_step,
        },
        false,
    )
}

fn facing_toward(current: Facing, from: Vec2, to: Vec2) -> Facing {
    let dx = to.x - from.x;
    if dx > f32::EPSILON {
        Facing::Right
    } else if dx < -f32::EPSILON {
        Facing::Left
    } else {
        current
    }
}

/// Per-frame motion along the cached path. Independent of the tick pipeline:
/// it only consumes `path` and `target` and pops waypoints as they are reached.
pub fn advance_motion(
    catalog: &ContentCatalog,
    world: &mut WorldState,
    config: &SimConfig,
    character: EntityId,
    state: &mut CharacterBehaviorState,
    dt_seconds: f32,
) {
    let Some(position) = world.position(character) else {
        return;
    };

    let Some(&waypoint) = state.path.first() else {
        if let Some(target_position) = state.target.and_then(|target| world.position(target)) {
            state.facing = facing_toward(state.facing, position, target_position);
        }
        return;
    };

    let speed = world
        .entity(character)
        .and_then(|entity| catalog.template(entity.template))
        .map(|template| template.move_speed)
        .unwrap_or(EntityTemplate::DEFAULT_MOVE_SPEED);
    state.facing = facing_toward(state.facing, position, waypoint);
    let (next, arrived) = step_toward(
        position,
        waypoint,
        speed,
        dt_seconds,
        config.waypoint_arrival_threshold,
    );
    world.set_position(character, next);
    if arrived {
        state.path.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::fixtures::{eat_fixture, Harness};

    #[test]
    fn step_toward_moves_by_speed_times_dt_without_overshoot() {
        let (next, arrived) = step_toward(
            Vec2 { x: 0.0, y: 0.0 },
            Vec2 { x: 10.0, y: 0.0 },
            2.0,
            0.5,
            0.1,
        );
        assert!(!arrived);
        assert!((next.x - 1.0).abs() < 0.0001);
        assert!((next.y - 0.0).abs() < 0.0001);
    }

    #[test]
    fn step_toward_arrives_and_snaps_at_threshold() {
        let (next, arrived) = step_toward(
            Vec2 { x: 0.0, y: 0.0 },
            Vec2 { x: 0.05, y: 0.0 },
            5.0,
            1.0 / 60.0,
            0.1,
        );
        assert!(arrived);
        assert!((next.x - 0.05).abs() < 0.0001);
    }

    #[test]
    fn walking_left_flips_facing_and_pops_reached_waypoints() {
        let fixture = eat_fixture();
        let mut harness = Harness::new(fixture.catalog.clone());
        let villager = harness.spawn(fixture.villager, 0.0, 0.0);
        let apple = harness.spawn(fixture.apple, -1.0, 1.0);
        let mut state = CharacterBehaviorState::new();
        state.set_target(
            apple,
            vec![Vec2 { x: -1.0, y: 0.0 }, Vec2 { x: -1.0, y: 1.0 }],
        );

        // villager speed is 3.0, so 0.25s covers 0.75 of the first 1.0 leg
        advance_motion(
            &harness.catalog,
            &mut harness.world,
            &harness.config,
            villager,
            &mut state,
            0.25,
        );
        assert_eq!(state.facing(), Facing::Left);
        assert_eq!(state.path().len(), 2);
        let position = harness.world.position(villager).expect("position");
        assert!((position.x + 0.75).abs() < 0.0001);

        advance_motion(
            &harness.catalog,
            &mut harness.world,
            &harness.config,
            villager,
            &mut state,
            0.25,
        );
        assert_eq!(state.path(), &[Vec2 { x: -1.0, y: 1.0 }]);
        assert_eq!(
            harness.world.position(villager),
            Some(Vec2 { x: -1.0, y: 0.0 })
        );
    }

    #[test]
    fn empty_path_faces_target_without_moving() {
        let fixture = eat_fixture();
        let mut harness = Harness::new(fixture.catalog.clone());
        let villager = harness.spawn(fixture.villager, 0.0, 0.0);
        let apple = harness.spawn(fixture.apple, -0.3, 0.0);
        let mut state = CharacterBehaviorState::new();
        state.set_target(apple, Vec::new());

        advance_motion(
            &harness.catalog,
            &mut harness.world,
            &harness.config,
            villager,
            &mut state,
            1.0,
        );
        assert_eq!(state.facing(), Facing::Left);
        assert_eq!(harness.world.position(villager), Some(Vec2::default()));
    }
}
