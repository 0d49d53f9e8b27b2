use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lifesim_engine::{CharacterBehaviorState, EntityId, Simulation, Tick, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const SNAPSHOT_VERSION: u32 = 1;

/// Resumable runtime state of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RuntimeSnapshot {
    pub(crate) snapshot_version: u32,
    pub(crate) scenario: String,
    pub(crate) content_fingerprint: Option<String>,
    pub(crate) tick: Tick,
    pub(crate) characters: Vec<SavedCharacter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SavedCharacter {
    pub(crate) entity: EntityId,
    pub(crate) position: Vec2,
    #[serde(default)]
    pub(crate) needs: BTreeMap<String, f32>,
    pub(crate) state: CharacterBehaviorState,
}

#[derive(Debug, Error)]
pub(crate) enum SnapshotError {
    #[error("failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write snapshot '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode snapshot json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse snapshot json at {location}: {message}")]
    Parse { location: String, message: String },
    #[error("validation failed at {location}: {message}")]
    Validation { location: String, message: String },
}

pub(crate) fn capture_snapshot(simulation: &Simulation, scenario: &str) -> RuntimeSnapshot {
    let catalog = simulation.catalog();
    let world = simulation.world();
    let characters = simulation
        .runtime_states()
        .iter()
        .filter_map(|(&entity, state)| {
            let position = world.position(entity)?;
            let needs = catalog
                .needs()
                .iter()
                .filter_map(|need| {
                    world
                        .need(entity, need.id)
                        .map(|value| (need.def_name.clone(), value))
                })
                .collect();
            Some(SavedCharacter {
                entity,
                position,
                needs,
                state: state.clone(),
            })
        })
        .collect();

    RuntimeSnapshot {
        snapshot_version: SNAPSHOT_VERSION,
        scenario: scenario.to_string(),
        content_fingerprint: catalog.fingerprint().map(ToString::to_string),
        tick: simulation.tick(),
        characters,
    }
}

pub(crate) fn write_snapshot(path: &Path, snapshot: &RuntimeSnapshot) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Encode)?;
    write_text_atomic(path, &json).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_snapshot(path: &Path) -> Result<RuntimeSnapshot, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot_json(&raw)
}

pub(crate) fn parse_snapshot_json(raw: &str) -> Result<RuntimeSnapshot, SnapshotError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, RuntimeSnapshot>(&mut deserializer).map_err(|error| {
        let location = error.path().to_string();
        SnapshotError::Parse {
            location,
            message: error.into_inner().to_string(),
        }
    })
}

/// Validates `snapshot` against the running simulation, then restores
/// character positions, needs and behavior states.
pub(crate) fn apply_snapshot(
    simulation: &mut Simulation,
    scenario: &str,
    snapshot: RuntimeSnapshot,
) -> Result<(), SnapshotError> {
    validate_snapshot(simulation, scenario, &snapshot)?;

    let mut states = BTreeMap::new();
    for saved in snapshot.characters {
        let needs = saved
            .needs
            .iter()
            .filter_map(|(name, value)| {
                simulation
                    .catalog()
                    .need_id_by_name(name)
                    .map(|need| (need, *value))
            })
            .collect::<Vec<_>>();
        let world = simulation.world_mut();
        world.set_position(saved.entity, saved.position);
        for (need, value) in needs {
            world.set_need(saved.entity, need, value);
        }
        states.insert(saved.entity, saved.state);
    }
    simulation.restore_runtime_states(snapshot.tick, states);
    Ok(())
}

fn validation_err(location: &str, message: impl Into<String>) -> SnapshotError {
    SnapshotError::Validation {
        location: location.to_string(),
        message: message.into(),
    }
}

fn expected_actual(location: &str, expected: impl Display, actual: impl Display) -> SnapshotError {
    validation_err(location, format!("expected {expected}, got {actual}"))
}

fn validate_snapshot(
    simulation: &Simulation,
    scenario: &str,
    snapshot: &RuntimeSnapshot,
) -> Result<(), SnapshotError> {
    if snapshot.snapshot_version != SNAPSHOT_VERSION {
        return Err(expected_actual(
            "snapshot_version",
            SNAPSHOT_VERSION,
            snapshot.snapshot_version,
        ));
    }
    if snapshot.scenario != scenario {
        return Err(expected_actual("scenario", scenario, &snapshot.scenario));
    }
    let catalog = simulation.catalog();
    let fingerprint = catalog.fingerprint();
    if snapshot.content_fingerprint.as_deref() != fingerprint {
        return Err(expected_actual(
            "content_fingerprint",
            fingerprint.unwrap_or("none"),
            snapshot.content_fingerprint.as_deref().unwrap_or("none"),
        ));
    }

    let mut known_entities = HashMap::with_capacity(snapshot.characters.len());
    for (index, saved) in snapshot.characters.iter().enumerate() {
        let entity_path = format!("characters[{index}].entity");
        if let Some(first_index) = known_entities.insert(saved.entity, index) {
            return Err(validation_err(
                &entity_path,
                format!(
                    "duplicate entity {} (first seen at characters[{first_index}].entity)",
                    saved.entity.0
                ),
            ));
        }
        if simulation.state(saved.entity).is_none() {
            return Err(validation_err(
                &entity_path,
                format!("entity {} is not a live character", saved.entity.0),
            ));
        }
        if !saved.position.x.is_finite() {
            return Err(expected_actual(
                &format!("characters[{index}].position.x"),
                "finite number",
                saved.position.x,
            ));
        }
        if !saved.position.y.is_finite() {
            return Err(expected_actual(
                &format!("characters[{index}].position.y"),
                "finite number",
                saved.position.y,
            ));
        }
        for (name, value) in &saved.needs {
            let need_path = format!("characters[{index}].needs.{name}");
            let need = catalog
                .need_id_by_name(name)
                .and_then(|need| catalog.need(need))
                .ok_or_else(|| validation_err(&need_path, "unknown need"))?;
            if !value.is_finite() || *value < 0.0 || *value > need.max_value {
                return Err(expected_actual(
                    &need_path,
                    format!("value in 0..={}", need.max_value),
                    value,
                ));
            }
        }

        let state = &saved.state;
        for (candidate_index, behavior) in state.candidates().iter().enumerate() {
            if catalog.behavior(*behavior).is_none() {
                return Err(validation_err(
                    &format!("characters[{index}].state.candidates[{candidate_index}]"),
                    format!("unknown behavior {}", behavior.0),
                ));
            }
        }
        if let Some(action) = state.phase().action() {
            if catalog.behavior_action(action).is_none() {
                return Err(validation_err(
                    &format!("characters[{index}].state.phase"),
                    format!("unknown behavior action {}", action.0),
                ));
            }
        }
        if let Some(active) = state.phase().active_interaction() {
            if catalog.interaction_action(active.node).is_none() {
                return Err(validation_err(
                    &format!("characters[{index}].state.phase"),
                    format!("unknown interaction action {}", active.node.0),
                ));
            }
        }
    }
    Ok(())
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text.as_bytes())?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot.json");
    path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use lifesim_engine::{LoopConfig, MetricsHandle, SimConfig};
    use tempfile::TempDir;

    use super::*;
    use crate::app::scenario::{build_scenario, parse_scenario_json};
    use crate::app::test_support::compile_demo_catalog;

    const CAMP: &str = r#"{
        "name": "camp",
        "entities": [
            { "template": "character.villager", "position": { "x": 0.0, "y": 0.0 }, "needs": { "need.hunger": 30.0 } },
            { "template": "character.villager", "position": { "x": 4.0, "y": 0.0 }, "needs": { "need.energy": 10.0 } },
            { "template": "item.apple", "position": { "x": 2.0, "y": 1.0 } },
            { "template": "building.bed", "position": { "x": 6.0, "y": 0.0 } }
        ]
    }"#;

    fn camp_simulation() -> Simulation {
        let catalog = compile_demo_catalog();
        let file = parse_scenario_json(CAMP).expect("parse");
        let loaded = build_scenario(&file, &catalog).expect("build");
        Simulation::new(catalog, loaded.world, loaded.pathfinder, SimConfig::default())
    }

    fn run_ticks(simulation: &mut Simulation, ticks: u64) {
        let config = LoopConfig {
            target_tps: 4,
            target_fps: 20,
            max_ticks: Some(ticks),
            ..LoopConfig::default()
        };
        lifesim_engine::run_headless(simulation, &config, &MetricsHandle::default());
    }

    #[test]
    fn written_snapshot_resumes_mid_behavior() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("snapshots").join("camp.json");
        let mut original = camp_simulation();
        run_ticks(&mut original, 3);

        let snapshot = capture_snapshot(&original, "camp");
        assert!(snapshot
            .characters
            .iter()
            .any(|saved| !saved.state.is_cleared()));
        write_snapshot(&path, &snapshot).expect("write");
        assert!(!temp_path_for(&path).exists());

        let mut resumed = camp_simulation();
        apply_snapshot(&mut resumed, "camp", read_snapshot(&path).expect("read")).expect("apply");
        assert_eq!(resumed.tick(), original.tick());
        assert_eq!(resumed.runtime_states(), original.runtime_states());

        run_ticks(&mut original, 10);
        run_ticks(&mut resumed, 10);
        assert_eq!(resumed.runtime_states(), original.runtime_states());
        for character in original.world().character_ids() {
            assert_eq!(
                resumed.world().position(character),
                original.world().position(character)
            );
        }
    }

    #[test]
    fn fingerprint_and_scenario_mismatches_are_rejected() {
        let simulation = camp_simulation();
        let mut snapshot = capture_snapshot(&simulation, "camp");

        let mut other = camp_simulation();
        let err = apply_snapshot(&mut other, "village", snapshot.clone()).expect_err("scenario");
        assert!(err.to_string().contains("at scenario"));

        snapshot.content_fingerprint = Some("0".repeat(64));
        let err = apply_snapshot(&mut other, "camp", snapshot).expect_err("fingerprint");
        assert!(err.to_string().contains("content_fingerprint"));
    }

    #[test]
    fn unknown_need_and_non_character_entities_are_rejected() {
        let simulation = camp_simulation();
        let base = capture_snapshot(&simulation, "camp");

        let mut unknown_need = base.clone();
        unknown_need.characters[0]
            .needs
            .insert("need.joy".to_string(), 5.0);
        let mut target = camp_simulation();
        let err = apply_snapshot(&mut target, "camp", unknown_need).expect_err("need");
        assert!(err.to_string().contains("characters[0].needs.need.joy"));

        let mut apple_as_character = base;
        apple_as_character.characters[1].entity = EntityId(2);
        let err = apply_snapshot(&mut target, "camp", apple_as_character).expect_err("entity");
        assert!(err.to_string().contains("not a live character"));
    }

    #[test]
    fn parse_error_reports_json_path() {
        let simulation = camp_simulation();
        let snapshot = capture_snapshot(&simulation, "camp");
        let mut value = serde_json::to_value(&snapshot).expect("to value");
        value["characters"][1]["position"]["y"] = serde_json::Value::String("up".to_string());
        let raw = serde_json::to_string(&value).expect("to string");

        match parse_snapshot_json(&raw) {
            Err(SnapshotError::Parse { location, .. }) => {
                assert_eq!(location, "characters[1].position.y");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
