use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lifesim_engine::world::NAV_BLOCKED_TILE_ID;
use lifesim_engine::{
    ContentCatalog, GridPathfinder, Pathfinder, StraightLinePathfinder, Tilemap, TilemapError,
    Vec2, WorldError, WorldState,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Scenario instance as authored in `assets/scenarios/*.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScenarioFile {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) terrain: Option<ScenarioTerrain>,
    #[serde(default)]
    pub(crate) entities: Vec<ScenarioEntity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScenarioTerrain {
    pub(crate) width: u32,
    pub(crate) height: u32,
    #[serde(default)]
    pub(crate) origin: Vec2,
    /// Row-major tile ids; omitted means every tile is walkable ground.
    #[serde(default)]
    pub(crate) tiles: Option<Vec<u16>>,
    #[serde(default)]
    pub(crate) blocked: Vec<[u32; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScenarioEntity {
    pub(crate) template: String,
    pub(crate) position: Vec2,
    #[serde(default)]
    pub(crate) needs: BTreeMap<String, f32>,
    #[serde(default)]
    pub(crate) conditions: BTreeMap<String, f32>,
}

#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    #[error("failed to read scenario '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse scenario json at {location}: {message}")]
    Parse { location: String, message: String },
    #[error("invalid scenario at {location}: {message}")]
    Invalid { location: String, message: String },
    #[error("invalid scenario terrain: {0}")]
    Terrain(#[from] TilemapError),
    #[error(transparent)]
    World(#[from] WorldError),
}

pub(crate) struct LoadedScenario {
    pub(crate) name: String,
    pub(crate) world: WorldState,
    pub(crate) pathfinder: Box<dyn Pathfinder>,
}

pub(crate) fn load_scenario(
    path: &Path,
    catalog: &ContentCatalog,
) -> Result<LoadedScenario, ScenarioError> {
    let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_scenario_json(&raw)?;
    let loaded = build_scenario(&file, catalog)?;
    info!(
        scenario = loaded.name.as_str(),
        path = %path.display(),
        entity_count = loaded.world.entity_count(),
        characters = loaded.world.character_ids().len(),
        has_terrain = file.terrain.is_some(),
        "scenario_loaded"
    );
    Ok(loaded)
}

pub(crate) fn parse_scenario_json(raw: &str) -> Result<ScenarioFile, ScenarioError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ScenarioFile>(&mut deserializer).map_err(|error| {
        let location = error.path().to_string();
        ScenarioError::Parse {
            location,
            message: error.into_inner().to_string(),
        }
    })
}

fn invalid(location: impl Into<String>, message: impl Into<String>) -> ScenarioError {
    ScenarioError::Invalid {
        location: location.into(),
        message: message.into(),
    }
}

fn finite_position(location: &str, position: Vec2) -> Result<Vec2, ScenarioError> {
    if position.x.is_finite() && position.y.is_finite() {
        Ok(position)
    } else {
        Err(invalid(location, "expected finite coordinates"))
    }
}

pub(crate) fn build_scenario(
    file: &ScenarioFile,
    catalog: &ContentCatalog,
) -> Result<LoadedScenario, ScenarioError> {
    let pathfinder: Box<dyn Pathfinder> = match &file.terrain {
        Some(terrain) => Box::new(GridPathfinder::from_tilemap(&build_tilemap(terrain)?)),
        None => Box::new(StraightLinePathfinder),
    };

    let mut world = WorldState::new();
    for (index, spec) in file.entities.iter().enumerate() {
        let template = catalog
            .template_id_by_name(&spec.template)
            .ok_or_else(|| {
                invalid(
                    format!("entities[{index}].template"),
                    format!("unknown template '{}'", spec.template),
                )
            })?;
        let position = finite_position(&format!("entities[{index}].position"), spec.position)?;
        let id = world.spawn(catalog, template, position)?;

        for (name, value) in &spec.needs {
            let location = format!("entities[{index}].needs.{name}");
            let need = catalog
                .need_id_by_name(name)
                .and_then(|need| catalog.need(need))
                .ok_or_else(|| invalid(&location, "unknown need"))?;
            if world.need(id, need.id).is_none() {
                return Err(invalid(&location, "only characters carry needs"));
            }
            if !value.is_finite() || *value < 0.0 || *value > need.max_value {
                return Err(invalid(
                    &location,
                    format!("expected a value in 0..={}, got {value}", need.max_value),
                ));
            }
            world.set_need(id, need.id, *value);
        }

        for (name, value) in &spec.conditions {
            let location = format!("entities[{index}].conditions.{name}");
            let condition = catalog
                .condition_id_by_name(name)
                .and_then(|condition| catalog.condition(condition))
                .ok_or_else(|| invalid(&location, "unknown condition"))?;
            if world.building_condition(id, condition.id).is_none() {
                return Err(invalid(&location, "building does not carry this condition"));
            }
            if !value.is_finite() || *value < 0.0 || *value > condition.max_value {
                return Err(invalid(
                    &location,
                    format!("expected a value in 0..={}, got {value}", condition.max_value),
                ));
            }
            world.set_building_condition(id, condition.id, *value);
        }
    }

    Ok(LoadedScenario {
        name: file.name.clone(),
        world,
        pathfinder,
    })
}

fn build_tilemap(terrain: &ScenarioTerrain) -> Result<Tilemap, ScenarioError> {
    finite_position("terrain.origin", terrain.origin)?;
    let mut tilemap = match &terrain.tiles {
        Some(tiles) => Tilemap::new(terrain.width, terrain.height, terrain.origin, tiles.clone())?,
        None => Tilemap::filled(terrain.width, terrain.height, terrain.origin, 0)?,
    };
    for (index, [x, y]) in terrain.blocked.iter().copied().enumerate() {
        if !tilemap.set_tile(x, y, NAV_BLOCKED_TILE_ID) {
            return Err(invalid(
                format!("terrain.blocked[{index}]"),
                format!("tile ({x}, {y}) is outside {}x{}", terrain.width, terrain.height),
            ));
        }
    }
    Ok(tilemap)
}
