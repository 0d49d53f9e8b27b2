use std::path::{Path, PathBuf};
use std::process::ExitCode;

use lifesim_engine::{
    compile_content_catalog, resolve_app_paths, run_headless, AppPaths, ContentCompileError,
    MetricsHandle, Simulation, StartupError,
};
use thiserror::Error;
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::scenario::{load_scenario, ScenarioError};
use super::snapshot::{apply_snapshot, capture_snapshot, read_snapshot, write_snapshot, SnapshotError};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to compile content catalog: {0}")]
    Content(#[from] ContentCompileError),
    #[error("failed to load scenario: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("runtime snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = try_run(app) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_run(app: AppWiring) -> Result<(), AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        mods_dir = %app_paths.mods_dir.display(),
        scenarios_dir = %app_paths.scenarios_dir.display(),
        "startup"
    );
    run_scenario(&app_paths, app)
}

fn run_scenario(app_paths: &AppPaths, app: AppWiring) -> Result<(), AppError> {
    let catalog = compile_content_catalog(app_paths, &app.load_request)?;
    let scenario_path = resolve_scenario_path(app_paths, &app.scenario);
    let scenario = load_scenario(&scenario_path, &catalog)?;
    let scenario_name = scenario.name;
    let mut simulation = Simulation::new(
        catalog,
        scenario.world,
        scenario.pathfinder,
        app.sim_config,
    );

    if let Some(path) = &app.snapshot_in {
        apply_snapshot(&mut simulation, &scenario_name, read_snapshot(path)?)?;
        info!(
            path = %path.display(),
            tick = simulation.tick(),
            characters = simulation.runtime_states().len(),
            "snapshot_loaded"
        );
    }

    let metrics = MetricsHandle::default();
    let summary = run_headless(&mut simulation, &app.loop_config, &metrics);
    for (character, state) in simulation.runtime_states() {
        info!(
            character = ?character,
            behavior = ?state.active_behavior(),
            target = ?state.target(),
            "character_final_state"
        );
    }

    if let Some(path) = &app.snapshot_out {
        write_snapshot(path, &capture_snapshot(&simulation, &scenario_name))?;
        info!(
            path = %path.display(),
            tick = simulation.tick(),
            ticks_run = summary.ticks_run,
            "snapshot_written"
        );
    }
    Ok(())
}

/// A bare name maps to `assets/scenarios/<name>.json`; anything path-like is
/// used as given.
fn resolve_scenario_path(app_paths: &AppPaths, scenario: &str) -> PathBuf {
    let as_path = Path::new(scenario);
    if as_path.extension().is_some() || as_path.components().count() > 1 {
        as_path.to_path_buf()
    } else {
        app_paths.scenarios_dir.join(format!("{scenario}.json"))
    }
}
