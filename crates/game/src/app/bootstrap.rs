use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use lifesim_engine::{ContentLoadRequest, LoopConfig, PriorityTieBreak, SimConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ENABLED_MODS_ENV_VAR: &str = "LIFESIM_ENABLED_MODS";
const SCENARIO_ENV_VAR: &str = "LIFESIM_SCENARIO";
const MAX_TICKS_ENV_VAR: &str = "LIFESIM_MAX_TICKS";
const TPS_ENV_VAR: &str = "LIFESIM_TPS";
const MAX_STALL_TICKS_ENV_VAR: &str = "LIFESIM_MAX_STALL_TICKS";
const TIE_BREAK_ENV_VAR: &str = "LIFESIM_TIE_BREAK";
const REALTIME_ENV_VAR: &str = "LIFESIM_REALTIME";
const SNAPSHOT_IN_ENV_VAR: &str = "LIFESIM_SNAPSHOT_IN";
const SNAPSHOT_OUT_ENV_VAR: &str = "LIFESIM_SNAPSHOT_OUT";
const DEFAULT_SCENARIO: &str = "demo";

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) sim_config: SimConfig,
    pub(crate) load_request: ContentLoadRequest,
    /// Scenario name under `assets/scenarios/`, or a path to a scenario file.
    pub(crate) scenario: String,
    pub(crate) snapshot_in: Option<PathBuf>,
    pub(crate) snapshot_out: Option<PathBuf>,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== lifesim startup ===");
    build_wiring(|var| env::var(var))
}

fn build_wiring(read: impl Fn(&'static str) -> Result<String, env::VarError>) -> AppWiring {
    let mut loop_config = LoopConfig::default();
    if let Some(tps) = parse_env_value::<u32>(TPS_ENV_VAR, read(TPS_ENV_VAR)) {
        loop_config.target_tps = tps;
    }
    if let Some(max_ticks) = parse_env_value::<u64>(MAX_TICKS_ENV_VAR, read(MAX_TICKS_ENV_VAR)) {
        // 0 runs until the process is stopped
        loop_config.max_ticks = (max_ticks > 0).then_some(max_ticks);
    }
    if let Some(realtime) = parse_flag(REALTIME_ENV_VAR, read(REALTIME_ENV_VAR)) {
        loop_config.realtime = realtime;
    }

    let mut sim_config = SimConfig::default();
    if let Some(max_stall_ticks) =
        parse_env_value::<u32>(MAX_STALL_TICKS_ENV_VAR, read(MAX_STALL_TICKS_ENV_VAR))
    {
        sim_config.max_stall_ticks = max_stall_ticks;
    }
    if let Some(raw) = present_value(TIE_BREAK_ENV_VAR, read(TIE_BREAK_ENV_VAR)) {
        match PriorityTieBreak::parse(&raw) {
            Some(tie_break) => sim_config.tie_break = tie_break,
            None => warn!(
                env_var = TIE_BREAK_ENV_VAR,
                value = raw.as_str(),
                "invalid env var value; falling back to default"
            ),
        }
    }

    let enabled_mods = present_value(ENABLED_MODS_ENV_VAR, read(ENABLED_MODS_ENV_VAR))
        .map(|raw| parse_enabled_mods(&raw))
        .unwrap_or_default();
    let scenario = present_value(SCENARIO_ENV_VAR, read(SCENARIO_ENV_VAR))
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());

    AppWiring {
        loop_config,
        sim_config,
        load_request: ContentLoadRequest { enabled_mods },
        scenario,
        snapshot_in: present_value(SNAPSHOT_IN_ENV_VAR, read(SNAPSHOT_IN_ENV_VAR))
            .map(PathBuf::from),
        snapshot_out: present_value(SNAPSHOT_OUT_ENV_VAR, read(SNAPSHOT_OUT_ENV_VAR))
            .map(PathBuf::from),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn present_value(var: &'static str, value: Result<String, env::VarError>) -> Option<String> {
    match value {
        Ok(raw) => Some(raw),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            None
        }
    }
}

fn parse_env_value<T: FromStr>(
    var: &'static str,
    value: Result<String, env::VarError>,
) -> Option<T> {
    let raw = present_value(var, value)?;
    match raw.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(
                env_var = var,
                value = raw.as_str(),
                "invalid env var value; falling back to default"
            );
            None
        }
    }
}

fn parse_flag(var: &'static str, value: Result<String, env::VarError>) -> Option<bool> {
    let raw = present_value(var, value)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(
                env_var = var,
                value = raw.as_str(),
                "invalid env var value; falling back to default"
            );
            None
        }
    }
}

fn parse_enabled_mods(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}
