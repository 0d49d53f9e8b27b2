use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod behavior;
pub mod content;
pub mod world;

pub use app::{
    run_headless, LoopConfig, LoopMetricsSnapshot, LoopSummary, MetricsHandle, Simulation,
    TickReport,
};
pub use behavior::{
    BehaviorError, BehaviorEvent, BehaviorEventCounts, CharacterBehaviorState,
    ContentIntegrityError, PriorityTieBreak, SimConfig, Tick, TickOutcome,
};
pub use content::{
    compile_content_catalog, ContentCatalog, ContentCompileError, ContentErrorCode,
    ContentLoadRequest, SourceLocation,
};
pub use world::{
    EntityId, GridPathfinder, Pathfinder, StraightLinePathfinder, Tilemap, TilemapError, Vec2,
    WorldError, WorldState,
};

pub const ROOT_ENV_VAR: &str = "LIFESIM_ROOT";

/// Directories the binary reads from, all derived from the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub scenarios_dir: PathBuf,
}

impl AppPaths {
    pub fn for_root(root: PathBuf) -> Self {
        let assets = root.join("assets");
        Self {
            base_content_dir: assets.join("base"),
            scenarios_dir: assets.join("scenarios"),
            mods_dir: root.join("mods"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] io::Error),
    #[error("LIFESIM_ROOT points at {path}, which has no Cargo.toml and assets/base/")]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "no lifesim root (Cargo.toml + assets/base/) above {start_dir}; \
set LIFESIM_ROOT=/path/to/lifesim"
    )]
    RootNotFound { start_dir: PathBuf },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = locate_root(env::var(ROOT_ENV_VAR), env::current_exe)?;
    Ok(AppPaths::for_root(root))
}

/// An explicit root must be valid as given; otherwise the first ancestor of
/// the executable's directory that looks like the repository wins.
fn locate_root(
    env_root: Result<String, env::VarError>,
    current_exe: impl FnOnce() -> io::Result<PathBuf>,
) -> Result<PathBuf, StartupError> {
    match env_root {
        Ok(value) => {
            let path = normalize_path(Path::new(&value));
            if is_repo_root(&path) {
                Ok(path)
            } else {
                Err(StartupError::InvalidEnvRoot { path })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = current_exe().map_err(StartupError::CurrentExe)?;
            let start_dir = exe.parent().unwrap_or(&exe);
            start_dir
                .ancestors()
                .find(|candidate| is_repo_root(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(start_dir),
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").join("base").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
