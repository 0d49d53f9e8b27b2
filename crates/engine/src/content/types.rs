use std::path::PathBuf;

use thiserror::Error;

/// Which content packs to layer over `assets/base`, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentLoadRequest {
    pub enabled_mods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ContentDiscoveryError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
    #[error("base content directory does not exist: {expected_dir}")]
    BaseContentMissing { expected_dir: PathBuf },
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
