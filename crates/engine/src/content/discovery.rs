use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::{ContentDiscoveryError, ContentLoadRequest};

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub source_dir: PathBuf,
}

/// Base content first, then enabled mods in request order.
pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentLoadRequest,
) -> Result<Vec<ModSource>, ContentDiscoveryError> {
    if !app_paths.base_content_dir.is_dir() {
        return Err(ContentDiscoveryError::BaseContentMissing {
            expected_dir: app_paths.base_content_dir.clone(),
        });
    }

    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for mod_id in &request.enabled_mods {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentDiscoveryError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(ContentDiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        if !mod_dir.is_dir() {
            return Err(ContentDiscoveryError::EnabledModMissing {
                mod_id: trimmed.to_string(),
                expected_dir: mod_dir,
            });
        }
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

/// XML files under `root`, ordered by normalized relative path.
pub(crate) fn collect_xml_files_sorted(
    root: &Path,
) -> Result<Vec<(String, PathBuf)>, ContentDiscoveryError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ContentDiscoveryError> {
    let entries = fs::read_dir(current).map_err(|source| ContentDiscoveryError::ReadDir {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ContentDiscoveryError::ReadDir {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
            continue;
        }
        if !is_xml_file(&path) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        files.push((normalize_rel_path(rel), path.clone()));
    }
    Ok(())
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn app_paths(root: &Path) -> AppPaths {
        AppPaths::for_root(root.to_path_buf())
    }

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("assets").join("base")).expect("create base");
        fs::create_dir_all(root.join("mods").join("b")).expect("create mod b");
        fs::create_dir_all(root.join("mods").join("a")).expect("create mod a");
        let request = ContentLoadRequest {
            enabled_mods: vec!["b".to_string(), "a".to_string()],
        };

        let sources = discover_mod_sources(&app_paths(root), &request).expect("discover");
        let ids = sources.iter().map(|s| s.mod_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["base", "b", "a"]);
    }

    #[test]
    fn duplicate_and_missing_mods_error() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("assets").join("base")).expect("create base");
        fs::create_dir_all(root.join("mods").join("a")).expect("create mod a");

        let duplicate = ContentLoadRequest {
            enabled_mods: vec!["a".to_string(), " a ".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths(root), &duplicate),
            Err(ContentDiscoveryError::DuplicateEnabledMod { .. })
        ));

        let missing = ContentLoadRequest {
            enabled_mods: vec!["nope".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths(root), &missing),
            Err(ContentDiscoveryError::EnabledModMissing { .. })
        ));
    }

    #[test]
    fn xml_files_are_sorted_and_filtered() {
        let temp = TempDir::new().expect("tempdir");
        let dir = temp.path();
        fs::create_dir_all(dir.join("b")).expect("mkdir");
        fs::write(dir.join("b").join("z.xml"), "<Defs/>").expect("write");
        fs::write(dir.join("a.XML"), "<Defs/>").expect("write");
        fs::write(dir.join("notes.txt"), "skip").expect("write");

        let files = collect_xml_files_sorted(dir).expect("collect");
        let names = files.iter().map(|(rel, _)| rel.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a.XML", "b/z.xml"]);
    }
}
