//! Project-level context: a discoverable `BMO.md` per directory, plus
//! per-project config sidecars keyed by a hash of the project path.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::bmo::error::Result;

const MAX_ANCESTOR_LEVELS: usize = 10;

fn data_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("bmo").join("data")
}

fn user_bmo_md() -> PathBuf {
    data_dir().join("BMO.md")
}

fn project_configs_dir() -> PathBuf {
    data_dir().join("projects")
}

fn project_key(project_path: &Path) -> String {
    let resolved = project_path.canonicalize().unwrap_or_else(|_| project_path.to_path_buf());
    let digest = md5::compute(resolved.to_string_lossy().as_bytes());
    format!("{digest:x}")[..12].to_string()
}

/// User-level `BMO.md` first (if present), then every ancestor's `BMO.md`
/// or `.bmo/BMO.md` walking up to 10 levels, ordered furthest-ancestor-first.
pub fn find_bmo_md(working_dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let user_path = user_bmo_md();
    if user_path.is_file() {
        found.push(user_path);
    }

    let mut ancestor_candidates = Vec::new();
    let mut current = working_dir.canonicalize().unwrap_or_else(|_| working_dir.to_path_buf());
    for _ in 0..MAX_ANCESTOR_LEVELS {
        let direct = current.join("BMO.md");
        if direct.is_file() {
            ancestor_candidates.push(direct);
        }
        let nested = current.join(".bmo").join("BMO.md");
        if nested.is_file() {
            ancestor_candidates.push(nested);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => break,
        }
    }
    ancestor_candidates.reverse();
    found.extend(ancestor_candidates);
    found
}

/// Load and concatenate every discovered `BMO.md`, each wrapped with a
/// header naming its path relative to `working_dir`.
pub fn load_bmo_md(working_dir: &Path) -> String {
    find_bmo_md(working_dir)
        .into_iter()
        .filter_map(|path| {
            let contents = std::fs::read_to_string(&path).ok()?;
            if contents.trim().is_empty() {
                return None;
            }
            let rel = path.strip_prefix(working_dir).unwrap_or(&path).to_string_lossy().to_string();
            Some(format!("# Project Context ({rel})\n{contents}"))
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn default_template(directory: &Path) -> String {
    let name = directory.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "project".to_string());
    format!(
        "# {name}\n\n\
## Project Overview\n\n\
<!-- What this project does and who it's for -->\n\n\
## Build & Dev Commands\n\n\
<!-- How to build, test, and run this project -->\n\n\
## Architecture\n\n\
<!-- High-level structure and key modules -->\n\n\
## Key Conventions\n\n\
<!-- Naming, style, and patterns this project follows -->\n\n\
## Important Paths\n\n\
<!-- Directories or files agents should know about -->\n\n\
## Notes\n\n\
<!-- Anything else worth remembering -->\n"
    )
}

pub fn create_bmo_md(directory: &Path, content: Option<&str>) -> Result<PathBuf> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join("BMO.md");
    let body = content.map(String::from).unwrap_or_else(|| default_template(directory));
    std::fs::write(&path, body)?;
    Ok(path)
}

pub fn save_project_config(project_path: &Path, config: Value) -> Result<PathBuf> {
    let dir = project_configs_dir();
    std::fs::create_dir_all(&dir)?;

    let resolved = project_path.canonicalize().unwrap_or_else(|_| project_path.to_path_buf());
    let key = project_key(&resolved);
    let name = resolved.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    let mut doc = json!({"project_path": resolved.to_string_lossy(), "project_name": name});
    if let (Some(doc_map), Some(config_map)) = (doc.as_object_mut(), config.as_object()) {
        for (k, v) in config_map {
            doc_map.insert(k.clone(), v.clone());
        }
    }

    let path = dir.join(format!("{key}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
    Ok(path)
}

pub fn load_project_config(project_path: &Path) -> Option<Value> {
    let resolved = project_path.canonicalize().unwrap_or_else(|_| project_path.to_path_buf());
    let key = project_key(&resolved);
    let path = project_configs_dir().join(format!("{key}.json"));
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_bmo_md_orders_ancestor_first() {
        let root = tempfile::tempdir().unwrap();
        let child = root.path().join("child");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(root.path().join("BMO.md"), "root context").unwrap();
        std::fs::write(child.join("BMO.md"), "child context").unwrap();

        let found = find_bmo_md(&child);
        let last_two: Vec<_> = found.iter().rev().take(2).collect();
        assert!(last_two[1].starts_with(root.path()));
        assert!(last_two[0].starts_with(&child));
    }

    #[test]
    fn save_and_load_project_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());
        save_project_config(dir.path(), json!({"default_agent": "code"})).unwrap();
        let loaded = load_project_config(dir.path()).unwrap();
        assert_eq!(loaded["default_agent"], "code");
    }
}
