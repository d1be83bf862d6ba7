//! Hierarchical settings: discovery, deep-merge, dotted-key access, hot reload.
//!
//! Discovery order (most general first): a user-global file at
//! `<home>/bmo/data/settings.json`, then every `.bmo/settings.local.json`
//! found walking up from the working directory (bounded at 10 levels),
//! merged ancestor-first so the file nearest the working directory wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bmo::error::{BmoError, Result};
use crate::bmo::glob::GlobSet;

const MAX_ANCESTOR_LEVELS: usize = 10;
const WATCH_INTERVAL_SECS: u64 = 2;
const SECRET_EXACT_NAMES: &[&str] = &["gpu_server_key", "maps_api_key", "ssh_key_path"];
const SECRET_SUBSTRINGS: &[&str] = &["key", "token", "secret", "authorization"];

/// A callback invoked after every successful reload, e.g. to reconcile MCP
/// servers or re-apply per-agent runtime knobs. Errors are logged and do not
/// stop the remaining callbacks from running.
pub type ChangeCallback = Box<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

fn user_settings_path() -> PathBuf {
    home::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bmo")
        .join("data")
        .join("settings.json")
}

fn default_settings() -> Value {
    json!({
        "llm": {},
        "tools": {
            "allow": [],
            "deny": [],
            "custom_destructive_patterns": [],
            "trusted_directories": [],
            "auto_approve_destructive": false,
            "max_tool_calls_per_turn": 10,
            "max_output_length": 8000,
            "command_timeout": 30,
        },
        "agents": {},
        "router": {
            "custom_prefixes": {},
            "custom_keywords": {},
            "disable_tiers": [],
            "default_agent": "conversation",
        },
        "plan_mode": {
            "max_plan_steps": 20,
            "auto_approve_plans": false,
        },
        "mcp": {
            "servers": {},
            "agent_tools": {},
            "readonly_tools": ["mcp__*__list*", "mcp__*__get*", "mcp__*__read*", "mcp__*__search*"],
            "output_max_tokens": 25000,
        },
        "hooks": {
            "preToolUse": [],
            "postToolUse": [],
        },
        "memory": {
            "enabled": true,
            "max_lines_loaded": 200,
        },
        "ui": {
            "max_history": 200,
            "auto_compact_threshold": 150,
            "compact_preserve_last": 5,
        },
    })
}

/// Recursive deep-merge: dict keys merge recursively, everything else
/// (lists, scalars, type mismatches) is replaced wholesale by `overlay`.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                let new_val = match merged.get(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v.clone(),
                };
                merged.insert(k.clone(), new_val);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

fn find_project_files(start_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let mut current = start_dir.canonicalize().unwrap_or_else(|_| start_dir.to_path_buf());

    for _ in 0..MAX_ANCESTOR_LEVELS {
        let candidate = current.join(".bmo").join("settings.local.json");
        if candidate.is_file() {
            candidates.push(candidate);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => break,
        }
    }

    // Ancestor-first: we collected nearest-to-farthest, so reverse.
    candidates.reverse();
    candidates
}

fn read_json_file(path: &Path) -> Option<Value> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "settings file failed to parse, skipping");
            None
        }
    }
}

fn is_secret_leaf(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SECRET_EXACT_NAMES.contains(&lower.as_str())
        || SECRET_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

fn redact_recursive(value: &Value, depth: usize) -> Value {
    if depth > 20 {
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if is_secret_leaf(k) {
                    if let Value::String(s) = v {
                        out.insert(k.clone(), if s.is_empty() { v.clone() } else { json!("***") });
                        continue;
                    }
                }
                out.insert(k.clone(), redact_recursive(v, depth + 1));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_recursive(v, depth + 1)).collect()),
        other => other.clone(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsLevel {
    User,
    Project,
}

struct Inner {
    merged: Value,
    known_files: Vec<PathBuf>,
    mtimes: HashMap<PathBuf, SystemTime>,
}

/// Shared, hot-reloadable settings tree.
pub struct Settings {
    working_dir: PathBuf,
    inner: RwLock<Inner>,
    callbacks: RwLock<Vec<ChangeCallback>>,
    stop: Arc<std::sync::atomic::AtomicBool>,
}

impl Settings {
    /// Load settings once from disk (no watcher started).
    pub fn load(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let (merged, known_files, mtimes) = Self::discover_and_merge(&working_dir);
        Self {
            working_dir,
            inner: RwLock::new(Inner { merged, known_files, mtimes }),
            callbacks: RwLock::new(Vec::new()),
            stop: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    fn discover_and_merge(working_dir: &Path) -> (Value, Vec<PathBuf>, HashMap<PathBuf, SystemTime>) {
        let mut files = Vec::new();
        let user_path = user_settings_path();
        if user_path.is_file() {
            files.push(user_path);
        }
        files.extend(find_project_files(working_dir));

        let mut merged = default_settings();
        let mut mtimes = HashMap::new();
        for file in &files {
            if let Ok(meta) = std::fs::metadata(file) {
                if let Ok(mtime) = meta.modified() {
                    mtimes.insert(file.clone(), mtime);
                }
            }
            if let Some(contents) = read_json_file(file) {
                merged = deep_merge(&merged, &contents);
            }
        }
        (merged, files, mtimes)
    }

    /// Resolve a dotted key (`"tools.max_output_length"`) against the merged tree.
    pub async fn get(&self, dotted_key: &str, default: Value) -> Value {
        let inner = self.inner.read().await;
        Self::get_path(&inner.merged, dotted_key).unwrap_or(default)
    }

    fn get_path(root: &Value, dotted_key: &str) -> Option<Value> {
        let mut cur = root;
        for part in dotted_key.split('.') {
            cur = cur.get(part)?;
        }
        Some(cur.clone())
    }

    pub async fn to_dict(&self) -> Value {
        self.inner.read().await.merged.clone()
    }

    pub async fn to_dict_redacted(&self) -> Value {
        redact_recursive(&self.inner.read().await.merged, 0)
    }

    /// Write a value at `dotted_key` to the user or project settings file,
    /// creating intermediate objects as needed, then reload.
    pub async fn set(&self, dotted_key: &str, value: Value, level: SettingsLevel) -> Result<()> {
        let path = match level {
            SettingsLevel::User => user_settings_path(),
            SettingsLevel::Project => self.working_dir.join(".bmo").join("settings.local.json"),
        };

        let mut doc = if path.is_file() {
            read_json_file(&path).unwrap_or_else(|| json!({}))
        } else {
            json!({})
        };

        Self::set_path(&mut doc, dotted_key, value);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&path, text)?;

        self.reload().await;
        Ok(())
    }

    fn set_path(doc: &mut Value, dotted_key: &str, value: Value) {
        let parts: Vec<&str> = dotted_key.split('.').collect();
        let mut cur = doc;
        for (i, part) in parts.iter().enumerate() {
            if !cur.is_object() {
                *cur = json!({});
            }
            let map = cur.as_object_mut().expect("just ensured object");
            if i == parts.len() - 1 {
                map.insert(part.to_string(), value.clone());
                return;
            }
            cur = map.entry(part.to_string()).or_insert_with(|| json!({}));
        }
    }

    /// Re-run discovery and merge, firing change callbacks.
    pub async fn reload(&self) {
        let (merged, known_files, mtimes) = Self::discover_and_merge(&self.working_dir);
        {
            let mut inner = self.inner.write().await;
            inner.merged = merged.clone();
            inner.known_files = known_files;
            inner.mtimes = mtimes;
        }
        let callbacks = self.callbacks.read().await;
        for cb in callbacks.iter() {
            if let Err(e) = cb(&merged) {
                error!(error = %e, "settings change callback failed");
            }
        }
    }

    pub async fn on_change(&self, cb: ChangeCallback) {
        self.callbacks.write().await.push(cb);
    }

    /// Spawn the 2-second poll watcher. Dropping the returned handle does not
    /// stop the task; call `stop_watching` (or drop the `Arc<Settings>` and
    /// let the process end) to end it.
    pub fn start_watching(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let stop = Arc::clone(&this.stop);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(WATCH_INTERVAL_SECS)).await;
                if stop.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                if this.changed_on_disk().await {
                    debug!("settings changed on disk, reloading");
                    this.reload().await;
                }
            }
        })
    }

    pub fn stop_watching(&self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    async fn changed_on_disk(&self) -> bool {
        let (_, candidate_files, _) = {
            let mut files = Vec::new();
            let user_path = user_settings_path();
            if user_path.is_file() {
                files.push(user_path);
            }
            files.extend(find_project_files(&self.working_dir));
            (Value::Null, files, ())
        };

        let inner = self.inner.read().await;
        if candidate_files.len() != inner.known_files.len()
            || candidate_files.iter().any(|f| !inner.known_files.contains(f))
        {
            return true;
        }
        for file in &candidate_files {
            let current_mtime = std::fs::metadata(file).ok().and_then(|m| m.modified().ok());
            let known_mtime = inner.mtimes.get(file).copied();
            if current_mtime != known_mtime {
                return true;
            }
        }
        false
    }

    // ── Agent / tool effective config ──────────────────────────────────

    pub async fn get_effective_agent_config(&self, agent_name: &str) -> Value {
        let inner = self.inner.read().await;
        Self::get_path(&inner.merged, &format!("agents.{agent_name}")).unwrap_or_else(|| json!({}))
    }

    /// `((B ∩ gA) \ gD) ∩ aA \ aD` — global allow/deny then per-agent allow/deny.
    pub async fn get_effective_tool_list(&self, agent_name: &str, base_tools: &[String]) -> Vec<String> {
        let inner = self.inner.read().await;
        let global_allow = string_list(&inner.merged, "tools.allow");
        let global_deny = string_list(&inner.merged, "tools.deny");
        let agent_allow = string_list(&inner.merged, &format!("agents.{agent_name}.tools_allow"));
        let agent_deny = string_list(&inner.merged, &format!("agents.{agent_name}.tools_deny"));
        drop(inner);

        let mut current: Vec<String> = base_tools.to_vec();
        current = apply_allow(current, &global_allow);
        current = apply_deny(current, &global_deny);
        current = apply_allow(current, &agent_allow);
        current = apply_deny(current, &agent_deny);
        current
    }

    pub async fn is_destructive_auto_approved(&self, cwd: &Path) -> bool {
        let inner = self.inner.read().await;
        let auto_approve = inner
            .merged
            .get("tools")
            .and_then(|t| t.get("auto_approve_destructive"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !auto_approve {
            return false;
        }
        let trusted = string_list(&inner.merged, "tools.trusted_directories");
        drop(inner);

        let resolved = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
        trusted.iter().any(|t| {
            let trusted_path = PathBuf::from(t);
            let trusted_resolved = trusted_path.canonicalize().unwrap_or(trusted_path);
            resolved == trusted_resolved || resolved.starts_with(&trusted_resolved)
        })
    }

    pub async fn get_custom_destructive_patterns(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        string_list(&inner.merged, "tools.custom_destructive_patterns")
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

fn string_list(root: &Value, dotted_key: &str) -> Vec<String> {
    Settings::get_path(root, dotted_key)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect()
}

fn apply_allow(current: Vec<String>, allow: &[String]) -> Vec<String> {
    if allow.is_empty() {
        return current;
    }
    let set = GlobSet::new(allow);
    current.into_iter().filter(|t| set.matches(t)).collect()
}

fn apply_deny(current: Vec<String>, deny: &[String]) -> Vec<String> {
    if deny.is_empty() {
        return current;
    }
    let set = GlobSet::new(deny);
    current.into_iter().filter(|t| !set.matches(t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_replaces_lists_and_scalars() {
        let base = json!({"a": 1, "list": [1,2], "nested": {"x": 1, "y": 2}});
        let overlay = json!({"a": 2, "list": [3], "nested": {"y": 3, "z": 4}});
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged["a"], 2);
        assert_eq!(merged["list"], json!([3]));
        assert_eq!(merged["nested"]["x"], 1);
        assert_eq!(merged["nested"]["y"], 3);
        assert_eq!(merged["nested"]["z"], 4);
    }

    #[test]
    fn deep_merge_associative_p2() {
        let a = json!({"x": {"a": 1}});
        let b = json!({"x": {"b": 2}});
        let c = json!({"x": {"c": 3}});
        let left = deep_merge(&deep_merge(&a, &b), &c);
        let right_steps = {
            let ab = deep_merge(&a, &b);
            deep_merge(&ab, &c)
        };
        assert_eq!(left, right_steps);
    }

    #[test]
    fn secret_redaction_p3() {
        let tree = json!({"llm": {"api_key": "sk-abc", "gpu_server_key": "x", "name": "ok"}});
        let redacted = redact_recursive(&tree, 0);
        assert_eq!(redacted["llm"]["api_key"], "***");
        assert_eq!(redacted["llm"]["gpu_server_key"], "***");
        assert_eq!(redacted["llm"]["name"], "ok");
    }

    #[test]
    fn glob_filtering_p4() {
        let base = vec!["read_file".to_string(), "write_file".to_string(), "execute_command".to_string()];
        let base2 = apply_allow(base, &["read_file".to_string(), "write_file".to_string()]);
        let base3 = apply_deny(base2, &["write_*".to_string()]);
        assert_eq!(base3, vec!["read_file".to_string()]);
    }

    #[tokio::test]
    async fn discovery_and_hierarchy() {
        let dir = tempfile::tempdir().unwrap();
        let bmo_dir = dir.path().join(".bmo");
        std::fs::create_dir_all(&bmo_dir).unwrap();
        std::fs::write(
            bmo_dir.join("settings.local.json"),
            r#"{"router": {"default_agent": "code"}}"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path());
        let value = settings.get("router.default_agent", json!("conversation")).await;
        assert_eq!(value, json!("code"));
    }
}
