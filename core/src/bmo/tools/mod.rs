//! Built-in tool registry: capability functions dispatched by name, with
//! destructive-command gating, output truncation, and allow/deny filtering
//! applied by the agent layer above.

pub mod builtin;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::bmo::error::Result;
use crate::bmo::settings::Settings;

/// Shared context passed to every tool invocation.
pub struct ToolContext {
    pub settings: Option<Arc<Settings>>,
    pub cwd: std::path::PathBuf,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    /// Whether this tool's `cmd`-shaped argument should pass through the
    /// destructive-command gate before executing.
    fn destructive_gate(&self) -> bool {
        false
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// `Arc<dyn Tool>` rather than `Box<dyn Tool>` so registered tools can be
/// cloned out of the map and executed without holding the registry lock.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<(String, String, Value)> {
        self.tools
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string(), t.parameters()))
            .collect()
    }

    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| crate::bmo::error::BmoError::not_found(format!("tool '{name}' not found in registry")))?;
        tool.call(args, ctx).await
    }
}

/// Tools usable during plan-mode exploration/design.
pub const READ_ONLY_TOOLS: &[&str] = &[
    "read_file",
    "list_directory",
    "find_files",
    "grep_files",
    "web_search",
    "web_fetch",
    "git_command_readonly",
    "rag_search",
    "read_memory",
    "write_memory",
];

pub const ALL_BUILTIN_TOOLS: &[&str] = &[
    "execute_command",
    "execute_confirmed",
    "ssh_command",
    "read_file",
    "write_file",
    "write_file_confirmed",
    "edit_file",
    "list_directory",
    "find_files",
    "grep_files",
    "web_search",
    "web_fetch",
    "git_command",
    "gh_command",
    "write_memory",
    "read_memory",
];

const BUILTIN_DESTRUCTIVE_PATTERNS: &[&str] = &[
    r"\brm\s+-[a-zA-Z]*r",
    r"\brm\s+",
    r"\brmdir\b",
    r"\bdel\s+",
    r"\bmv\s+",
    r"\bkill(all)?\b",
    r"\bpkill\b",
    r"\bsystemctl\s+(stop|restart|disable)\b",
    r"\bgit\s+push\b.*(--force|-f)\b",
    r"\bgit\s+reset\s+--hard\b",
    r"\bgit\s+rebase\b",
    r"\bnpm\s+publish\b",
    r"\bpip\s+uninstall\b",
    r"\bapt(-get)?\s+(remove|purge)\b",
    r"\bdropdb\b",
    r"\bDROP\s+(TABLE|DATABASE)\b",
];

/// `{needs_confirmation, command, reason}` when `cmd` matches a destructive
/// pattern and the request is not auto-approved for `cwd`; `None` otherwise.
pub async fn destructive_check(cmd: &str, settings: Option<&Settings>, cwd: &Path) -> Option<Value> {
    let mut patterns: Vec<String> = BUILTIN_DESTRUCTIVE_PATTERNS.iter().map(|s| s.to_string()).collect();
    if let Some(settings) = settings {
        patterns.extend(settings.get_custom_destructive_patterns().await);
    }

    let matched = patterns.iter().any(|p| Regex::new(p).map(|re| re.is_match(cmd)).unwrap_or(false));
    if !matched {
        return None;
    }

    if let Some(settings) = settings {
        if settings.is_destructive_auto_approved(cwd).await {
            return None;
        }
    }

    Some(serde_json::json!({
        "needs_confirmation": true,
        "command": cmd,
        "reason": "This command could modify or delete data. Please confirm.",
    }))
}

/// Split long output around a truncation marker, keeping the first and last
/// halves of the allowed budget.
pub fn truncate_output(output: &str, max_len: usize) -> String {
    if output.len() <= max_len {
        return output.to_string();
    }
    let half = max_len / 2;
    let marker = format!("\n… ({} chars truncated) …\n", output.len() - max_len);
    let head: String = output.chars().take(half).collect();
    let tail: String = output.chars().rev().take(half).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{head}{marker}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn destructive_check_flags_rm() {
        let dir = tempfile::tempdir().unwrap();
        let result = destructive_check("rm -rf build/", None, dir.path()).await;
        assert!(result.is_some());
        assert_eq!(result.unwrap()["needs_confirmation"], true);
    }

    #[tokio::test]
    async fn destructive_check_passes_safe_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = destructive_check("ls -la", None, dir.path()).await;
        assert!(result.is_none());
    }

    #[test]
    fn truncate_output_keeps_budget() {
        let long = "a".repeat(100);
        let truncated = truncate_output(&long, 20);
        assert!(truncated.len() < long.len());
        assert!(truncated.contains("truncated"));
    }
}
