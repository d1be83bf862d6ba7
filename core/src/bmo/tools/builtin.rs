//! The fixed set of built-in tools agents can call: shell execution, file
//! I/O, search, web access, git/gh, and the memory pair. Destructive shell
//! and filesystem operations route through [`super::destructive_check`]
//! first; the `_confirmed` variants bypass it once the user has agreed.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{destructive_check, truncate_output, Tool, ToolContext};
use crate::bmo::error::{BmoError, Result};
use crate::bmo::memory;

const DEFAULT_MAX_OUTPUT: usize = 8000;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

async fn max_output_length(ctx: &ToolContext) -> usize {
    match &ctx.settings {
        Some(s) => s.get("tools.max_output_length", json!(DEFAULT_MAX_OUTPUT)).await.as_u64().unwrap_or(DEFAULT_MAX_OUTPUT as u64) as usize,
        None => DEFAULT_MAX_OUTPUT,
    }
}

async fn command_timeout(ctx: &ToolContext) -> u64 {
    match &ctx.settings {
        Some(s) => s.get("tools.command_timeout", json!(DEFAULT_COMMAND_TIMEOUT_SECS)).await.as_u64().unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        None => DEFAULT_COMMAND_TIMEOUT_SECS,
    }
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BmoError::parse(format!("missing or non-string argument '{key}'")))
}

async fn run_shell(cmd: &str, cwd: &std::path::Path, timeout_secs: u64) -> Result<(i32, String, String)> {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd).current_dir(cwd);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = command.spawn().map_err(|e| BmoError::transport(format!("failed to spawn command: {e}")))?;
    match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Ok((code, stdout, stderr))
        }
        Ok(Err(e)) => Err(BmoError::transport(format!("command execution failed: {e}"))),
        Err(_) => Err(BmoError::timeout(format!("command timed out after {timeout_secs}s: {cmd}"))),
    }
}

fn exec_result(code: i32, stdout: String, stderr: String, max_len: usize) -> Value {
    json!({
        "exit_code": code,
        "stdout": truncate_output(&stdout, max_len),
        "stderr": truncate_output(&stderr, max_len),
    })
}

// ── execute_command / execute_confirmed ─────────────────────────────────

pub struct ExecuteCommand;

#[async_trait]
impl Tool for ExecuteCommand {
    fn name(&self) -> &str {
        "execute_command"
    }
    fn description(&self) -> &str {
        "Run a shell command in the working directory. Destructive commands require confirmation."
    }
    fn parameters(&self) -> Value {
        json!({"cmd": "string — shell command to run"})
    }
    fn destructive_gate(&self) -> bool {
        true
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let cmd = arg_str(&args, "cmd")?;
        if let Some(confirmation) = destructive_check(cmd, ctx.settings.as_deref(), &ctx.cwd).await {
            return Ok(confirmation);
        }
        let (code, stdout, stderr) = run_shell(cmd, &ctx.cwd, command_timeout(ctx).await).await?;
        Ok(exec_result(code, stdout, stderr, max_output_length(ctx).await))
    }
}

pub struct ExecuteConfirmed;

#[async_trait]
impl Tool for ExecuteConfirmed {
    fn name(&self) -> &str {
        "execute_confirmed"
    }
    fn description(&self) -> &str {
        "Run a shell command the user has already confirmed, bypassing the destructive-command gate."
    }
    fn parameters(&self) -> Value {
        json!({"cmd": "string — shell command to run"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let cmd = arg_str(&args, "cmd")?;
        let (code, stdout, stderr) = run_shell(cmd, &ctx.cwd, command_timeout(ctx).await).await?;
        Ok(exec_result(code, stdout, stderr, max_output_length(ctx).await))
    }
}

// ── ssh_command ──────────────────────────────────────────────────────────

pub struct SshCommand;

#[async_trait]
impl Tool for SshCommand {
    fn name(&self) -> &str {
        "ssh_command"
    }
    fn description(&self) -> &str {
        "Run a command on a remote host over SSH using a configured key path."
    }
    fn parameters(&self) -> Value {
        json!({"host": "string", "cmd": "string", "user": "string (optional)"})
    }
    fn destructive_gate(&self) -> bool {
        true
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let host = arg_str(&args, "host")?;
        let remote_cmd = arg_str(&args, "cmd")?;
        let confirmed = args.get("confirmed").and_then(Value::as_bool).unwrap_or(false);
        if !confirmed {
            if let Some(confirmation) = destructive_check(remote_cmd, ctx.settings.as_deref(), &ctx.cwd).await {
                return Ok(confirmation);
            }
        }
        let user = args.get("user").and_then(Value::as_str);
        let key_path = match &ctx.settings {
            Some(s) => s.get("tools.ssh_key_path", Value::Null).await.as_str().map(String::from),
            None => None,
        };

        let target = match user {
            Some(u) => format!("{u}@{host}"),
            None => host.to_string(),
        };

        let mut command = Command::new("ssh");
        if let Some(key) = &key_path {
            command.arg("-i").arg(key);
        }
        command.arg(&target).arg(remote_cmd);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let child = command.spawn().map_err(|e| BmoError::transport(format!("failed to spawn ssh: {e}")))?;
        let timeout_secs = command_timeout(ctx).await;
        match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                Ok(exec_result(code, stdout, stderr, max_output_length(ctx).await))
            }
            Ok(Err(e)) => Err(BmoError::transport(format!("ssh execution failed: {e}"))),
            Err(_) => Err(BmoError::timeout(format!("ssh command timed out after {timeout_secs}s"))),
        }
    }
}

// ── file I/O ─────────────────────────────────────────────────────────────

pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read the contents of a text file."
    }
    fn parameters(&self) -> Value {
        json!({"path": "string"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let path = ctx.cwd.join(arg_str(&args, "path")?);
        let contents = tokio::fs::read_to_string(&path).await?;
        Ok(json!({"content": truncate_output(&contents, max_output_length(ctx).await)}))
    }
}

pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write (overwrite) a text file. Requires confirmation if it already exists and looks destructive."
    }
    fn parameters(&self) -> Value {
        json!({"path": "string", "content": "string"})
    }
    fn destructive_gate(&self) -> bool {
        true
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let rel = arg_str(&args, "path")?;
        let content = arg_str(&args, "content")?;
        let path = ctx.cwd.join(rel);
        if path.is_file() {
            if let Some(confirmation) = destructive_check(&format!("overwrite {rel}"), ctx.settings.as_deref(), &ctx.cwd).await {
                return Ok(confirmation);
            }
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(json!({"written": true, "path": rel}))
    }
}

pub struct WriteFileConfirmed;

#[async_trait]
impl Tool for WriteFileConfirmed {
    fn name(&self) -> &str {
        "write_file_confirmed"
    }
    fn description(&self) -> &str {
        "Write (overwrite) a text file without the confirmation gate."
    }
    fn parameters(&self) -> Value {
        json!({"path": "string", "content": "string"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let rel = arg_str(&args, "path")?;
        let content = arg_str(&args, "content")?;
        let path = ctx.cwd.join(rel);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(json!({"written": true, "path": rel}))
    }
}

pub struct EditFile;

#[async_trait]
impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }
    fn description(&self) -> &str {
        "Replace the first occurrence of `old_string` with `new_string` in a file."
    }
    fn parameters(&self) -> Value {
        json!({"path": "string", "old_string": "string", "new_string": "string"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let rel = arg_str(&args, "path")?;
        let old = arg_str(&args, "old_string")?;
        let new = arg_str(&args, "new_string")?;
        let path = ctx.cwd.join(rel);
        let contents = tokio::fs::read_to_string(&path).await?;
        let Some(pos) = contents.find(old) else {
            return Ok(json!({"edited": false, "reason": "old string not found"}));
        };
        let mut updated = String::with_capacity(contents.len());
        updated.push_str(&contents[..pos]);
        updated.push_str(new);
        updated.push_str(&contents[pos + old.len()..]);
        tokio::fs::write(&path, updated).await?;
        Ok(json!({"edited": true, "path": rel}))
    }
}

pub struct ListDirectory;

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }
    fn description(&self) -> &str {
        "List entries in a directory."
    }
    fn parameters(&self) -> Value {
        json!({"path": "string (optional, default '.')"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let rel = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let path = ctx.cwd.join(rel);
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let kind = if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) { "dir" } else { "file" };
            names.push(json!({"name": entry.file_name().to_string_lossy(), "kind": kind}));
        }
        names.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(json!({"entries": names}))
    }
}

pub struct FindFiles;

#[async_trait]
impl Tool for FindFiles {
    fn name(&self) -> &str {
        "find_files"
    }
    fn description(&self) -> &str {
        "Find files under the working directory matching a glob pattern."
    }
    fn parameters(&self) -> Value {
        json!({"pattern": "string — glob, e.g. '**/*.rs'"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let pattern = arg_str(&args, "pattern")?;
        let full_pattern = ctx.cwd.join(pattern);
        let matches: Vec<String> = glob::glob(&full_pattern.to_string_lossy())
            .map_err(|e| BmoError::parse(format!("invalid glob pattern: {e}")))?
            .filter_map(|entry| entry.ok())
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        Ok(json!({"matches": matches}))
    }
}

pub struct GrepFiles;

#[async_trait]
impl Tool for GrepFiles {
    fn name(&self) -> &str {
        "grep_files"
    }
    fn description(&self) -> &str {
        "Search file contents under the working directory for a regex pattern."
    }
    fn parameters(&self) -> Value {
        json!({"pattern": "string — regex", "path": "string (optional, default '.')"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let pattern = arg_str(&args, "pattern")?;
        let rel = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let root = ctx.cwd.join(rel);
        let re = regex::Regex::new(pattern).map_err(|e| BmoError::parse(format!("invalid regex: {e}")))?;

        let mut matches = Vec::new();
        for entry in ignore::Walk::new(&root).flatten() {
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                if let Ok(contents) = std::fs::read_to_string(entry.path()) {
                    for (lineno, line) in contents.lines().enumerate() {
                        if re.is_match(line) {
                            matches.push(json!({
                                "path": entry.path().to_string_lossy(),
                                "line": lineno + 1,
                                "text": line,
                            }));
                            if matches.len() >= 500 {
                                break;
                            }
                        }
                    }
                }
            }
            if matches.len() >= 500 {
                break;
            }
        }
        Ok(json!({"matches": matches}))
    }
}

// ── web access ───────────────────────────────────────────────────────────

pub struct WebSearch;

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }
    fn description(&self) -> &str {
        "Search the web and return a list of results."
    }
    fn parameters(&self) -> Value {
        json!({"query": "string"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let query = arg_str(&args, "query")?;
        let endpoint = match &ctx.settings {
            Some(s) => s.get("tools.web_search_endpoint", json!("https://duckduckgo.com/html/")).await,
            None => json!("https://duckduckgo.com/html/"),
        };
        let url = endpoint.as_str().unwrap_or("https://duckduckgo.com/html/");

        let client = reqwest::Client::new();
        let response = client
            .get(url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| BmoError::transport(format!("web search request failed: {e}")))?;
        let body = response.text().await.map_err(|e| BmoError::transport(format!("web search body read failed: {e}")))?;
        Ok(json!({"raw_html": truncate_output(&body, max_output_length(ctx).await)}))
    }
}

pub struct WebFetch;

#[async_trait]
impl Tool for WebFetch {
    fn name(&self) -> &str {
        "web_fetch"
    }
    fn description(&self) -> &str {
        "Fetch the contents of a URL."
    }
    fn parameters(&self) -> Value {
        json!({"url": "string"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let url = arg_str(&args, "url")?;
        let client = reqwest::Client::new();
        let response = client
            .get(url)
            .timeout(std::time::Duration::from_secs(command_timeout(ctx).await))
            .send()
            .await
            .map_err(|e| BmoError::transport(format!("fetch failed: {e}")))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| BmoError::transport(format!("fetch body read failed: {e}")))?;
        Ok(json!({"status": status, "content": truncate_output(&body, max_output_length(ctx).await)}))
    }
}

// ── git / gh ─────────────────────────────────────────────────────────────

const READONLY_GIT_SUBCOMMANDS: &[&str] = &["log", "status", "diff", "show", "branch", "tag", "remote"];

fn is_readonly_git(cmd: &str) -> bool {
    cmd.split_whitespace().next().map(|first| READONLY_GIT_SUBCOMMANDS.contains(&first)).unwrap_or(false)
}

pub struct GitCommand;

#[async_trait]
impl Tool for GitCommand {
    fn name(&self) -> &str {
        "git_command"
    }
    fn description(&self) -> &str {
        "Run a git subcommand in the working directory. Mutating subcommands require confirmation."
    }
    fn parameters(&self) -> Value {
        json!({"cmd": "string — arguments after 'git', e.g. 'status'"})
    }
    fn destructive_gate(&self) -> bool {
        true
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let subcmd = arg_str(&args, "cmd")?;
        let full = format!("git {subcmd}");
        let confirmed = args.get("confirmed").and_then(Value::as_bool).unwrap_or(false);
        if !confirmed && !is_readonly_git(subcmd) {
            if let Some(confirmation) = destructive_check(&full, ctx.settings.as_deref(), &ctx.cwd).await {
                return Ok(confirmation);
            }
        }
        let (code, stdout, stderr) = run_shell(&full, &ctx.cwd, command_timeout(ctx).await).await?;
        Ok(exec_result(code, stdout, stderr, max_output_length(ctx).await))
    }
}

pub struct GhCommand;

#[async_trait]
impl Tool for GhCommand {
    fn name(&self) -> &str {
        "gh_command"
    }
    fn description(&self) -> &str {
        "Run a GitHub CLI (`gh`) subcommand in the working directory."
    }
    fn parameters(&self) -> Value {
        json!({"cmd": "string — arguments after 'gh'"})
    }
    fn destructive_gate(&self) -> bool {
        true
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let subcmd = arg_str(&args, "cmd")?;
        let full = format!("gh {subcmd}");
        let confirmed = args.get("confirmed").and_then(Value::as_bool).unwrap_or(false);
        if !confirmed {
            if let Some(confirmation) = destructive_check(&full, ctx.settings.as_deref(), &ctx.cwd).await {
                return Ok(confirmation);
            }
        }
        let (code, stdout, stderr) = run_shell(&full, &ctx.cwd, command_timeout(ctx).await).await?;
        Ok(exec_result(code, stdout, stderr, max_output_length(ctx).await))
    }
}

// ── memory ───────────────────────────────────────────────────────────────

pub struct WriteMemory;

#[async_trait]
impl Tool for WriteMemory {
    fn name(&self) -> &str {
        "write_memory"
    }
    fn description(&self) -> &str {
        "Save or update a section of this project's persistent memory."
    }
    fn parameters(&self) -> Value {
        json!({"section": "string", "content": "string"})
    }
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let section = arg_str(&args, "section")?;
        let content = arg_str(&args, "content")?;
        memory::update_section(&ctx.cwd, section, content)?;
        Ok(json!({"saved": true, "section": section}))
    }
}

pub struct ReadMemory;

#[async_trait]
impl Tool for ReadMemory {
    fn name(&self) -> &str {
        "read_memory"
    }
    fn description(&self) -> &str {
        "Read this project's persistent memory."
    }
    fn parameters(&self) -> Value {
        json!({})
    }
    async fn call(&self, _args: Value, ctx: &ToolContext) -> Result<Value> {
        let content = memory::load(&ctx.cwd, 200);
        Ok(json!({"content": content}))
    }
}

/// Build a registry containing every built-in tool.
pub fn register_all(registry: &mut super::ToolRegistry) {
    use std::sync::Arc;
    registry.register(Arc::new(ExecuteCommand));
    registry.register(Arc::new(ExecuteConfirmed));
    registry.register(Arc::new(SshCommand));
    registry.register(Arc::new(ReadFile));
    registry.register(Arc::new(WriteFile));
    registry.register(Arc::new(WriteFileConfirmed));
    registry.register(Arc::new(EditFile));
    registry.register(Arc::new(ListDirectory));
    registry.register(Arc::new(FindFiles));
    registry.register(Arc::new(GrepFiles));
    registry.register(Arc::new(WebSearch));
    registry.register(Arc::new(WebFetch));
    registry.register(Arc::new(GitCommand));
    registry.register(Arc::new(GhCommand));
    registry.register(Arc::new(WriteMemory));
    registry.register(Arc::new(ReadMemory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_file_roundtrips_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext { settings: None, cwd: dir.path().to_path_buf() };
        WriteFileConfirmed.call(json!({"path": "a.txt", "content": "hello"}), &ctx).await.unwrap();
        let result = ReadFile.call(json!({"path": "a.txt"}), &ctx).await.unwrap();
        assert_eq!(result["content"], "hello");
    }

    #[tokio::test]
    async fn edit_file_replaces_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext { settings: None, cwd: dir.path().to_path_buf() };
        WriteFileConfirmed.call(json!({"path": "a.txt", "content": "foo foo"}), &ctx).await.unwrap();
        EditFile.call(json!({"path": "a.txt", "old_string": "foo", "new_string": "bar"}), &ctx).await.unwrap();
        let result = ReadFile.call(json!({"path": "a.txt"}), &ctx).await.unwrap();
        assert_eq!(result["content"], "bar foo");
    }

    #[test]
    fn readonly_git_detection() {
        assert!(is_readonly_git("status"));
        assert!(is_readonly_git("log --oneline"));
        assert!(!is_readonly_git("push origin main"));
    }

    #[tokio::test]
    async fn write_memory_then_read_memory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext { settings: None, cwd: dir.path().to_path_buf() };
        WriteMemory.call(json!({"section": "Notes", "content": "remember this"}), &ctx).await.unwrap();
        let result = ReadMemory.call(json!({}), &ctx).await.unwrap();
        assert!(result["content"].as_str().unwrap().contains("remember this"));
    }
}
