//! Pre/post tool-dispatch hooks: user-configured shell commands that can
//! block, rewrite, or annotate a tool call.

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Command;
use tracing::warn;

use crate::bmo::glob::glob_match;

const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct HookResult {
    pub allowed: bool,
    pub modified_args: Option<Value>,
    pub context: String,
    pub blocked_by: String,
}

impl HookResult {
    fn passthrough() -> Self {
        Self { allowed: true, ..Default::default() }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct HookSpec {
    pub matcher: String,
    pub command: String,
}

async fn run_hook_command(command: &str, stdin_data: &Value, cwd: Option<&Path>) -> (i32, String, String) {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return (-1, String::new(), format!("Hook command not found or failed to spawn: {e}")),
    };

    {
        use tokio::io::AsyncWriteExt;
        if let Some(stdin) = child.stdin.as_mut() {
            let payload = serde_json::to_vec(stdin_data).unwrap_or_default();
            let _ = stdin.write_all(&payload).await;
        }
        child.stdin = None;
    }

    match tokio::time::timeout(HOOK_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            (code, stdout, stderr)
        }
        Ok(Err(e)) => (-1, String::new(), format!("Hook failed: {e}")),
        Err(_) => (-1, String::new(), format!("Hook timed out after {}s: {command}", HOOK_TIMEOUT.as_secs())),
    }
}

/// Run every `preToolUse` hook whose matcher matches `tool_name`, in order.
/// A non-zero exit blocks the tool.
pub async fn run_pre_hooks(hooks: &[HookSpec], tool_name: &str, args: &Value, cwd: Option<&Path>) -> HookResult {
    if hooks.is_empty() {
        return HookResult::passthrough();
    }

    let mut result = HookResult::passthrough();
    let mut context_parts = Vec::new();
    let mut current_args = args.clone();

    for hook in hooks {
        if !glob_match(&hook.matcher, tool_name) {
            continue;
        }

        let stdin_data = json!({"tool": tool_name, "args": current_args});
        let (code, stdout, stderr) = run_hook_command(&hook.command, &stdin_data, cwd).await;

        if code != 0 {
            result.allowed = false;
            result.blocked_by = hook.command.clone();
            result.context = if !stderr.is_empty() {
                stderr
            } else if !stdout.is_empty() {
                stdout
            } else {
                format!("Blocked by pre-hook: {}", hook.command)
            };
            return result;
        }

        if !stdout.is_empty() {
            match serde_json::from_str::<Value>(&stdout) {
                Ok(Value::Object(map)) if map.contains_key("args") => {
                    current_args = map["args"].clone();
                    result.modified_args = Some(current_args.clone());
                }
                _ => context_parts.push(stdout),
            }
        }
        if !stderr.is_empty() {
            context_parts.push(stderr);
        }
    }

    if !context_parts.is_empty() {
        result.context = context_parts.join("\n");
    }
    result
}

/// Run every `postToolUse` hook whose matcher matches `tool_name`. Output is
/// appended to `result["hook_context"]`; a non-zero exit never reverts the
/// already-dispatched tool call.
pub async fn run_post_hooks(
    hooks: &[HookSpec],
    tool_name: &str,
    args: &Value,
    mut tool_result: Value,
    cwd: Option<&Path>,
) -> Value {
    if hooks.is_empty() {
        return tool_result;
    }

    let mut context_parts = Vec::new();
    for hook in hooks {
        if !glob_match(&hook.matcher, tool_name) {
            continue;
        }
        let stdin_data = json!({"tool": tool_name, "args": args, "result": tool_result});
        let (_, stdout, stderr) = run_hook_command(&hook.command, &stdin_data, cwd).await;
        if !stdout.is_empty() {
            context_parts.push(stdout);
        }
        if !stderr.is_empty() {
            context_parts.push(stderr);
        }
    }

    if !context_parts.is_empty() {
        if let Value::Object(map) = &mut tool_result {
            map.insert("hook_context".to_string(), json!(context_parts.join("\n")));
        } else {
            warn!("post-hook context dropped: tool result was not a JSON object");
        }
    }
    tool_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pre_hook_blocks_on_nonzero_exit() {
        let hooks = vec![HookSpec { matcher: "*".to_string(), command: "exit 1".to_string() }];
        let result = run_pre_hooks(&hooks, "write_file", &json!({}), None).await;
        assert!(!result.allowed);
        assert_eq!(result.blocked_by, "exit 1");
    }

    #[tokio::test]
    async fn pre_hook_passthrough_when_no_match() {
        let hooks = vec![HookSpec { matcher: "mcp__github__*".to_string(), command: "exit 1".to_string() }];
        let result = run_pre_hooks(&hooks, "write_file", &json!({}), None).await;
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn post_hook_adds_context() {
        let hooks = vec![HookSpec { matcher: "*".to_string(), command: "echo formatted".to_string() }];
        let result = run_post_hooks(&hooks, "write_file", &json!({}), json!({"output": "ok"}), None).await;
        assert_eq!(result["hook_context"], "formatted");
    }
}
