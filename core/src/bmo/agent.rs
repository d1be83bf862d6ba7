//! Shared agent behavior: prompt assembly, the tool-call loop, and dispatch.
//!
//! Every specialized agent is configuration over the same [`Agent`] core;
//! [`PlanAgent`] is the one exception, overriding `run` for its
//! explore/design/redesign phases while still going through [`Agent`] for
//! prompt assembly and tool dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::bmo::error::Result;
use crate::bmo::hooks::{self, HookSpec};
use crate::bmo::mcp::manager::McpManager;
use crate::bmo::memory;
use crate::bmo::scratchpad::Scratchpad;
use crate::bmo::settings::Settings;
use crate::bmo::tools::{ToolContext, ToolRegistry, READ_ONLY_TOOLS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPhase {
    Explore,
    Design,
    Redesign,
}

#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub phase: Option<PlanPhaseWire>,
    pub feedback: Option<String>,
    pub task: Option<String>,
}

/// `PlanPhase` without the `Default` gap — `AgentContext` needs an `Option`
/// anyway, this just keeps the wire type serde-friendly if ever needed.
pub type PlanPhaseWire = PlanPhase;

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub name: String,
    pub display_name: String,
    pub system_prompt: String,
    pub system_prompt_append: Option<String>,
    pub temperature: f32,
    pub tools: Vec<String>,
    pub services: Vec<String>,
    pub max_turns: u32,
    pub can_nest: bool,
    pub enabled: bool,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            system_prompt: system_prompt.into(),
            system_prompt_append: None,
            temperature: 0.7,
            tools: Vec::new(),
            services: Vec::new(),
            max_turns: 10,
            can_nest: false,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentResult {
    pub text: String,
    pub commands: Vec<String>,
    pub tags: HashMap<String, String>,
    pub agent_name: String,
    pub nested_results: Vec<AgentResult>,
    pub scratchpad_writes: Vec<String>,
}

/// Implemented by the orchestrator so agents can recurse into
/// `spawn_agent` without a circular dependency on the orchestrator type.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run_agent(&self, name: &str, message: &str, history: &[ChatMessage], context: AgentContext) -> AgentResult;
}

/// Collaborators every agent shares, assembled once at startup.
pub struct AgentServices {
    pub settings: Arc<Settings>,
    pub scratchpad: Arc<Scratchpad>,
    pub tools: Arc<ToolRegistry>,
    pub mcp: Arc<McpManager>,
    pub llm: Arc<dyn LlmClient>,
    pub working_dir: std::path::PathBuf,
    pub emit: Option<Arc<dyn Fn(&str, Value) + Send + Sync>>,
}

impl AgentServices {
    fn emit(&self, event: &str, payload: Value) {
        if let Some(emit) = &self.emit {
            emit(event, payload);
        }
    }
}

const TOOL_CALL_FENCE: &str = r"```tool_call\s*\n?(.*?)\n?```";
const READONLY_GIT_SUBCOMMANDS: &[&str] = &["log", "status", "diff", "show", "branch", "tag", "remote"];

/// Words that confirm a pending destructive action or an approved plan.
pub const AFFIRMATIVE_WORDS: &[&str] = &["yes", "y", "approve", "do it", "go ahead", "proceed"];
/// Words that decline a pending destructive action or reject a plan.
pub const NEGATIVE_WORDS: &[&str] = &["no", "n", "cancel", "abort", "stop"];

pub fn is_affirmative(message: &str) -> bool {
    let lowered = message.trim().to_ascii_lowercase();
    lowered == "yes" || lowered == "y" || lowered.starts_with("yes") || lowered.starts_with("approve") || lowered.starts_with("do it") || lowered.starts_with("go ahead") || lowered.starts_with("proceed")
}

pub fn is_negative(message: &str) -> bool {
    let lowered = message.trim().to_ascii_lowercase();
    lowered == "no" || lowered == "n" || lowered.starts_with("no") || lowered.starts_with("cancel") || lowered.starts_with("abort") || lowered.starts_with("stop")
}

/// A destructive tool call dispatch paused on, waiting for the user to say
/// yes or no. Stored in the agent's scratchpad section so it survives to
/// the next turn; `messages` already includes the assistant reply that
/// emitted the call and the tool results collected before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub messages: Vec<ChatMessage>,
    pub tool: String,
    pub args: Value,
    pub reason: String,
    pub command: String,
}

/// Result of a (possibly partial) run through the tool-call loop: either a
/// final reply, or a reply that is the confirmation prompt plus the state
/// needed to resume once the user answers.
pub struct ToolLoopResult {
    pub text: String,
    pub pending: Option<PendingConfirmation>,
}

/// Tools with a dedicated `_confirmed` variant that bypasses the
/// destructive-command gate; other gated tools (`ssh_command`,
/// `git_command`, `gh_command`) are re-dispatched under their own name with
/// a `confirmed: true` argument instead.
fn confirmed_variant(tool: &str) -> Option<&'static str> {
    match tool {
        "execute_command" => Some("execute_confirmed"),
        "write_file" => Some("write_file_confirmed"),
        _ => None,
    }
}

#[async_trait]
pub trait AgentBehavior: Send + Sync {
    fn config(&self) -> &AgentConfig;
    async fn run(&self, message: &str, history: &[ChatMessage], context: AgentContext) -> AgentResult;
    async fn set_orchestrator(&self, orchestrator: Arc<dyn AgentRunner>);
}

pub struct Agent {
    config: AgentConfig,
    services: Arc<AgentServices>,
    orchestrator: RwLock<Option<Arc<dyn AgentRunner>>>,
}

impl Agent {
    pub fn new(config: AgentConfig, services: Arc<AgentServices>) -> Self {
        Self { config, services, orchestrator: RwLock::new(None) }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn services_ref(&self) -> &Arc<AgentServices> {
        &self.services
    }

    /// System prompt + scratchpad summary + memory (if enabled), in that order.
    pub async fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();
        if let Some(append) = &self.config.system_prompt_append {
            prompt.push('\n');
            prompt.push_str(append);
        }

        if self.services.scratchpad.has_content().await {
            prompt.push_str("\n\n## Shared Scratchpad\n");
            prompt.push_str(&self.services.scratchpad.summary().await);
        }

        let memory_enabled = self.services.settings.get("memory.enabled", json!(true)).await.as_bool().unwrap_or(true);
        if memory_enabled {
            let max_lines = self.services.settings.get("memory.max_lines_loaded", json!(200)).await.as_u64().unwrap_or(200) as usize;
            let loaded = memory::load(&self.services.working_dir, max_lines);
            if !loaded.is_empty() {
                prompt.push_str("\n\n## Project Memory\n");
                prompt.push_str(&loaded);
            }
            prompt.push_str("\n\n");
            prompt.push_str(memory::memory_guidance());
        }

        prompt
    }

    pub async fn llm_call(&self, messages: &[ChatMessage], temperature: Option<f32>) -> Result<String> {
        self.services.llm.chat(messages, temperature.unwrap_or(self.config.temperature)).await
    }

    /// Tool names available right now: base tools intersected with
    /// read-only-only during plan exploration/design, plus filtered MCP
    /// tools, all passed through the settings allow/deny chain.
    pub async fn get_available_tools(&self, phase: Option<PlanPhase>) -> Vec<String> {
        let restricted = matches!(phase, Some(PlanPhase::Explore) | Some(PlanPhase::Design));

        let mut base: Vec<String> = if restricted {
            self.config.tools.iter().filter(|t| READ_ONLY_TOOLS.contains(&t.as_str())).cloned().collect()
        } else {
            self.config.tools.clone()
        };

        let mcp_tools = self.services.mcp.get_tools_for_agent(&self.config.name).await;
        let mut mcp_names: Vec<String> = mcp_tools.iter().filter_map(|t| t.get("name").and_then(Value::as_str).map(String::from)).collect();
        if restricted {
            let readonly = self.services.mcp.get_readonly_tools().await;
            mcp_names.retain(|n| readonly.contains(n));
        }
        base.extend(mcp_names);

        self.services.settings.get_effective_tool_list(&self.config.name, &base).await
    }

    pub async fn get_tool_descriptions(&self, phase: Option<PlanPhase>) -> Vec<String> {
        let available = self.get_available_tools(phase).await;
        let mut descriptions = Vec::new();

        for (name, desc, params) in self.services.tools.definitions() {
            if available.contains(&name) {
                descriptions.push(format!("- {name}({}) — {desc}", format_params(&params)));
            }
        }
        for tool in self.services.mcp.get_all_tools().await {
            let name = tool.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            if available.contains(&name) {
                let desc = tool.get("description").and_then(Value::as_str).unwrap_or_default();
                let params = tool.get("parameters").cloned().unwrap_or(json!({}));
                descriptions.push(format!("- {name}({}) — {desc}", format_params(&params)));
            }
        }
        descriptions
    }

    pub async fn spawn_agent(&self, child: &str, task: &str, history: &[ChatMessage]) -> Option<AgentResult> {
        if !self.config.can_nest {
            return None;
        }
        let orchestrator = self.orchestrator.read().await.clone()?;
        self.services.emit(
            "agent_nesting",
            json!({"parent": self.config.name, "child": child, "task": task.chars().take(200).collect::<String>()}),
        );
        let truncated_task: String = task.chars().take(200).collect();
        Some(orchestrator.run_agent(child, &truncated_task, history, AgentContext::default()).await)
    }

    /// Parse ` ```tool_call\n{...}\n``` ` fenced blocks, keeping only objects
    /// that carry a `tool` key; malformed blocks are logged and skipped.
    pub fn parse_tool_calls(&self, reply: &str) -> Vec<Value> {
        let re = Regex::new(TOOL_CALL_FENCE).expect("static tool-call regex");
        let mut calls = Vec::new();
        for cap in re.captures_iter(reply) {
            let raw = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            match serde_json::from_str::<Value>(raw) {
                Ok(value) if value.get("tool").is_some() => calls.push(value),
                Ok(_) => warn!(agent = %self.config.name, "tool_call block missing 'tool' key, skipping"),
                Err(e) => warn!(agent = %self.config.name, error = %e, "malformed tool_call block, skipping"),
            }
        }
        calls
    }

    pub fn strip_tool_calls(&self, reply: &str) -> String {
        let re = Regex::new(TOOL_CALL_FENCE).expect("static tool-call regex");
        let stripped = re.replace_all(reply, "");
        let collapsed = Regex::new(r"\n{3,}").expect("static collapse regex").replace_all(&stripped, "\n\n");
        collapsed.trim().to_string()
    }

    /// Availability check, `git_command`/`git_command_readonly` substitution,
    /// pre-hooks (which may block or rewrite args), MCP vs built-in routing,
    /// and post-hooks, in that order.
    pub async fn dispatch_tool(&self, tool_name: &str, args: Value, phase: Option<PlanPhase>) -> Result<Value> {
        let available = self.get_available_tools(phase).await;

        let (actual_tool, actual_args) = if tool_name == "git_command_readonly" {
            ("git_command".to_string(), args.clone())
        } else if tool_name == "git_command" {
            let cmd = args.get("cmd").and_then(Value::as_str).unwrap_or_default();
            let first_word = cmd.split_whitespace().next().unwrap_or_default();
            if !available.contains(&"git_command".to_string())
                && available.contains(&"git_command_readonly".to_string())
                && !READONLY_GIT_SUBCOMMANDS.contains(&first_word)
            {
                return Ok(json!({"error": format!("'{first_word}' is not available to this agent; only read-only git subcommands are")}));
            }
            ("git_command".to_string(), args.clone())
        } else {
            (tool_name.to_string(), args.clone())
        };

        if !available.contains(&actual_tool) && !available.contains(&tool_name.to_string()) {
            return Ok(json!({"error": format!("tool '{tool_name}' is not available to this agent")}));
        }

        let pre_hooks = self.hook_specs("preToolUse").await;
        let pre = hooks::run_pre_hooks(&pre_hooks, &actual_tool, &actual_args, Some(&self.services.working_dir)).await;
        if !pre.allowed {
            return Ok(json!({"error": pre.context, "blocked_by": pre.blocked_by}));
        }
        let dispatched_args = pre.modified_args.unwrap_or(actual_args);

        let result = if let Some(rest) = actual_tool.strip_prefix("mcp__") {
            let _ = rest;
            self.services.mcp.dispatch_tool(&actual_tool, dispatched_args.clone()).await?
        } else {
            let ctx = ToolContext { settings: Some(Arc::clone(&self.services.settings)), cwd: self.services.working_dir.clone() };
            self.services.tools.execute(&actual_tool, dispatched_args.clone(), &ctx).await?
        };

        let post_hooks = self.hook_specs("postToolUse").await;
        Ok(hooks::run_post_hooks(&post_hooks, &actual_tool, &dispatched_args, result, Some(&self.services.working_dir)).await)
    }

    async fn hook_specs(&self, key: &str) -> Vec<HookSpec> {
        let raw = self.services.settings.get(&format!("hooks.{key}"), json!([])).await;
        serde_json::from_value(raw).unwrap_or_default()
    }

    pub fn emit(&self, event: &str, payload: Value) {
        self.services.emit(event, payload);
    }

    /// Default agentic loop: assemble the prompt, call the model once, and
    /// return its reply verbatim. Agents that need multi-turn tool use call
    /// `run_with_tools` instead (or override `run` entirely, as `PlanAgent` does).
    pub async fn default_run(&self, message: &str, history: &[ChatMessage]) -> AgentResult {
        let system = self.build_system_prompt().await;
        let mut messages = vec![ChatMessage::system(system)];
        let tail = &history[history.len().saturating_sub(20)..];
        messages.extend_from_slice(tail);
        messages.push(ChatMessage::user(message));

        match self.llm_call(&messages, None).await {
            Ok(text) => AgentResult { text, agent_name: self.config.name.clone(), ..Default::default() },
            Err(e) => AgentResult {
                text: format!("Sorry, something went wrong: {e}"),
                agent_name: self.config.name.clone(),
                ..Default::default()
            },
        }
    }

    fn pending_confirmation_key(&self) -> String {
        format!("PendingConfirmation:{}", self.config.name)
    }

    async fn take_pending_confirmation(&self) -> Option<PendingConfirmation> {
        let raw = self.services.scratchpad.read(&self.pending_confirmation_key()).await;
        if raw.is_empty() {
            return None;
        }
        serde_json::from_str(&raw).ok()
    }

    async fn store_or_clear_pending(&self, pending: &Option<PendingConfirmation>) {
        let key = self.pending_confirmation_key();
        match pending {
            Some(p) => {
                let serialized = serde_json::to_string(p).unwrap_or_default();
                self.services.scratchpad.write(&key, &serialized, false).await;
            }
            None => self.services.scratchpad.clear(Some(&key)).await,
        }
    }

    /// Assemble the prompt and run the tool-call loop for agents configured
    /// with tools, persisting a pending confirmation to the scratchpad if
    /// the loop pauses on a destructive call.
    pub async fn run_with_tools(&self, message: &str, history: &[ChatMessage], phase: Option<PlanPhase>) -> AgentResult {
        let system = self.build_system_prompt().await;
        let mut messages = vec![ChatMessage::system(system)];
        let tail = &history[history.len().saturating_sub(20)..];
        messages.extend_from_slice(tail);
        messages.push(ChatMessage::user(message));

        let max_calls = self.config.max_turns.max(1) as usize;
        let outcome = self.run_tool_loop(messages, phase, max_calls).await;
        self.store_or_clear_pending(&outcome.pending).await;
        AgentResult { text: outcome.text, agent_name: self.config.name.clone(), ..Default::default() }
    }

    /// A bounded agentic loop: parse tool calls out of each reply, dispatch
    /// them, and feed results back as synthesized system messages until the
    /// model stops calling tools, a call needs confirmation, or `max_calls`
    /// is reached.
    pub async fn run_tool_loop(&self, messages: Vec<ChatMessage>, phase: Option<PlanPhase>, max_calls: usize) -> ToolLoopResult {
        let reply = match self.llm_call(&messages, None).await {
            Ok(r) => r,
            Err(e) => return ToolLoopResult { text: format!("(error: {e})"), pending: None },
        };
        self.continue_tool_loop(messages, reply, phase, max_calls).await
    }

    /// Replay a confirmed destructive call (routing through its `_confirmed`
    /// variant, or the same tool with `confirmed: true` when there isn't
    /// one) and resume the loop from where it paused.
    pub async fn resume_confirmed(&self, pending: PendingConfirmation, phase: Option<PlanPhase>, max_calls: usize) -> ToolLoopResult {
        let mut messages = pending.messages;
        let result = match confirmed_variant(&pending.tool) {
            Some(confirmed_tool) => self.dispatch_tool(confirmed_tool, pending.args.clone(), phase).await,
            None => {
                let mut args = pending.args.clone();
                if let Some(obj) = args.as_object_mut() {
                    obj.insert("confirmed".to_string(), json!(true));
                }
                self.dispatch_tool(&pending.tool, args, phase).await
            }
        };
        let result = result.unwrap_or_else(|e| json!({"error": e.to_string()}));

        let rendered = serde_json::to_string_pretty(&result).unwrap_or_default();
        let truncated: String = rendered.chars().take(4000).collect();
        messages.push(ChatMessage::system(format!("[Tool Result: {}]\n{truncated}", pending.tool)));

        let reply = match self.llm_call(&messages, None).await {
            Ok(r) => r,
            Err(e) => return ToolLoopResult { text: format!("(error: {e})"), pending: None },
        };
        self.continue_tool_loop(messages, reply, phase, max_calls).await
    }

    async fn continue_tool_loop(&self, mut messages: Vec<ChatMessage>, mut reply: String, phase: Option<PlanPhase>, max_calls: usize) -> ToolLoopResult {
        for _ in 0..max_calls {
            let calls = self.parse_tool_calls(&reply);
            if calls.is_empty() {
                break;
            }
            messages.push(ChatMessage::assistant(reply.clone()));

            for call in calls {
                let tool = call.get("tool").and_then(Value::as_str).unwrap_or_default().to_string();
                let args = call.get("args").cloned().unwrap_or(json!({}));
                let result = match self.dispatch_tool(&tool, args.clone(), phase).await {
                    Ok(v) => v,
                    Err(e) => json!({"error": e.to_string()}),
                };

                if result.get("needs_confirmation").and_then(Value::as_bool).unwrap_or(false) {
                    let reason = result.get("reason").and_then(Value::as_str).unwrap_or("This action could modify or delete data.").to_string();
                    let command = result.get("command").and_then(Value::as_str).unwrap_or(&tool).to_string();
                    let prompt = format!("BMO needs your permission for:\n- {reason} ({command})\n\nSay 'yes' to confirm or 'no' to cancel.");
                    return ToolLoopResult { text: prompt, pending: Some(PendingConfirmation { messages, tool, args, reason, command }) };
                }

                let rendered = serde_json::to_string_pretty(&result).unwrap_or_default();
                let truncated: String = rendered.chars().take(4000).collect();
                messages.push(ChatMessage::system(format!("[Tool Result: {tool}]\n{truncated}")));
            }

            reply = match self.llm_call(&messages, None).await {
                Ok(r) => r,
                Err(e) => {
                    reply.push_str(&format!("\n\n(tool loop error: {e})"));
                    break;
                }
            };
        }
        ToolLoopResult { text: reply, pending: None }
    }
}

#[async_trait]
impl AgentBehavior for Agent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn run(&self, message: &str, history: &[ChatMessage], context: AgentContext) -> AgentResult {
        if self.config.tools.is_empty() {
            return self.default_run(message, history).await;
        }

        if let Some(pending) = self.take_pending_confirmation().await {
            if is_affirmative(message) {
                let max_calls = self.config.max_turns.max(1) as usize;
                let outcome = self.resume_confirmed(pending, context.phase, max_calls).await;
                self.store_or_clear_pending(&outcome.pending).await;
                return AgentResult { text: outcome.text, agent_name: self.config.name.clone(), ..Default::default() };
            }
            if is_negative(message) {
                self.store_or_clear_pending(&None).await;
                return AgentResult { text: "Okay, cancelled.".to_string(), agent_name: self.config.name.clone(), ..Default::default() };
            }
            // Neither a confirmation nor a cancellation: drop the stale
            // pending action and treat this as a fresh message.
            self.store_or_clear_pending(&None).await;
        }

        self.run_with_tools(message, history, context.phase).await
    }

    async fn set_orchestrator(&self, orchestrator: Arc<dyn AgentRunner>) {
        *self.orchestrator.write().await = Some(orchestrator);
    }
}

fn format_params(params: &Value) -> String {
    match params.as_object() {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoLlm;
    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn chat(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    fn test_services(dir: &std::path::Path) -> Arc<AgentServices> {
        Arc::new(AgentServices {
            settings: Arc::new(Settings::load(dir)),
            scratchpad: Arc::new(Scratchpad::new()),
            tools: Arc::new(ToolRegistry::new()),
            mcp: McpManager::new(Arc::new(Settings::load(dir))),
            llm: Arc::new(EchoLlm),
            working_dir: dir.to_path_buf(),
            emit: None,
        })
    }

    #[test]
    fn parse_tool_calls_skips_blocks_without_tool_key() {
        let dir = tempfile::tempdir().unwrap();
        let agent = Agent::new(AgentConfig::new("code", "Code", "You write code."), test_services(dir.path()));
        let reply = "```tool_call\n{\"nope\": 1}\n```\n```tool_call\n{\"tool\": \"read_file\", \"args\": {\"path\": \"a.rs\"}}\n```";
        let calls = agent.parse_tool_calls(reply);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["tool"], "read_file");
    }

    #[test]
    fn strip_tool_calls_removes_blocks_and_collapses_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let agent = Agent::new(AgentConfig::new("code", "Code", "You write code."), test_services(dir.path()));
        let reply = "Here's the plan.\n\n\n\n```tool_call\n{\"tool\": \"read_file\"}\n```\n\nDone.";
        let stripped = agent.strip_tool_calls(reply);
        assert!(!stripped.contains("tool_call"));
        assert!(!stripped.contains("\n\n\n"));
    }

    #[tokio::test]
    async fn default_run_echoes_user_message() {
        let dir = tempfile::tempdir().unwrap();
        let agent = Agent::new(AgentConfig::new("conversation", "Conversation", "Chat normally."), test_services(dir.path()));
        let result = agent.run("hello there", &[], AgentContext::default()).await;
        assert_eq!(result.text, "hello there");
        assert_eq!(result.agent_name, "conversation");
    }

    struct ScriptedLlm {
        replies: std::sync::Mutex<std::collections::VecDeque<String>>,
    }
    impl ScriptedLlm {
        fn new(replies: Vec<String>) -> Self {
            Self { replies: std::sync::Mutex::new(replies.into_iter().collect()) }
        }
    }
    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String> {
            Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn tool_bearing_agent_pauses_for_confirmation_then_resumes() {
        let dir = tempfile::tempdir().unwrap();

        let mut registry = ToolRegistry::new();
        crate::bmo::tools::builtin::register_all(&mut registry);

        let services = Arc::new(AgentServices {
            settings: Arc::new(Settings::load(dir.path())),
            scratchpad: Arc::new(Scratchpad::new()),
            tools: Arc::new(registry),
            mcp: McpManager::new(Arc::new(Settings::load(dir.path()))),
            llm: Arc::new(ScriptedLlm::new(vec![
                "```tool_call\n{\"tool\": \"execute_command\", \"args\": {\"cmd\": \"rm -rf scratch\"}}\n```".to_string(),
                "All done.".to_string(),
            ])),
            working_dir: dir.path().to_path_buf(),
            emit: None,
        });

        let config = AgentConfig {
            tools: vec!["execute_command".to_string(), "execute_confirmed".to_string()],
            ..AgentConfig::new("code", "Code", "You run commands.")
        };
        let agent = Agent::new(config, services);

        let first = agent.run("clean up the scratch dir", &[], AgentContext::default()).await;
        assert!(first.text.contains("needs your permission"));

        let second = agent.run("yes", &[], AgentContext::default()).await;
        assert_eq!(second.text, "All done.");
    }

    #[tokio::test]
    async fn tool_bearing_agent_cancels_on_no() {
        let dir = tempfile::tempdir().unwrap();

        let mut registry = ToolRegistry::new();
        crate::bmo::tools::builtin::register_all(&mut registry);

        let services = Arc::new(AgentServices {
            settings: Arc::new(Settings::load(dir.path())),
            scratchpad: Arc::new(Scratchpad::new()),
            tools: Arc::new(registry),
            mcp: McpManager::new(Arc::new(Settings::load(dir.path()))),
            llm: Arc::new(ScriptedLlm::new(vec![
                "```tool_call\n{\"tool\": \"execute_command\", \"args\": {\"cmd\": \"rm -rf scratch\"}}\n```".to_string(),
            ])),
            working_dir: dir.path().to_path_buf(),
            emit: None,
        });

        let config = AgentConfig {
            tools: vec!["execute_command".to_string(), "execute_confirmed".to_string()],
            ..AgentConfig::new("code", "Code", "You run commands.")
        };
        let agent = Agent::new(config, services);

        let first = agent.run("clean up the scratch dir", &[], AgentContext::default()).await;
        assert!(first.text.contains("needs your permission"));

        let second = agent.run("no", &[], AgentContext::default()).await;
        assert_eq!(second.text, "Okay, cancelled.");
    }
}
