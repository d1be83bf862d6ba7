//! BMO: a multi-agent orchestration runtime. Hierarchical settings route
//! requests through specialized agents, gate their tool use, and persist a
//! memory distinct from the volatile, session-scoped scratchpad.

pub mod agent;
pub mod commands;
pub mod error;
pub mod glob;
pub mod hooks;
pub mod mcp;
pub mod memory;
pub mod orchestrator;
pub mod plan_agent;
pub mod project_context;
pub mod router;
pub mod scratchpad;
pub mod settings;
pub mod tools;

use std::sync::Arc;

use crate::bmo::agent::{Agent, AgentBehavior, AgentConfig, AgentServices, LlmClient};
use crate::bmo::mcp::manager::McpManager;
use crate::bmo::orchestrator::AgentOrchestrator;
use crate::bmo::router::AgentRouter;
use crate::bmo::scratchpad::Scratchpad;
use crate::bmo::settings::Settings;
use crate::bmo::tools::ToolRegistry;

/// Name, display name, and system-prompt seed for every built-in
/// specialized agent beyond `plan` and `conversation`, which are wired
/// separately (`plan` needs [`plan_agent::PlanAgent`]; `conversation` is the
/// router's fallback).
const SPECIALIZED_AGENTS: &[(&str, &str, &str)] = &[
    ("code", "Code", "You write, debug, and review code."),
    ("dnd_dm", "Dungeon Master", "You run tabletop RPG sessions as a dungeon master."),
    ("music", "Music", "You control music playback."),
    ("smart_home", "Smart Home", "You control smart home devices."),
    ("timer", "Timer", "You set timers and reminders."),
    ("calendar", "Calendar", "You manage calendar events."),
    ("weather", "Weather", "You report the weather."),
    ("security", "Security", "You report on home security status."),
    ("test", "Test", "You write and run tests."),
    ("research", "Research", "You research topics and summarize findings."),
    ("cleanup", "Cleanup", "You tidy up code and remove dead weight."),
    ("monitoring", "Monitoring", "You check on system and service health."),
    ("deploy", "Deploy", "You deploy software."),
    ("docs", "Docs", "You write and update documentation."),
    ("review", "Review", "You review code changes."),
    ("design", "Design", "You design systems and architecture."),
    ("learning", "Learning", "You remember facts and preferences for later."),
];

const ALL_DEV_TOOLS: &[&str] = &[
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

/// Build the orchestrator with every built-in agent registered and the
/// tool registry populated. This is the top-level entry point a binary
/// wires a chat loop (or any other transport) around.
pub async fn build_runtime(
    working_dir: std::path::PathBuf,
    llm: Arc<dyn LlmClient>,
    emit: Option<Arc<dyn Fn(&str, serde_json::Value) + Send + Sync>>,
) -> Arc<AgentOrchestrator> {
    let settings = Arc::new(Settings::load(&working_dir));
    settings.start_watching();

    let mut registry = ToolRegistry::new();
    tools::builtin::register_all(&mut registry);
    let tools = Arc::new(registry);

    let mcp = McpManager::new(Arc::clone(&settings));
    mcp.initialize().await;

    let services = Arc::new(AgentServices {
        settings: Arc::clone(&settings),
        scratchpad: Arc::new(Scratchpad::new()),
        tools,
        mcp,
        llm: Arc::clone(&llm),
        working_dir,
        emit,
    });

    let router = AgentRouter::new(Arc::clone(&llm), Arc::clone(&settings)).await;
    let orchestrator = AgentOrchestrator::new(Arc::clone(&services), Arc::clone(&settings), router);

    let mut agents: Vec<Arc<dyn AgentBehavior>> = Vec::new();
    agents.push(Arc::new(Agent::new(
        AgentConfig { tools: ALL_DEV_TOOLS.iter().map(|s| s.to_string()).collect(), can_nest: true, ..AgentConfig::new("conversation", "BMO", "You are BMO, a warm and helpful personal assistant.") },
        Arc::clone(&services),
    )));
    for (name, display_name, prompt) in SPECIALIZED_AGENTS {
        agents.push(Arc::new(Agent::new(
            AgentConfig { tools: ALL_DEV_TOOLS.iter().map(|s| s.to_string()).collect(), can_nest: true, ..AgentConfig::new(*name, *display_name, *prompt) },
            Arc::clone(&services),
        )));
    }
    agents.push(Arc::new(plan_agent::PlanAgent::new(Arc::clone(&services))));

    orchestrator.register_agents(agents).await;
    orchestrator
}
