//! The `plan` agent: explores the codebase, drafts a step-by-step plan into
//! the scratchpad's `Plan` section, and redesigns it from reviewer feedback.

use async_trait::async_trait;
use serde_json::json;

use crate::bmo::agent::{Agent, AgentBehavior, AgentConfig, AgentContext, AgentResult, AgentRunner, AgentServices, ChatMessage, PlanPhase};
use std::sync::Arc;

const EXPLORE_PROMPT: &str = "You are exploring a codebase to prepare for planning. Use read-only tools \
(read_file, list_directory, find_files, grep_files, web_search, web_fetch, git_command_readonly) to \
understand the relevant parts of the project before anything gets designed.\n\nAvailable tools:\n{tools}";

const DESIGN_PROMPT: &str = "You are drafting an execution plan. Use the exploration and research notes below \
to write a plan in this EXACT format (BMO will parse it):\n\n\
### Steps\n\
1. [ ] <description> (agent: code)\n\
2. [ ] <description> (agent: test)\n\n\
### Risks\n\
- <risk>\n\n\
### Verification\n\
- <how to confirm it worked>\n\n\
{context}";

const REDESIGN_PROMPT: &str = "The user asked for changes to this plan:\n\n{plan}\n\nFeedback: {feedback}\n\n\
Rewrite the plan in the same `### Steps` / `### Risks` / `### Verification` format, \
incorporating the feedback.";

pub struct PlanAgent {
    core: Agent,
}

impl PlanAgent {
    pub fn new(services: Arc<AgentServices>) -> Self {
        let config = AgentConfig {
            tools: vec![
                "read_file".to_string(),
                "list_directory".to_string(),
                "find_files".to_string(),
                "grep_files".to_string(),
                "web_search".to_string(),
                "web_fetch".to_string(),
                "git_command_readonly".to_string(),
            ],
            temperature: 0.5,
            max_turns: 8,
            can_nest: true,
            ..AgentConfig::new("plan", "Plan", "You help break tasks into clear, verifiable plans.")
        };
        Self { core: Agent::new(config, services) }
    }

    async fn explore(&self, task: &str, history: &[ChatMessage]) -> AgentResult {
        let tools = self.core.get_tool_descriptions(Some(PlanPhase::Explore)).await.join("\n");
        let system = EXPLORE_PROMPT.replace("{tools}", &tools);
        let mut messages = vec![ChatMessage::system(system)];
        let tail = &history[history.len().saturating_sub(10)..];
        messages.extend_from_slice(tail);
        messages.push(ChatMessage::user(format!("Explore the codebase for this task: {task}")));

        let outcome = self.core.run_tool_loop(messages, Some(PlanPhase::Explore), 8).await;
        let clean = self.core.strip_tool_calls(&outcome.text);
        self.core.emit("scratchpad_write", json!({"section": "Exploration"}));

        let services = self.services();
        services.scratchpad.write("Exploration", &clean, false).await;

        let lower = task.to_ascii_lowercase();
        if self.core.config().can_nest && (lower.contains("search") || lower.contains("research")) {
            if let Some(research) = self.core.spawn_agent("research", task, history).await {
                services.scratchpad.write("Research", &research.text, false).await;
            }
        }

        AgentResult { text: clean, agent_name: "plan".to_string(), scratchpad_writes: vec!["Exploration".to_string()], ..Default::default() }
    }

    async fn design(&self, task: &str) -> AgentResult {
        let services = self.services();
        let exploration: String = services.scratchpad.read("Exploration").await.chars().take(2000).collect();
        let research: String = services.scratchpad.read("Research").await.chars().take(2000).collect();

        let mut context = format!("Task: {task}\n\nExploration notes:\n{exploration}");
        if !research.is_empty() {
            context.push_str(&format!("\n\nResearch notes:\n{research}"));
        }
        let system = DESIGN_PROMPT.replace("{context}", &context);

        let reply = self.core.llm_call(&[ChatMessage::system(system)], None).await.unwrap_or_else(|e| format!("(planning error: {e})"));
        services.scratchpad.write("Plan", &reply, false).await;

        AgentResult { text: reply, agent_name: "plan".to_string(), scratchpad_writes: vec!["Plan".to_string()], ..Default::default() }
    }

    async fn redesign(&self, feedback: &str) -> AgentResult {
        let services = self.services();
        let current_plan = services.scratchpad.read("Plan").await;
        let system = REDESIGN_PROMPT.replace("{plan}", &current_plan).replace("{feedback}", feedback);

        let reply = self.core.llm_call(&[ChatMessage::system(system)], None).await.unwrap_or_else(|e| format!("(redesign error: {e})"));
        services.scratchpad.write("Plan", &reply, false).await;

        AgentResult { text: reply, agent_name: "plan".to_string(), scratchpad_writes: vec!["Plan".to_string()], ..Default::default() }
    }

    fn services(&self) -> &Arc<crate::bmo::agent::AgentServices> {
        // Agent keeps its services private; PlanAgent only needs scratchpad
        // access, which goes through the same shared services the core holds.
        self.core.services_ref()
    }
}

#[async_trait]
impl AgentBehavior for PlanAgent {
    fn config(&self) -> &AgentConfig {
        self.core.config()
    }

    async fn run(&self, message: &str, history: &[ChatMessage], context: AgentContext) -> AgentResult {
        let task = context.task.clone().unwrap_or_else(|| message.to_string());
        match context.phase {
            Some(PlanPhase::Explore) => self.explore(&task, history).await,
            Some(PlanPhase::Design) => self.design(&task).await,
            Some(PlanPhase::Redesign) => self.redesign(&context.feedback.unwrap_or_default()).await,
            None => self.explore(&task, history).await,
        }
    }

    async fn set_orchestrator(&self, orchestrator: Arc<dyn AgentRunner>) {
        self.core.set_orchestrator(orchestrator).await;
    }
}
