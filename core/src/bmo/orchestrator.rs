//! The top-level state machine: routes messages to agents, and drives the
//! plan-mode explore → design → review → execute workflow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::bmo::agent::{is_affirmative, is_negative, Agent, AgentBehavior, AgentContext, AgentResult, AgentRunner, AgentServices, ChatMessage, PlanPhase};
use crate::bmo::router::AgentRouter;
use crate::bmo::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorMode {
    Normal,
    PlanExplore,
    PlanDesign,
    PlanReview,
    Executing,
}

struct PlanStep {
    number: u32,
    status: char,
    description: String,
    agent: String,
}

pub struct AgentOrchestrator {
    services: Arc<AgentServices>,
    settings: Arc<Settings>,
    router: AgentRouter,
    agents: RwLock<HashMap<String, Arc<dyn AgentBehavior>>>,
    mode: RwLock<OrchestratorMode>,
    plan_task: RwLock<Option<String>>,
    nesting_depth: AtomicU32,
}

impl AgentOrchestrator {
    pub fn new(services: Arc<AgentServices>, settings: Arc<Settings>, router: AgentRouter) -> Arc<Self> {
        Arc::new(Self {
            services,
            settings,
            router,
            agents: RwLock::new(HashMap::new()),
            mode: RwLock::new(OrchestratorMode::Normal),
            plan_task: RwLock::new(None),
            nesting_depth: AtomicU32::new(0),
        })
    }

    /// Register an agent, skipping it if `agents.<name>.enabled` is `false`.
    pub async fn register_agent(self: &Arc<Self>, agent: Arc<dyn AgentBehavior>) {
        let name = agent.config().name.clone();
        let agent_settings = self.settings.get_effective_agent_config(&name).await;
        let enabled = agent_settings.get("enabled").and_then(Value::as_bool).unwrap_or(true);
        if !enabled {
            return;
        }
        agent.set_orchestrator(Arc::clone(self) as Arc<dyn AgentRunner>).await;
        self.agents.write().await.insert(name, agent);
    }

    pub async fn register_agents(self: &Arc<Self>, agents: Vec<Arc<dyn AgentBehavior>>) {
        for agent in agents {
            self.register_agent(agent).await;
        }
    }

    pub async fn is_plan_mode(&self) -> bool {
        !matches!(*self.mode.read().await, OrchestratorMode::Normal)
    }

    pub async fn handle(self: &Arc<Self>, message: &str, speaker: &str, history: &[ChatMessage]) -> AgentResult {
        let mode = *self.mode.read().await;
        match mode {
            OrchestratorMode::PlanReview => return self.handle_plan_review(message, history).await,
            OrchestratorMode::Executing => return self.handle_plan_execution(message, history).await,
            _ => {}
        }

        let clean_message = self.router.strip_prefix(message);
        let valid_agents: Vec<String> = self.agents.read().await.keys().cloned().collect();
        let agent_name = self.router.route(message, &valid_agents).await;

        let display_name = {
            let agents = self.agents.read().await;
            agents.get(&agent_name).map(|a| a.config().display_name.clone()).unwrap_or_else(|| self.get_display_name(&agent_name))
        };
        self.emit("agent_selected", json!({"agent": agent_name, "display_name": display_name, "speaker": speaker}));

        if agent_name == "plan" {
            return self.enter_plan_mode(&clean_message, history).await;
        }

        self.run_agent(&agent_name, &clean_message, history, AgentContext::default()).await
    }

    pub async fn run_agent(self: &Arc<Self>, name: &str, message: &str, history: &[ChatMessage], context: AgentContext) -> AgentResult {
        let agent = {
            let agents = self.agents.read().await;
            agents.get(name).or_else(|| agents.get("conversation")).cloned()
        };
        let Some(agent) = agent else {
            return AgentResult { text: "Sorry, I don't have an agent available to help with that right now.".to_string(), agent_name: name.to_string(), ..Default::default() };
        };

        self.nesting_depth.fetch_add(1, Ordering::Relaxed);
        let result = agent.run(message, history, context).await;
        self.nesting_depth.fetch_sub(1, Ordering::Relaxed);
        result
    }

    async fn enter_plan_mode(self: &Arc<Self>, task: &str, history: &[ChatMessage]) -> AgentResult {
        self.services.scratchpad.clear(Some("Plan")).await;
        *self.plan_task.write().await = Some(task.to_string());
        *self.mode.write().await = OrchestratorMode::PlanExplore;
        self.emit("plan_mode_entered", json!({"task": task}));

        self.run_agent(
            "plan",
            task,
            history,
            AgentContext { phase: Some(PlanPhase::Explore), feedback: None, task: Some(task.to_string()) },
        )
        .await;

        *self.mode.write().await = OrchestratorMode::PlanDesign;
        self.run_agent(
            "plan",
            task,
            history,
            AgentContext { phase: Some(PlanPhase::Design), feedback: None, task: Some(task.to_string()) },
        )
        .await;

        let plan_text = self.services.scratchpad.read("Plan").await;
        *self.mode.write().await = OrchestratorMode::PlanReview;

        let review_text = format!(
            "[EMOTION:calm] BMO is going to think this out!\n\n{plan_text}\n\nDoes this plan look good? Say yes to start, or tell me what to change."
        );
        self.emit("plan_mode_review", json!({"plan": plan_text}));

        AgentResult { text: review_text, agent_name: "plan".to_string(), ..Default::default() }
    }

    async fn handle_plan_review(self: &Arc<Self>, message: &str, history: &[ChatMessage]) -> AgentResult {
        let auto_approve = self.settings.get("plan_mode.auto_approve_plans", json!(false)).await.as_bool().unwrap_or(false);

        if auto_approve || is_affirmative(message) {
            return self.approve_plan(history).await;
        }
        if is_negative(message) {
            self.exit_plan_mode().await;
            return AgentResult { text: "Okay, scrapping that plan. What would you like to do instead?".to_string(), agent_name: "plan".to_string(), ..Default::default() };
        }

        let current_plan = self.services.scratchpad.read("Plan").await;
        self.run_agent(
            "plan",
            message,
            history,
            AgentContext { phase: Some(PlanPhase::Redesign), feedback: Some(message.to_string()), task: self.plan_task.read().await.clone() },
        )
        .await;
        let _ = current_plan;

        let plan_text = self.services.scratchpad.read("Plan").await;
        let review_text = format!("[EMOTION:calm] Here's the updated plan:\n\n{plan_text}\n\nLook better? Say yes to start, or tell me what else to change.");
        AgentResult { text: review_text, agent_name: "plan".to_string(), ..Default::default() }
    }

    async fn approve_plan(self: &Arc<Self>, history: &[ChatMessage]) -> AgentResult {
        let plan_text = self.services.scratchpad.read("Plan").await;
        let mut steps = parse_plan_steps(&plan_text);

        let max_steps = self.settings.get("plan_mode.max_plan_steps", json!(20)).await.as_u64().unwrap_or(20) as usize;
        if steps.len() > max_steps {
            steps.truncate(max_steps);
        }

        *self.mode.write().await = OrchestratorMode::Executing;
        let total = steps.len();
        self.emit("plan_mode_executing", json!({"total_steps": total}));
        let mut completed = 0;
        let mut summaries = Vec::new();

        for step in &mut steps {
            step.status = '~';
            let updated = update_plan_step(&self.services.scratchpad.read("Plan").await, step.number, '~');
            self.services.scratchpad.write("Plan", &updated, false).await;
            self.emit("plan_step_start", json!({"step": step.number, "description": step.description}));

            let result = self.run_agent(&step.agent, &step.description, history, AgentContext::default()).await;
            let lower = result.text.to_ascii_lowercase();
            let failed = lower.contains("error") || lower.contains("failed");

            if failed {
                let updated = update_plan_step(&self.services.scratchpad.read("Plan").await, step.number, '!');
                self.services.scratchpad.write("Plan", &updated, false).await;
                self.emit("plan_step_failed", json!({"step": step.number, "description": step.description}));
                return AgentResult {
                    text: format!(
                        "[EMOTION:concerned] Step {} ran into trouble: {}\n\nRetry, skip, or abort?",
                        step.number, result.text
                    ),
                    agent_name: "plan".to_string(),
                    ..Default::default()
                };
            }

            let updated = update_plan_step(&self.services.scratchpad.read("Plan").await, step.number, 'x');
            self.services.scratchpad.write("Plan", &updated, false).await;
            self.emit("plan_step_done", json!({"step": step.number, "description": step.description}));
            summaries.push(format!("{}. {} — done", step.number, step.description));
            completed += 1;
        }

        *self.mode.write().await = OrchestratorMode::Normal;
        self.emit("plan_mode_exited", json!({"completed": completed, "total": total}));

        AgentResult {
            text: format!("[EMOTION:excited] BMO finished the plan! {completed}/{total} steps done.\n\n{}", summaries.join("\n")),
            agent_name: "plan".to_string(),
            ..Default::default()
        }
    }

    async fn handle_plan_execution(self: &Arc<Self>, message: &str, history: &[ChatMessage]) -> AgentResult {
        let lowered = message.trim().to_ascii_lowercase();
        let retry = lowered == "retry" || lowered.starts_with("retry") || lowered.contains("try again");
        let skip = lowered == "skip" || lowered.starts_with("skip") || lowered == "next" || lowered.starts_with("next");
        let abort = lowered == "abort" || lowered.starts_with("abort") || lowered == "stop" || lowered.starts_with("stop") || lowered == "cancel" || lowered.starts_with("cancel");

        if retry || skip {
            self.approve_plan(history).await
        } else if abort {
            self.exit_plan_mode().await;
            AgentResult { text: "Plan aborted.".to_string(), agent_name: "plan".to_string(), ..Default::default() }
        } else {
            self.exit_plan_mode().await;
            self.handle(message, "user", history).await
        }
    }

    async fn exit_plan_mode(&self) {
        *self.mode.write().await = OrchestratorMode::Normal;
        *self.plan_task.write().await = None;
    }

    fn get_display_name(&self, agent_name: &str) -> String {
        agent_name.replace('_', " ")
    }

    fn emit(&self, event: &str, payload: Value) {
        self.services.emit(event, payload);
    }
}

#[async_trait]
impl AgentRunner for AgentOrchestrator {
    async fn run_agent(&self, name: &str, message: &str, history: &[ChatMessage], context: AgentContext) -> AgentResult {
        let agent = {
            let agents = self.agents.read().await;
            agents.get(name).or_else(|| agents.get("conversation")).cloned()
        };
        match agent {
            Some(agent) => agent.run(message, history, context).await,
            None => AgentResult { text: "Sorry, something went wrong finding that agent.".to_string(), agent_name: name.to_string(), ..Default::default() },
        }
    }
}

/// `N. [ ] description (agent: name)` — default agent is `code` when the
/// annotation is missing; a trailing `_agent` suffix is stripped.
fn parse_plan_steps(plan_text: &str) -> Vec<PlanStep> {
    let re = Regex::new(r"(?m)^(\d+)\.\s*\[([ x~!])\]\s*(.+?)(?:\(agent:\s*(\w+)\))?\s*$").expect("static plan-step regex");
    re.captures_iter(plan_text)
        .filter_map(|cap| {
            let number: u32 = cap.get(1)?.as_str().parse().ok()?;
            let status = cap.get(2)?.as_str().chars().next()?;
            let description = cap.get(3)?.as_str().trim().to_string();
            let agent = cap
                .get(4)
                .map(|m| m.as_str().trim_end_matches("_agent").to_string())
                .unwrap_or_else(|| "code".to_string());
            Some(PlanStep { number, status, description, agent })
        })
        .collect()
}

fn update_plan_step(plan_text: &str, step_num: u32, status: char) -> String {
    let pattern = format!(r"({step_num}\.\s*)\[[ x~!]\]");
    let re = Regex::new(&pattern).expect("dynamic plan-step update regex");
    re.replacen(plan_text, 1, format!("${{1}}[{status}]").as_str()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_steps_extracts_agent_and_default() {
        let plan = "### Steps\n1. [ ] write the parser (agent: code)\n2. [ ] review it\n";
        let steps = parse_plan_steps(plan);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].agent, "code");
        assert_eq!(steps[1].agent, "code");
        assert_eq!(steps[1].description, "review it");
    }

    #[test]
    fn update_plan_step_replaces_only_matching_number() {
        let plan = "1. [ ] first\n2. [ ] second\n";
        let updated = update_plan_step(plan, 1, '~');
        assert!(updated.contains("1. [~] first"));
        assert!(updated.contains("2. [ ] second"));
    }
}
