//! Three-tier message routing: explicit `!prefix`, then keyword match, then
//! LLM classification, each individually disableable via settings.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::bmo::agent::{ChatMessage, LlmClient};
use crate::bmo::settings::Settings;

fn base_prefixes() -> HashMap<&'static str, &'static str> {
    [
        ("!code", "code"),
        ("!dm", "dnd_dm"),
        ("!music", "music"),
        ("!home", "smart_home"),
        ("!timer", "timer"),
        ("!alarm", "timer"),
        ("!calendar", "calendar"),
        ("!cal", "calendar"),
        ("!weather", "weather"),
        ("!security", "security"),
        ("!test", "test"),
        ("!plan", "plan"),
        ("!research", "research"),
        ("!cleanup", "cleanup"),
        ("!monitor", "monitoring"),
        ("!deploy", "deploy"),
        ("!docs", "docs"),
        ("!review", "review"),
        ("!design", "design"),
        ("!learn", "learning"),
        ("!remember", "learning"),
    ]
    .into_iter()
    .collect()
}

fn keyword_patterns() -> HashMap<&'static str, Vec<&'static str>> {
    [
        ("code", vec!["write code", "fix this bug", "implement", "refactor", "debug this", "function that", "code review"]),
        ("dnd_dm", vec!["dungeons and dragons", "d&d", "dnd", "campaign", "npc", "dungeon master"]),
        ("music", vec!["play music", "play song", "pause music", "skip song", "volume"]),
        ("smart_home", vec!["turn on the", "turn off the", "lights", "thermostat", "smart home"]),
        ("timer", vec!["set a timer", "remind me in", "countdown"]),
        ("calendar", vec!["schedule a meeting", "add to calendar", "my calendar", "appointment"]),
        ("weather", vec!["what's the weather", "weather forecast", "will it rain"]),
        ("security", vec!["security camera", "is my door locked", "alarm system"]),
        ("test", vec!["write a test", "run the tests", "unit test", "test coverage"]),
        ("plan", vec!["make a plan", "plan this out", "break this down"]),
        ("research", vec!["research this", "look into", "find out about"]),
        ("cleanup", vec!["clean up this code", "remove dead code", "tidy up"]),
        ("monitoring", vec!["check the logs", "is it up", "monitor this"]),
        ("deploy", vec!["deploy this", "push to production", "release this"]),
        ("docs", vec!["write documentation", "document this", "update the readme"]),
        ("review", vec!["review this pr", "code review", "review my changes"]),
        ("design", vec!["design this system", "architecture for", "design doc"]),
        ("learning", vec!["remember that", "learn this", "note for later"]),
    ]
    .into_iter()
    .collect()
}

const CLASSIFICATION_PROMPT_TEMPLATE: &str = "You are a message router. Based on the message below, respond with exactly one agent name from this list:\n\n\
code — writes and debugs code\n\
dnd_dm — runs tabletop RPG sessions\n\
music — controls music playback\n\
smart_home — controls smart home devices\n\
timer — sets timers and reminders\n\
calendar — manages calendar events\n\
weather — reports weather\n\
security — reports on home security\n\
test — writes and runs tests\n\
plan — breaks tasks into multi-step plans\n\
research — researches topics\n\
cleanup — tidies up code or files\n\
monitoring — checks system/service health\n\
deploy — deploys software\n\
docs — writes documentation\n\
review — reviews code changes\n\
design — designs systems and architecture\n\
learning — remembers facts for later\n\
conversation — general conversation, anything else\n\n\
Respond with only the agent name, nothing else.\n\nMessage: {message}";

pub struct AgentRouter {
    llm: Arc<dyn LlmClient>,
    settings: Arc<Settings>,
    prefixes: HashMap<String, String>,
}

impl AgentRouter {
    pub async fn new(llm: Arc<dyn LlmClient>, settings: Arc<Settings>) -> Self {
        let mut prefixes: HashMap<String, String> = base_prefixes().into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let custom = settings.get("router.custom_prefixes", json!({})).await;
        if let Some(map) = custom.as_object() {
            for (prefix, agent) in map {
                if let Some(agent) = agent.as_str() {
                    prefixes.insert(prefix.clone(), agent.to_string());
                }
            }
        }
        Self { llm, settings, prefixes }
    }

    pub async fn route(&self, message: &str, valid_agents: &[String]) -> String {
        let disabled_tiers: Vec<String> = self
            .settings
            .get("router.disable_tiers", json!([]))
            .await
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let default_agent = self.settings.get("router.default_agent", json!("conversation")).await.as_str().unwrap_or("conversation").to_string();

        if !disabled_tiers.iter().any(|t| t == "prefix") {
            if let Some(agent) = self.check_explicit_prefix(message) {
                return agent;
            }
        }

        if !disabled_tiers.iter().any(|t| t == "keyword") {
            if let Some(agent) = self.check_keywords(message).await {
                return agent;
            }
        }

        if !disabled_tiers.iter().any(|t| t == "llm") {
            if let Some(agent) = self.llm_classify(message, valid_agents).await {
                return agent;
            }
        }

        default_agent
    }

    fn check_explicit_prefix(&self, message: &str) -> Option<String> {
        let lower = message.to_ascii_lowercase();
        self.prefixes.iter().find(|(prefix, _)| lower.starts_with(prefix.as_str())).map(|(_, agent)| agent.clone())
    }

    async fn check_keywords(&self, message: &str) -> Option<String> {
        let lower = message.to_ascii_lowercase();
        let mut patterns: HashMap<String, Vec<String>> =
            keyword_patterns().into_iter().map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect())).collect();

        let custom = self.settings.get("router.custom_keywords", json!({})).await;
        if let Some(map) = custom.as_object() {
            for (agent, extra) in map {
                if let Some(extra) = extra.as_array() {
                    let extra: Vec<String> = extra.iter().filter_map(|v| v.as_str().map(String::from)).collect();
                    patterns.entry(agent.clone()).or_default().extend(extra);
                }
            }
        }

        let mut scores: Vec<(String, usize)> = Vec::new();
        for (agent, phrases) in &patterns {
            let score = phrases.iter().filter(|p| lower.contains(p.as_str())).count();
            if score > 0 {
                scores.push((agent.clone(), score));
            }
        }
        scores.into_iter().max_by_key(|(_, score)| *score).map(|(agent, _)| agent)
    }

    async fn llm_classify(&self, message: &str, valid_agents: &[String]) -> Option<String> {
        let truncated: String = message.chars().take(500).collect();
        let prompt = CLASSIFICATION_PROMPT_TEMPLATE.replace("{message}", &truncated);
        let reply = self.llm.chat(&[ChatMessage::user(prompt)], 0.0).await.ok()?;
        let candidate = reply.trim().to_ascii_lowercase();

        if valid_agents.iter().any(|a| a == &candidate) {
            return Some(candidate);
        }
        valid_agents.iter().find(|a| candidate.contains(a.as_str())).cloned()
    }

    /// Strip a matched prefix (base or settings-merged custom) from the
    /// front of `message`, case-insensitively.
    pub fn strip_prefix(&self, message: &str) -> String {
        let lower = message.to_ascii_lowercase();
        for prefix in self.prefixes.keys() {
            if lower.starts_with(prefix.as_str()) {
                return message[prefix.len()..].trim_start().to_string();
            }
        }
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubLlm(String);
    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        async fn chat(&self, _messages: &[ChatMessage], _temperature: f32) -> crate::bmo::error::Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn explicit_prefix_wins_over_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(Settings::load(dir.path()));
        let router = AgentRouter::new(Arc::new(StubLlm("conversation".into())), settings).await;
        let agent = router.route("!music play something", &[]).await;
        assert_eq!(agent, "music");
    }

    #[tokio::test]
    async fn keyword_tier_matches_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(Settings::load(dir.path()));
        let router = AgentRouter::new(Arc::new(StubLlm("conversation".into())), settings).await;
        let agent = router.route("can you write code for a parser", &[]).await;
        assert_eq!(agent, "code");
    }

    #[tokio::test]
    async fn strip_prefix_handles_custom_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let bmo_dir = dir.path().join(".bmo");
        std::fs::create_dir_all(&bmo_dir).unwrap();
        std::fs::write(bmo_dir.join("settings.local.json"), r#"{"router": {"custom_prefixes": {"!gpt": "code"}}}"#).unwrap();
        let settings = Arc::new(Settings::load(dir.path()));
        let router = AgentRouter::new(Arc::new(StubLlm("conversation".into())), settings).await;
        assert_eq!(router.strip_prefix("!gpt hello"), "hello");
    }
}
