//! Owns every configured MCP server connection, indexes their tools under
//! the `mcp__<server>__<tool>` namespace, and routes dispatch/filtering for
//! the agent layer.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::bmo::error::{BmoError, Result};
use crate::bmo::glob::GlobSet;
use crate::bmo::mcp::client::{McpClient, McpTransportConfig};
use crate::bmo::settings::Settings;

#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub server_name: String,
    pub tool_name: String,
    pub namespaced_name: String,
    pub description: String,
    pub input_schema: Value,
}

pub struct McpManager {
    settings: Arc<Settings>,
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
    tools: RwLock<HashMap<String, McpToolInfo>>,
}

impl McpManager {
    pub fn new(settings: Arc<Settings>) -> Arc<Self> {
        Arc::new(Self { settings, clients: RwLock::new(HashMap::new()), tools: RwLock::new(HashMap::new()) })
    }

    /// Read `mcp.servers` from settings and connect every non-lazy server.
    pub async fn initialize(self: &Arc<Self>) {
        let servers = self.settings.get("mcp.servers", json!({})).await;
        let Some(map) = servers.as_object() else { return };
        for (name, config) in map.clone() {
            let lazy = config.get("lazy").and_then(Value::as_bool).unwrap_or(false);
            self.add_server(name, config, !lazy).await;
        }
    }

    pub async fn add_server(self: &Arc<Self>, name: impl Into<String>, config: Value, auto_connect: bool) {
        let name = name.into();
        let Some(transport) = parse_transport(&config) else {
            warn!(server = %name, "mcp server config missing or invalid transport, skipping");
            return;
        };

        {
            if let Some(existing) = self.clients.write().await.remove(&name) {
                existing.disconnect().await;
                self.remove_server_tools(&name).await;
            }
        }

        let client = McpClient::new(name.clone(), transport);
        self.clients.write().await.insert(name.clone(), Arc::clone(&client));

        if auto_connect {
            if client.connect().await {
                self.index_server_tools(&name).await;
            }
        }
    }

    pub async fn remove_server(&self, name: &str) {
        if let Some(client) = self.clients.write().await.remove(name) {
            client.disconnect().await;
        }
        self.remove_server_tools(name).await;
    }

    pub async fn connect_server(&self, name: &str) -> bool {
        let client = { self.clients.read().await.get(name).cloned() };
        let Some(client) = client else { return false };
        if client.is_connected() {
            client.disconnect().await;
        }
        let ok = client.connect().await;
        if ok {
            self.index_server_tools(name).await;
        }
        ok
    }

    pub async fn disconnect_server(&self, name: &str) {
        if let Some(client) = self.clients.read().await.get(name).cloned() {
            client.disconnect().await;
        }
    }

    pub async fn get_all_tools(&self) -> Vec<Value> {
        self.tools.read().await.values().map(tool_definition).collect()
    }

    /// Tools visible to `agent_name`, filtered by `mcp.agent_tools.<agent>`
    /// glob patterns. An agent with no entry sees everything; an agent with
    /// an explicit empty list sees nothing.
    pub async fn get_tools_for_agent(&self, agent_name: &str) -> Vec<Value> {
        let agent_tools = self.settings.get("mcp.agent_tools", json!({})).await;
        let Some(patterns) = agent_tools.get(agent_name) else {
            return self.get_all_tools().await;
        };
        let patterns: Vec<String> = patterns.as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();
        if patterns.is_empty() {
            return Vec::new();
        }
        let set = GlobSet::new(&patterns);
        self.tools.read().await.values().filter(|t| set.matches(&t.namespaced_name)).map(tool_definition).collect()
    }

    pub async fn get_readonly_tools(&self) -> Vec<String> {
        let patterns = self.settings.get("mcp.readonly_tools", json!([])).await;
        let patterns: Vec<String> = patterns.as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();
        let set = GlobSet::new(&patterns);
        self.tools.read().await.keys().filter(|name| set.matches(name)).cloned().collect()
    }

    pub async fn dispatch_tool(&self, namespaced_name: &str, args: Value) -> Result<Value> {
        let info = {
            self.tools.read().await.get(namespaced_name).cloned().ok_or_else(|| BmoError::not_found(format!("mcp tool '{namespaced_name}' not found")))?
        };

        let client = {
            let clients = self.clients.read().await;
            clients.get(&info.server_name).cloned()
        };
        let Some(client) = client else {
            return Err(BmoError::not_found(format!("mcp server '{}' not registered", info.server_name)));
        };

        if !client.is_connected() {
            if !client.connect().await {
                return Err(BmoError::transport(format!("mcp server '{}' is unreachable", info.server_name)));
            }
            self.index_server_tools(&info.server_name).await;
        }

        let output = client.call_tool(&info.tool_name, args).await?;
        let max_chars = self.settings.get("mcp.output_max_tokens", json!(25000)).await.as_u64().unwrap_or(25000) as usize;

        if output.len() > max_chars {
            let total = output.len();
            let truncated: String = output.chars().take(max_chars).collect();
            Ok(json!({
                "output": format!("{truncated}\n... (truncated, {total} total chars)"),
                "truncated": true,
            }))
        } else {
            Ok(json!({"output": output, "truncated": false}))
        }
    }

    pub async fn get_status(&self) -> Value {
        let clients = self.clients.read().await;
        let mut statuses = Vec::new();
        for client in clients.values() {
            statuses.push(client.get_status().await);
        }
        json!({"servers": statuses})
    }

    pub async fn get_tool_names(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }

    pub async fn shutdown(&self) {
        let mut clients = self.clients.write().await;
        for client in clients.values() {
            client.disconnect().await;
        }
        clients.clear();
        self.tools.write().await.clear();
    }

    async fn index_server_tools(&self, server_name: &str) {
        self.remove_server_tools(server_name).await;
        let client = { self.clients.read().await.get(server_name).cloned() };
        let Some(client) = client else { return };

        let mut tools = self.tools.write().await;
        for raw in client.list_tools().await {
            let Some(tool_name) = raw.get("name").and_then(Value::as_str) else { continue };
            let namespaced = format!("mcp__{server_name}__{tool_name}");
            tools.insert(
                namespaced.clone(),
                McpToolInfo {
                    server_name: server_name.to_string(),
                    tool_name: tool_name.to_string(),
                    namespaced_name: namespaced,
                    description: raw.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
                    input_schema: raw.get("inputSchema").cloned().unwrap_or(json!({})),
                },
            );
        }
        info!(server = %server_name, count = tools.len(), "indexed mcp server tools");
    }

    async fn remove_server_tools(&self, server_name: &str) {
        let prefix = format!("mcp__{server_name}__");
        self.tools.write().await.retain(|name, _| !name.starts_with(&prefix));
    }
}

fn parse_transport(config: &Value) -> Option<McpTransportConfig> {
    let transport = config.get("transport").and_then(Value::as_str).unwrap_or("stdio");
    match transport {
        "stdio" => {
            let command = config.get("command").and_then(Value::as_str)?.to_string();
            let args = config.get("args").and_then(Value::as_array).map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();
            let env = config.get("env").and_then(Value::as_object).map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect()).unwrap_or_default();
            Some(McpTransportConfig::Stdio { command, args, env })
        }
        "http" | "sse" => {
            let url = config.get("url").and_then(Value::as_str)?.to_string();
            let headers = config.get("headers").and_then(Value::as_object).map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect()).unwrap_or_default();
            if transport == "http" {
                Some(McpTransportConfig::Http { url, headers })
            } else {
                Some(McpTransportConfig::Sse { url, headers })
            }
        }
        _ => None,
    }
}

fn tool_definition(info: &McpToolInfo) -> Value {
    let mut parameters = serde_json::Map::new();
    if let Some(props) = info.input_schema.get("properties").and_then(Value::as_object) {
        let required: Vec<&str> = info.input_schema.get("required").and_then(Value::as_array).map(|a| a.iter().filter_map(Value::as_str).collect()).unwrap_or_default();
        for (name, schema) in props {
            let kind = schema.get("type").and_then(Value::as_str).unwrap_or("any");
            let desc = schema.get("description").and_then(Value::as_str).unwrap_or("");
            let optional = if required.contains(&name.as_str()) { "" } else { " (optional)" };
            parameters.insert(name.clone(), json!(format!("{kind}{optional} — {desc}")));
        }
    }
    json!({
        "name": info.namespaced_name,
        "description": format!("[MCP:{}] {}", info.server_name, info.description),
        "parameters": parameters,
        "mcp": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_transport_defaults_to_stdio() {
        let cfg = json!({"command": "my-server", "args": ["--flag"]});
        match parse_transport(&cfg) {
            Some(McpTransportConfig::Stdio { command, args, .. }) => {
                assert_eq!(command, "my-server");
                assert_eq!(args, vec!["--flag".to_string()]);
            }
            _ => panic!("expected stdio transport"),
        }
    }

    #[test]
    fn parse_transport_rejects_unknown_kind() {
        let cfg = json!({"transport": "carrier-pigeon"});
        assert!(parse_transport(&cfg).is_none());
    }

    #[test]
    fn tool_definition_namespaces_description() {
        let info = McpToolInfo {
            server_name: "github".into(),
            tool_name: "create_issue".into(),
            namespaced_name: "mcp__github__create_issue".into(),
            description: "Create an issue".into(),
            input_schema: json!({"properties": {"title": {"type": "string"}}, "required": ["title"]}),
        };
        let def = tool_definition(&info);
        assert_eq!(def["description"], "[MCP:github] Create an issue");
        assert!(def["parameters"]["title"].as_str().unwrap().contains("string"));
    }
}
