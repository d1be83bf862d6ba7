//! A single MCP server connection: JSON-RPC 2.0 over stdio, HTTP, or SSE.
//!
//! Stdio frames messages with an LSP-style `Content-Length` header, falling
//! back to newline-delimited JSON when a server skips framing entirely. SSE
//! transports use the event stream only to learn the POST `endpoint` and to
//! hear `list_changed` notifications; request/response pairs travel over
//! plain HTTP POST to that endpoint, same as the `Http` transport.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::bmo::error::{BmoError, Result};

const CLIENT_NAME: &str = "BMO";
const CLIENT_VERSION: &str = "1.0";
const PROTOCOL_VERSION: &str = "2024-11-05";
const SSE_ENDPOINT_WAIT: std::time::Duration = std::time::Duration::from_secs(5);
const SSE_ENDPOINT_POLL: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Debug, Clone)]
pub enum McpTransportConfig {
    Stdio { command: String, args: Vec<String>, env: HashMap<String, String> },
    Http { url: String, headers: HashMap<String, String> },
    Sse { url: String, headers: HashMap<String, String> },
}

struct StdioHandle {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<tokio::process::ChildStdout>,
}

enum TransportState {
    Stdio(StdioHandle),
    Http { client: reqwest::Client, base_url: String },
    Sse { client: reqwest::Client, message_endpoint: Arc<Mutex<Option<String>>>, listener: tokio::task::JoinHandle<()> },
}

pub struct McpClient {
    name: String,
    config: McpTransportConfig,
    state: Mutex<Option<TransportState>>,
    request_id: AtomicU64,
    tools: RwLock<Vec<Value>>,
    resources: RwLock<Vec<Value>>,
    prompts: RwLock<Vec<Value>>,
    capabilities: RwLock<Value>,
    connected: AtomicBool,
}

impl McpClient {
    pub fn new(name: impl Into<String>, config: McpTransportConfig) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            config,
            state: Mutex::new(None),
            request_id: AtomicU64::new(0),
            tools: RwLock::new(Vec::new()),
            resources: RwLock::new(Vec::new()),
            prompts: RwLock::new(Vec::new()),
            capabilities: RwLock::new(json!({})),
            connected: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub async fn list_tools(&self) -> Vec<Value> {
        self.tools.read().await.clone()
    }

    pub async fn list_resources(&self) -> Vec<Value> {
        self.resources.read().await.clone()
    }

    pub async fn list_prompts(&self) -> Vec<Value> {
        self.prompts.read().await.clone()
    }

    pub async fn get_status(&self) -> Value {
        json!({
            "name": self.name,
            "transport": transport_kind(&self.config),
            "connected": self.is_connected(),
            "tools": self.tools.read().await.len(),
            "resources": self.resources.read().await.len(),
            "prompts": self.prompts.read().await.len(),
            "capabilities": self.capabilities.read().await.clone(),
        })
    }

    /// Connect, catching every failure mode as `false` — the manager decides
    /// whether a failed connection is fatal.
    pub async fn connect(self: &Arc<Self>) -> bool {
        let result = match &self.config {
            McpTransportConfig::Stdio { .. } => self.connect_stdio().await,
            McpTransportConfig::Http { .. } => self.connect_http().await,
            McpTransportConfig::Sse { .. } => self.connect_sse().await,
        };
        match result {
            Ok(()) => {
                self.connected.store(true, Ordering::Relaxed);
                true
            }
            Err(e) => {
                warn!(server = %self.name, error = %e, "mcp server connect failed");
                false
            }
        }
    }

    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
        let mut state = self.state.lock().await;
        if let Some(existing) = state.take() {
            match existing {
                TransportState::Stdio(mut handle) => {
                    let _ = handle.child.start_kill();
                    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle.child.wait()).await;
                }
                TransportState::Sse { listener, .. } => {
                    listener.abort();
                }
                TransportState::Http { .. } => {}
            }
        }
        self.tools.write().await.clear();
        self.resources.write().await.clear();
        self.prompts.write().await.clear();
    }

    pub async fn call_tool(&self, tool_name: &str, args: Value) -> Result<String> {
        let response = self.send_request("tools/call", json!({"name": tool_name, "arguments": args})).await?;
        let result = response.get("result").cloned().unwrap_or(Value::Null);
        if let Some(content) = result.get("content").and_then(Value::as_array) {
            let text: Vec<String> = content
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str).map(String::from))
                .collect();
            if !text.is_empty() {
                return Ok(text.join("\n"));
            }
        }
        Ok(serde_json::to_string(&result).unwrap_or_default())
    }

    pub async fn read_resource(&self, uri: &str) -> Result<String> {
        let response = self.send_request("resources/read", json!({"uri": uri})).await?;
        let contents = response.get("result").and_then(|r| r.get("contents")).and_then(Value::as_array).cloned().unwrap_or_default();
        let text: Vec<String> = contents.iter().filter_map(|c| c.get("text").and_then(Value::as_str).map(String::from)).collect();
        Ok(text.join("\n"))
    }

    pub async fn get_prompt(&self, name: &str, args: Value) -> Result<Value> {
        let response = self.send_request("prompts/get", json!({"name": name, "arguments": args})).await?;
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    // ── connect paths ────────────────────────────────────────────────────

    async fn connect_stdio(self: &Arc<Self>) -> Result<()> {
        let McpTransportConfig::Stdio { command, args, env } = &self.config else { unreachable!() };

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| BmoError::transport(format!("failed to spawn mcp server '{command}': {e}")))?;
        let stdin = child.stdin.take().ok_or_else(|| BmoError::transport("mcp stdio stdin unavailable"))?;
        let stdout = BufReader::new(child.stdout.take().ok_or_else(|| BmoError::transport("mcp stdio stdout unavailable"))?);

        {
            let mut state = self.state.lock().await;
            *state = Some(TransportState::Stdio(StdioHandle { child, stdin, stdout }));
        }

        if let Err(e) = self.initialize_and_refresh().await {
            let mut state = self.state.lock().await;
            if let Some(TransportState::Stdio(mut handle)) = state.take() {
                let _ = handle.child.start_kill();
            }
            return Err(e);
        }
        Ok(())
    }

    async fn connect_http(self: &Arc<Self>) -> Result<()> {
        let McpTransportConfig::Http { url, headers } = &self.config else { unreachable!() };
        let client = build_http_client(headers)?;
        {
            let mut state = self.state.lock().await;
            *state = Some(TransportState::Http { client, base_url: url.clone() });
        }
        self.initialize_and_refresh().await
    }

    async fn connect_sse(self: &Arc<Self>) -> Result<()> {
        let McpTransportConfig::Sse { url, headers } = &self.config else { unreachable!() };
        let client = build_http_client(headers)?;
        let message_endpoint = Arc::new(Mutex::new(None));

        let listener = tokio::spawn(Self::run_sse_listener(Arc::clone(self), client.clone(), url.clone(), headers.clone(), Arc::clone(&message_endpoint)));

        {
            let mut state = self.state.lock().await;
            *state = Some(TransportState::Sse { client, message_endpoint: Arc::clone(&message_endpoint), listener });
        }

        let deadline = tokio::time::Instant::now() + SSE_ENDPOINT_WAIT;
        loop {
            if message_endpoint.lock().await.is_some() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BmoError::timeout(format!("mcp server '{}' never announced an SSE endpoint", self.name)));
            }
            tokio::time::sleep(SSE_ENDPOINT_POLL).await;
        }

        self.initialize_and_refresh().await
    }

    async fn run_sse_listener(
        self_arc: Arc<Self>,
        client: reqwest::Client,
        url: String,
        headers: HashMap<String, String>,
        message_endpoint: Arc<Mutex<Option<String>>>,
    ) {
        let mut request = client.get(&url).header("Accept", "text/event-stream");
        for (k, v) in &headers {
            request = request.header(k.as_str(), v.as_str());
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(server = %self_arc.name, error = %e, "mcp sse connection failed");
                return;
            }
        };

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let Ok(bytes) = chunk else { break };
            buffer.push_str(&String::from_utf8_lossy(&bytes));
            while let Some(pos) = buffer.find("\n\n") {
                let event: String = buffer.drain(..pos + 2).collect();
                handle_sse_event(&self_arc, &event, &url, &message_endpoint).await;
            }
        }
        self_arc.connected.store(false, Ordering::Relaxed);
    }

    async fn initialize_and_refresh(self: &Arc<Self>) -> Result<()> {
        let init_params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": CLIENT_NAME, "version": CLIENT_VERSION},
        });
        let response = self.send_request("initialize", init_params).await?;
        if let Some(err) = response.get("error") {
            return Err(BmoError::transport(format!("mcp initialize error: {err}")));
        }
        let capabilities = response.get("result").and_then(|r| r.get("capabilities")).cloned().unwrap_or(json!({}));
        *self.capabilities.write().await = capabilities;

        self.send_notification("notifications/initialized", json!({})).await?;
        self.refresh_tools().await?;
        self.refresh_resources().await?;
        self.refresh_prompts().await?;
        Ok(())
    }

    async fn capability_present(&self, key: &str) -> bool {
        match self.capabilities.read().await.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    pub async fn refresh_tools(&self) -> Result<()> {
        if !self.capability_present("tools").await {
            return Ok(());
        }
        let response = self.send_request("tools/list", json!({})).await?;
        let tools = response.get("result").and_then(|r| r.get("tools")).and_then(Value::as_array).cloned().unwrap_or_default();
        *self.tools.write().await = tools;
        Ok(())
    }

    pub async fn refresh_resources(&self) -> Result<()> {
        if !self.capability_present("resources").await {
            return Ok(());
        }
        let response = self.send_request("resources/list", json!({})).await?;
        let resources = response.get("result").and_then(|r| r.get("resources")).and_then(Value::as_array).cloned().unwrap_or_default();
        *self.resources.write().await = resources;
        Ok(())
    }

    pub async fn refresh_prompts(&self) -> Result<()> {
        if !self.capability_present("prompts").await {
            return Ok(());
        }
        let response = self.send_request("prompts/list", json!({})).await?;
        let prompts = response.get("result").and_then(|r| r.get("prompts")).and_then(Value::as_array).cloned().unwrap_or_default();
        *self.prompts.write().await = prompts;
        Ok(())
    }

    // ── wire transport ───────────────────────────────────────────────────

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id();
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut state = self.state.lock().await;
        match state.as_mut() {
            Some(TransportState::Stdio(handle)) => stdio_send_receive(handle, &message).await,
            Some(TransportState::Http { client, base_url }) => http_post(client, base_url, &message).await,
            Some(TransportState::Sse { client, message_endpoint, .. }) => {
                let endpoint = message_endpoint.lock().await.clone().unwrap_or_default();
                http_post(client, &endpoint, &message).await
            }
            None => Err(BmoError::transport("mcp client is not connected")),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        let message = json!({"jsonrpc": "2.0", "method": method, "params": params});
        let mut state = self.state.lock().await;
        match state.as_mut() {
            Some(TransportState::Stdio(handle)) => stdio_send(handle, &message).await,
            Some(TransportState::Http { client, base_url }) => {
                http_post(client, base_url, &message).await.map(|_| ())
            }
            Some(TransportState::Sse { client, message_endpoint, .. }) => {
                let endpoint = message_endpoint.lock().await.clone().unwrap_or_default();
                http_post(client, &endpoint, &message).await.map(|_| ())
            }
            None => Err(BmoError::transport("mcp client is not connected")),
        }
    }
}

async fn handle_sse_event(client: &Arc<McpClient>, raw_event: &str, base_url: &str, message_endpoint: &Arc<Mutex<Option<String>>>) {
    let mut event_type = "message".to_string();
    let mut data_lines = Vec::new();
    for line in raw_event.lines() {
        if let Some(v) = line.strip_prefix("event:") {
            event_type = v.trim().to_string();
        } else if let Some(v) = line.strip_prefix("data:") {
            data_lines.push(v.trim().to_string());
        }
    }
    let data = data_lines.join("\n");

    if event_type == "endpoint" {
        let resolved = if data.starts_with("http://") || data.starts_with("https://") {
            data
        } else {
            resolve_relative(base_url, &data)
        };
        *message_endpoint.lock().await = Some(resolved);
        return;
    }

    if event_type == "message" {
        let Ok(parsed) = serde_json::from_str::<Value>(&data) else { return };
        let method = parsed.get("method").and_then(Value::as_str).unwrap_or("");
        if method == "notifications/tools/list_changed" {
            let _ = client.refresh_tools().await;
        } else if method == "notifications/resources/list_changed" {
            let _ = client.refresh_resources().await;
        }
    }
}

/// Join a relative SSE `endpoint` announcement against the stream URL's
/// origin, without pulling in a full URL-parsing crate for one join.
fn resolve_relative(base_url: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    let scheme_end = match base_url.find("://") {
        Some(idx) => idx + 3,
        None => return relative.to_string(),
    };
    let origin_end = base_url[scheme_end..].find('/').map(|i| scheme_end + i).unwrap_or(base_url.len());
    let origin = &base_url[..origin_end];
    if relative.starts_with('/') {
        format!("{origin}{relative}")
    } else {
        format!("{origin}/{relative}")
    }
}

fn build_http_client(headers: &HashMap<String, String>) -> Result<reqwest::Client> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (k, v) in headers {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(k.as_bytes()),
            reqwest::header::HeaderValue::from_str(v),
        ) {
            header_map.insert(name, value);
        }
    }
    reqwest::Client::builder()
        .default_headers(header_map)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| BmoError::transport(format!("failed to build mcp http client: {e}")))
}

async fn http_post(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| BmoError::transport(format!("mcp http request failed: {e}")))?;
    let status = response.status();
    if status.as_u16() == 204 {
        return Ok(json!({}));
    }
    let text = response.text().await.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(json!({}));
    }
    if !status.is_success() {
        return Err(BmoError::transport(format!("mcp http request failed ({status}): {text}")));
    }
    serde_json::from_str(&text).map_err(|e| BmoError::parse(format!("mcp response was not valid JSON: {e}")))
}

async fn stdio_send(handle: &mut StdioHandle, message: &Value) -> Result<()> {
    let body = serde_json::to_vec(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    handle.stdin.write_all(header.as_bytes()).await.map_err(|e| BmoError::transport(format!("mcp stdio write failed: {e}")))?;
    handle.stdin.write_all(&body).await.map_err(|e| BmoError::transport(format!("mcp stdio write failed: {e}")))?;
    Ok(())
}

async fn stdio_send_receive(handle: &mut StdioHandle, message: &Value) -> Result<Value> {
    stdio_send(handle, message).await?;
    stdio_read_message(&mut handle.stdout).await
}

async fn stdio_read_message(stdout: &mut BufReader<tokio::process::ChildStdout>) -> Result<Value> {
    let mut first_line = String::new();
    let n = stdout.read_line(&mut first_line).await.map_err(|e| BmoError::transport(format!("mcp stdio read failed: {e}")))?;
    if n == 0 {
        return Err(BmoError::transport("mcp stdio stream closed"));
    }
    let trimmed = first_line.trim_end();

    if let Some(len) = parse_content_length(trimmed) {
        loop {
            let mut header_line = String::new();
            let hn = stdout.read_line(&mut header_line).await.map_err(|e| BmoError::transport(format!("mcp stdio read failed: {e}")))?;
            if hn == 0 {
                return Err(BmoError::transport("mcp stdio stream closed mid-headers"));
            }
            if header_line.trim_end().is_empty() {
                break;
            }
        }
        let mut body = vec![0u8; len];
        stdout.read_exact(&mut body).await.map_err(|e| BmoError::transport(format!("mcp stdio body read failed: {e}")))?;
        serde_json::from_slice(&body).map_err(|e| BmoError::parse(format!("mcp stdio body was not valid JSON: {e}")))
    } else if !trimmed.is_empty() {
        debug!("mcp stdio message had no Content-Length header, falling back to newline-delimited JSON");
        serde_json::from_str(trimmed).map_err(|e| BmoError::parse(format!("mcp stdio line was not valid JSON: {e}")))
    } else {
        Box::pin(stdio_read_message(stdout)).await
    }
}

fn parse_content_length(line: &str) -> Option<usize> {
    let lower = line.to_ascii_lowercase();
    lower.strip_prefix("content-length:").and_then(|v| v.trim().parse().ok())
}

fn transport_kind(config: &McpTransportConfig) -> &'static str {
    match config {
        McpTransportConfig::Stdio { .. } => "stdio",
        McpTransportConfig::Http { .. } => "http",
        McpTransportConfig::Sse { .. } => "sse",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_parses_case_insensitively() {
        assert_eq!(parse_content_length("Content-Length: 42"), Some(42));
        assert_eq!(parse_content_length("content-length:  7"), Some(7));
        assert_eq!(parse_content_length("X-Other: 1"), None);
    }

    #[test]
    fn relative_endpoint_resolves_against_base() {
        let resolved = resolve_relative("http://localhost:8080/sse", "/messages?id=abc");
        assert_eq!(resolved, "http://localhost:8080/messages?id=abc");
    }
}
