//! MCP client speaking JSON-RPC 2.0 over HTTP to a gateway's `/mcp` endpoint.
//!
//! The session is opened lazily: the first request sends `initialize`
//! followed by `notifications/initialized`, and the `Mcp-Session-Id` the
//! server hands back is replayed on every later call.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, RwLock};

use crate::auth::{AuthError, TokenProvider};
use crate::config::ClientSettings;

use super::server::{SESSION_HEADER, SUPPORTED_PROTOCOL_VERSIONS};

const CLIENT_NAME: &str = "service-mcp-client";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("MCP HTTP request to '{url}' failed: {message}")]
    Transport { url: String, message: String },
    #[error("MCP request to '{url}' timed out")]
    Timeout { url: String },
    #[error("MCP server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Tool '{tool}' returned an error: {message}")]
    ToolFailed { tool: String, message: String },
    #[error("Invalid MCP response: {0}")]
    InvalidResponse(String),
    #[error("Client authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// A tool as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
    #[serde(rename = "outputSchema", default)]
    pub output_schema: Option<Value>,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

enum Credentials {
    None,
    Static(String),
    Provider(Arc<dyn TokenProvider>),
}

#[derive(Debug, Clone)]
struct Session {
    id: Option<String>,
    protocol_version: String,
}

pub struct McpClient {
    server_url: String,
    endpoint: String,
    http: Client,
    request_timeout: Duration,
    discovery_timeout: Duration,
    credentials: Credentials,
    session: Mutex<Option<Session>>,
    tools_cache: RwLock<Option<Vec<ToolInfo>>>,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(server_url: &str) -> Self {
        let server_url = server_url.trim_end_matches('/').to_string();
        let endpoint = if server_url.ends_with("/mcp") {
            server_url.clone()
        } else {
            format!("{server_url}/mcp")
        };
        Self {
            server_url,
            endpoint,
            http: Client::new(),
            request_timeout: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(10),
            credentials: Credentials::None,
            session: Mutex::new(None),
            tools_cache: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        let client = Self::new(&settings.mcp_server_url).with_timeouts(
            Duration::from_secs(settings.request_timeout),
            Duration::from_secs(settings.discovery_timeout),
        );
        match &settings.auth_token {
            Some(token) => client.with_bearer_token(token.clone()),
            None => client,
        }
    }

    pub fn with_timeouts(mut self, request: Duration, discovery: Duration) -> Self {
        self.request_timeout = request;
        self.discovery_timeout = discovery;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Static(token.into());
        self
    }

    /// Fetch a fresh bearer token for every request.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.credentials = Credentials::Provider(provider);
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Session id assigned by the server, once initialized.
    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.as_ref().and_then(|s| s.id.clone())
    }

    pub async fn protocol_version(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.protocol_version.clone())
    }

    // ── Tools ───────────────────────────────────────────────────────────

    /// List the server's tools and remember the result.
    pub async fn discover_tools(&self) -> Result<Vec<ToolInfo>, ClientError> {
        tracing::info!(server = %self.server_url, "discovering tools");
        let result = self
            .request("tools/list", json!({}), self.discovery_timeout)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "tool discovery failed"))?;

        let raw = result
            .get("tools")
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();
        let tools: Vec<ToolInfo> = raw
            .into_iter()
            .filter_map(|t| match serde_json::from_value::<ToolInfo>(t) {
                Ok(tool) => Some(tool),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed tool entry");
                    None
                }
            })
            .collect();

        tracing::info!(count = tools.len(), "discovered tools");
        *self.tools_cache.write().await = Some(tools.clone());
        Ok(tools)
    }

    /// Result of the last successful `discover_tools`.
    pub async fn cached_tools(&self) -> Option<Vec<ToolInfo>> {
        self.tools_cache.read().await.clone()
    }

    /// Invoke a tool and return its JSON output.
    pub async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        tracing::info!(tool = %name, "invoking tool");
        let result = self
            .request(
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
                self.request_timeout,
            )
            .await
            .inspect_err(|e| tracing::error!(tool = %name, error = %e, "tool invocation failed"))?;

        if result.get("isError").and_then(|v| v.as_bool()) == Some(true) {
            let message = first_text(&result)
                .map(str::to_string)
                .unwrap_or_else(|| result.get("content").cloned().unwrap_or(Value::Null).to_string());
            tracing::error!(tool = %name, message = %message, "tool returned an error");
            return Err(ClientError::ToolFailed { tool: name.to_string(), message });
        }

        tracing::info!(tool = %name, "tool invocation successful");
        Ok(tool_output(&result))
    }

    /// `invoke_tool` with a `{"result": ...}` envelope unwrapped.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        let mut output = self.invoke_tool(name, arguments).await?;
        if let Some(inner) = output.as_object_mut().and_then(|o| o.remove("result")) {
            return Ok(inner);
        }
        Ok(output)
    }

    pub async fn check_server_health(&self) -> bool {
        match self.request("tools/list", json!({}), self.discovery_timeout).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "MCP server health check failed");
                false
            }
        }
    }

    /// Forget the session; the next call re-initializes.
    pub async fn close(&self) {
        if self.session.lock().await.take().is_some() {
            tracing::debug!(server = %self.server_url, "MCP session closed");
        }
    }

    // ── JSON-RPC transport ──────────────────────────────────────────────

    async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, ClientError> {
        let session = self.ensure_session().await?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let (_, response) = self.json_rpc_call(session.id.as_deref(), timeout, &body).await?;
        let response =
            response.ok_or_else(|| ClientError::InvalidResponse(format!("empty reply to {method}")))?;
        into_result(response)
    }

    async fn ensure_session(&self) -> Result<Session, ClientError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let init = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "initialize",
            "params": {
                "protocolVersion": SUPPORTED_PROTOCOL_VERSIONS[0],
                "capabilities": {},
                "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") }
            }
        });
        let (session_id, response) = self
            .json_rpc_call(None, self.discovery_timeout, &init)
            .await?;
        let result = into_result(
            response.ok_or_else(|| ClientError::InvalidResponse("empty reply to initialize".into()))?,
        )?;
        let protocol_version = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
            .to_string();

        tracing::debug!(
            server = %self.server_url,
            protocol = %protocol_version,
            session = ?session_id,
            "MCP session initialized"
        );

        let notify = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        self.json_rpc_call(session_id.as_deref(), self.discovery_timeout, &notify)
            .await?;

        let session = Session { id: session_id, protocol_version };
        *guard = Some(session.clone());
        Ok(session)
    }

    /// POST one message. Returns the session header (if any) and the decoded
    /// body, which is `None` for `202 Accepted`.
    async fn json_rpc_call(
        &self,
        session_id: Option<&str>,
        timeout: Duration,
        body: &Value,
    ) -> Result<(Option<String>, Option<Value>), ClientError> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .timeout(timeout)
            .json(body);

        if let Some(sid) = session_id {
            req = req.header(SESSION_HEADER, sid);
        }
        match &self.credentials {
            Credentials::None => {}
            Credentials::Static(token) => req = req.bearer_auth(token),
            Credentials::Provider(provider) => req = req.bearer_auth(provider.get_token(None).await?),
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout { url: self.endpoint.clone() }
            } else {
                ClientError::Transport { url: self.endpoint.clone(), message: e.to_string() }
            }
        })?;

        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok((session, None));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), body: truncate_str(&text, 500) });
        }

        let text = response.text().await.map_err(|e| ClientError::Transport {
            url: self.endpoint.clone(),
            message: e.to_string(),
        })?;
        if text.trim().is_empty() {
            return Ok((session, None));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("not valid JSON: {e}")))?;
        Ok((session, Some(value)))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn into_result(response: Value) -> Result<Value, ClientError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown MCP error")
            .to_string();
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        return Err(ClientError::Rpc { code, message });
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| ClientError::InvalidResponse("missing result".to_string()))
}

fn first_text(result: &Value) -> Option<&str> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find(|c| c.get("type").and_then(|t| t.as_str()) == Some("text"))?
        .get("text")?
        .as_str()
}

/// Structured content wins; otherwise decode the first text block.
fn tool_output(result: &Value) -> Value {
    if let Some(structured) = result.get("structuredContent").filter(|v| !v.is_null()) {
        return structured.clone();
    }
    if let Some(text) = first_text(result) {
        return serde_json::from_str(text).unwrap_or_else(|_| json!({ "result": text }));
    }
    match result.get("content").and_then(|c| c.as_array()).and_then(|c| c.first()) {
        Some(first) => first.clone(),
        None => Value::Object(Map::new()),
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_len);
        format!("{}...", &s[..boundary])
    }
}
