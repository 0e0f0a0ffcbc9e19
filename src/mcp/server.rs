//! MCP server: exposes the gateway tools over JSON-RPC 2.0 at `POST /mcp`.
//!
//! Supported methods:
//! - `initialize` negotiates the protocol version and opens a session
//! - `notifications/*` are acknowledged with `202 Accepted`
//! - `ping`
//! - `tools/list`
//! - `tools/call`

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::state::AppState;
use crate::tools;

pub const SERVER_NAME: &str = "service-mcp-server";
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Newest first; the first entry is offered when the client asks for
/// something we do not speak.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// MCP JSON-RPC 2.0 endpoint handler.
///
/// The body is parsed by hand so malformed JSON gets a proper `-32700`
/// reply instead of axum's plain-text rejection.
#[utoipa::path(post, path = "/mcp", tag = "mcp",
    request_body(content = Value, description = "JSON-RPC 2.0 request or notification"),
    responses(
        (status = 200, description = "JSON-RPC response", body = Value),
        (status = 202, description = "Notification accepted")
    )
)]
pub async fn mcp_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "MCP server: unparsable request body");
            return reply(json_rpc_error(Value::Null, PARSE_ERROR, &format!("Parse error: {e}")));
        }
    };

    let id = request.get("id").cloned();
    if request.get("jsonrpc").and_then(|v| v.as_str()) != Some("2.0") {
        return reply(json_rpc_error(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid Request: expected jsonrpc \"2.0\"",
        ));
    }
    let Some(method) = request.get("method").and_then(|m| m.as_str()) else {
        return reply(json_rpc_error(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid Request: missing method",
        ));
    };

    let session_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    tracing::debug!(method = %method, session = ?session_id, "MCP server: incoming request");

    // Notifications carry no id and never get a JSON-RPC response.
    let Some(id) = id else {
        tracing::debug!(method = %method, "MCP server: notification acknowledged");
        return StatusCode::ACCEPTED.into_response();
    };

    match method {
        "initialize" => {
            let session = Uuid::new_v4().to_string();
            tracing::info!(session = %session, "MCP server: session initialized");
            (
                StatusCode::OK,
                [(SESSION_HEADER, session)],
                Json(handle_initialize(&request, &id)),
            )
                .into_response()
        }
        "ping" => reply(json_rpc_result(&id, json!({}))),
        "tools/list" => reply(handle_tools_list(&id)),
        "tools/call" => reply(handle_tools_call(&state, &request, &id).await),
        _ => reply(json_rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {method}"))),
    }
}

fn reply(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

// ── initialize ──────────────────────────────────────────────────────────────

pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|r| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == r))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

fn handle_initialize(request: &Value, id: &Value) -> Value {
    let requested = request
        .pointer("/params/protocolVersion")
        .and_then(|v| v.as_str());
    let version = negotiate_protocol_version(requested);

    json_rpc_result(
        id,
        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Tools for user profiles, support tickets and dataset queries backed by an authenticated REST service."
        }),
    )
}

// ── tools/list ──────────────────────────────────────────────────────────────

fn handle_tools_list(id: &Value) -> Value {
    json_rpc_result(id, json!({ "tools": tools::tool_definitions() }))
}

// ── tools/call ──────────────────────────────────────────────────────────────

async fn handle_tools_call(state: &AppState, request: &Value, id: &Value) -> Value {
    let params = request.get("params").cloned().unwrap_or(json!({}));
    let tool_name = params
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or("");
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    if tool_name.is_empty() {
        return json_rpc_error(id.clone(), INVALID_PARAMS, "Missing 'name' in params");
    }
    if tools::find_tool(tool_name).is_none() {
        return json_rpc_error(id.clone(), INVALID_PARAMS, &format!("Unknown tool: {tool_name}"));
    }

    let trace_id = Uuid::new_v4();
    let started = Instant::now();
    tracing::info!(tool = %tool_name, %trace_id, "MCP server: tools/call");

    match tools::execute_tool(tool_name, &arguments, state).await {
        Ok(output) => {
            tracing::info!(
                tool = %tool_name,
                %trace_id,
                duration_ms = started.elapsed().as_millis() as u64,
                "tool call succeeded"
            );
            json_rpc_result(
                id,
                json!({
                    "content": [{ "type": "text", "text": output.to_string() }],
                    "structuredContent": output,
                    "isError": false
                }),
            )
        }
        Err(e) => {
            tracing::error!(
                tool = %tool_name,
                %trace_id,
                code = e.code(),
                duration_ms = started.elapsed().as_millis() as u64,
                "tool call failed: {}",
                e
            );
            let body = json!(e.to_body());
            json_rpc_result(
                id,
                json!({
                    "content": [{ "type": "text", "text": body.to_string() }],
                    "isError": true
                }),
            )
        }
    }
}

// ── JSON-RPC helpers ────────────────────────────────────────────────────────

fn json_rpc_result(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn json_rpc_error(id: Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_protocol_version() {
        assert_eq!(negotiate_protocol_version(Some("2024-11-05")), "2024-11-05");
        assert_eq!(negotiate_protocol_version(Some("2025-03-26")), "2025-03-26");
        assert_eq!(negotiate_protocol_version(Some("1999-01-01")), "2025-06-18");
        assert_eq!(negotiate_protocol_version(None), "2025-06-18");
    }

    #[test]
    fn test_json_rpc_error_shape() {
        let err = json_rpc_error(json!(7), METHOD_NOT_FOUND, "Method not found: foo");
        assert_eq!(err["jsonrpc"], "2.0");
        assert_eq!(err["id"], 7);
        assert_eq!(err["error"]["code"], -32601);
    }
}
