// ---------------------------------------------------------------------------
// handlers/tools.rs: direct REST access to the tool catalog
// ---------------------------------------------------------------------------

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::error::{ErrorBody, GatewayError};
use crate::state::AppState;
use crate::tools::{self, ToolDefinition};

#[utoipa::path(get, path = "/api/tools", tag = "tools",
    responses((status = 200, description = "Tool catalog", body = Vec<ToolDefinition>))
)]
pub async fn list_tools() -> Json<Vec<ToolDefinition>> {
    Json(tools::tool_definitions())
}

/// POST /api/tools/{name}: run one tool with a JSON argument object.
///
/// An empty body means "no arguments". Failures use the gateway error body
/// and the status code of the error category.
#[utoipa::path(post, path = "/api/tools/{name}", tag = "tools",
    params(("name" = String, Path, description = "Tool name")),
    request_body(content = Value, description = "Tool arguments"),
    responses(
        (status = 200, description = "Tool output", body = Value),
        (status = 400, description = "Invalid arguments", body = ErrorBody),
        (status = 401, description = "Backend token unavailable", body = ErrorBody),
        (status = 404, description = "Unknown tool", body = ErrorBody),
        (status = 502, description = "Backend error", body = ErrorBody),
        (status = 504, description = "Backend timeout", body = ErrorBody)
    )
)]
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let arguments: Value = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| GatewayError::validation(format!("Request body is not valid JSON: {e}")))?
    };

    tracing::info!(tool = %name, "REST tool invocation");
    let output = tools::execute_tool(&name, &arguments, &state).await?;
    Ok(Json(output))
}
