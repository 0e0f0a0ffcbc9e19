// src/tools.rs
//! Tool catalog and dispatcher.
//!
//! Five tools, each translated into exactly one backend REST call:
//! - `get_user_profile` `GET /users/{user_id}`
//! - `list_users` `GET /users?skip&limit`
//! - `create_ticket` `POST /tickets`
//! - `list_tickets` `GET /tickets?skip&limit[&status]`
//! - `query_data` `GET /query/{dataset}?limit[&filters]`
//!
//! Arguments are checked against the tool's input schema before they are
//! deserialized into the typed request, so every caller (MCP or REST) sees
//! the same validation errors.

pub mod data;
pub mod tickets;
pub mod users;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::mcp::schema;
use crate::models::{
    DEFAULT_PAGE_LIMIT, DEFAULT_QUERY_LIMIT, MAX_PAGE_LIMIT, MAX_QUERY_LIMIT, TicketPriority,
};
use crate::state::AppState;

/// A tool as advertised by `tools/list` and `GET /api/tools`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    #[schema(value_type = Object)]
    pub input_schema: Value,
    #[serde(rename = "outputSchema")]
    #[schema(value_type = Object)]
    pub output_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, input_schema: Value, output_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            output_schema,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "get_user_profile",
            "Retrieve a user profile from the backend service.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string", "minLength": 1, "description": "Unique user identifier" },
                    "include_details": { "type": "boolean", "default": false, "description": "Include detailed profile information" }
                },
                "required": ["user_id"],
                "additionalProperties": false
            }),
            user_profile_schema(),
        ),
        ToolDefinition::new(
            "list_users",
            "List users with pagination.",
            json!({
                "type": "object",
                "properties": pagination_properties(),
                "additionalProperties": false
            }),
            list_schema(user_profile_schema()),
        ),
        ToolDefinition::new(
            "create_ticket",
            "Create a support ticket.",
            json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "minLength": 1, "maxLength": 200, "description": "Ticket title" },
                    "description": { "type": "string", "minLength": 10, "maxLength": 5000, "description": "Detailed description" },
                    "priority": { "type": "string", "enum": TicketPriority::ALL, "default": "medium" },
                    "assignee_id": { "type": ["string", "null"], "description": "User ID to assign the ticket to" }
                },
                "required": ["title", "description"],
                "additionalProperties": false
            }),
            ticket_schema(),
        ),
        ToolDefinition::new(
            "list_tickets",
            "List support tickets, optionally filtered by status.",
            {
                let mut properties = pagination_properties();
                properties["status"] = json!({
                    "type": ["string", "null"],
                    "description": "Filter by status (open, in_progress, closed)"
                });
                json!({
                    "type": "object",
                    "properties": properties,
                    "additionalProperties": false
                })
            },
            list_schema(ticket_schema()),
        ),
        ToolDefinition::new(
            "query_data",
            "Query a backend dataset with optional filters.",
            json!({
                "type": "object",
                "properties": {
                    "dataset": { "type": "string", "minLength": 1, "description": "Dataset name to query" },
                    "filters": { "type": ["object", "null"], "description": "Query filters" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_QUERY_LIMIT, "default": DEFAULT_QUERY_LIMIT }
                },
                "required": ["dataset"],
                "additionalProperties": false
            }),
            json!({
                "type": "object",
                "properties": {
                    "dataset": { "type": "string" },
                    "rows": { "type": "integer", "minimum": 0 },
                    "data": { "type": "array", "items": { "type": "object" } }
                },
                "required": ["dataset", "rows", "data"]
            }),
        ),
    ]
}

pub fn find_tool(name: &str) -> Option<ToolDefinition> {
    tool_definitions().into_iter().find(|t| t.name == name)
}

fn pagination_properties() -> Value {
    json!({
        "skip": { "type": "integer", "minimum": 0, "default": 0, "description": "Number of records to skip" },
        "limit": { "type": "integer", "minimum": 1, "maximum": MAX_PAGE_LIMIT, "default": DEFAULT_PAGE_LIMIT, "description": "Maximum records to return" }
    })
}

fn user_profile_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" },
            "email": { "type": "string" },
            "created_at": { "type": "string", "format": "date-time" },
            "details": { "type": "object" }
        },
        "required": ["id", "name", "email", "created_at"]
    })
}

fn ticket_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "title": { "type": "string" },
            "description": { "type": "string" },
            "priority": { "type": "string" },
            "status": { "type": "string" },
            "created_at": { "type": "string", "format": "date-time" },
            "updated_at": { "type": "string", "format": "date-time" },
            "assignee_id": { "type": ["string", "null"] }
        },
        "required": ["id", "title", "description", "priority", "status", "created_at", "updated_at"]
    })
}

fn list_schema(item: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "total": { "type": "integer", "minimum": 0 },
            "items": { "type": "array", "items": item }
        },
        "required": ["total", "items"]
    })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Validate `args` against the named tool's input schema, run the tool and
/// return its output DTO as JSON.
pub async fn execute_tool(name: &str, args: &Value, state: &AppState) -> Result<Value, GatewayError> {
    let tool = find_tool(name)
        .ok_or_else(|| GatewayError::not_found(format!("Unknown tool: {name}")))?;

    // An omitted arguments object means "all defaults".
    let args = if args.is_null() { json!({}) } else { args.clone() };
    validate_arguments(&tool, &args)?;

    let rest = state.rest.as_ref();
    match name {
        "get_user_profile" => to_json(users::get_user_profile(rest, parse_args(args)?).await?),
        "list_users" => to_json(users::list_users(rest, parse_args(args)?).await?),
        "create_ticket" => to_json(tickets::create_ticket(rest, parse_args(args)?).await?),
        "list_tickets" => to_json(tickets::list_tickets(rest, parse_args(args)?).await?),
        "query_data" => to_json(data::query_data(rest, parse_args(args)?).await?),
        _ => Err(GatewayError::not_found(format!("Unknown tool: {name}"))),
    }
}

fn validate_arguments(tool: &ToolDefinition, args: &Value) -> Result<(), GatewayError> {
    let violations = schema::validate(&tool.input_schema, args);
    if violations.is_empty() {
        return Ok(());
    }
    let errors: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    tracing::warn!(tool = %tool.name, errors = ?errors, "tool arguments rejected");
    Err(GatewayError::validation(format!(
        "Invalid arguments for {}: {}",
        tool.name,
        errors.join("; ")
    ))
    .with_details(json!({ "errors": errors })))
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, GatewayError> {
    serde_json::from_value(args)
        .map_err(|e| GatewayError::validation(format!("Invalid arguments: {e}")))
}

fn to_json<T: Serialize>(output: T) -> Result<Value, GatewayError> {
    serde_json::to_value(output)
        .map_err(|e| GatewayError::internal(format!("Failed to serialize tool output: {e}")))
}

/// Map a backend payload into an output DTO.
pub(crate) fn from_backend<T: DeserializeOwned>(payload: Value) -> Result<T, GatewayError> {
    serde_json::from_value(payload)
        .map_err(|e| GatewayError::service(format!("Unexpected response from backend: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names() {
        let names: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["get_user_profile", "list_users", "create_ticket", "list_tickets", "query_data"]
        );
    }

    #[test]
    fn test_catalog_schemas_are_objects() {
        for tool in tool_definitions() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert_eq!(tool.output_schema["type"], "object", "{}", tool.name);
        }
    }

    #[test]
    fn test_create_ticket_limits() {
        let tool = find_tool("create_ticket").unwrap();
        let ok = json!({ "title": "Broken VPN", "description": "Cannot connect since Monday." });
        assert!(validate_arguments(&tool, &ok).is_ok());

        let short = json!({ "title": "Broken VPN", "description": "short" });
        let err = validate_arguments(&tool, &short).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.message().contains("$.description"));

        let bad_priority = json!({ "title": "x", "description": "long enough text", "priority": "urgent" });
        assert!(validate_arguments(&tool, &bad_priority).is_err());
    }

    #[test]
    fn test_pagination_limits() {
        let tool = find_tool("list_users").unwrap();
        assert!(validate_arguments(&tool, &json!({})).is_ok());
        assert!(validate_arguments(&tool, &json!({ "limit": 100 })).is_ok());
        assert!(validate_arguments(&tool, &json!({ "limit": 0 })).is_err());
        assert!(validate_arguments(&tool, &json!({ "limit": 101 })).is_err());
        assert!(validate_arguments(&tool, &json!({ "skip": -1 })).is_err());
    }

    #[test]
    fn test_query_limit_range() {
        let tool = find_tool("query_data").unwrap();
        assert!(validate_arguments(&tool, &json!({ "dataset": "sales", "limit": 1000 })).is_ok());
        assert!(validate_arguments(&tool, &json!({ "dataset": "sales", "limit": 1001 })).is_err());
        assert!(validate_arguments(&tool, &json!({ "limit": 5 })).is_err());
    }

    #[test]
    fn test_from_backend_reports_service_error() {
        let err = from_backend::<crate::models::UserProfile>(json!({ "id": "u1" })).unwrap_err();
        assert_eq!(err.code(), "SERVICE_ERROR");
        assert!(err.message().starts_with("Unexpected response from backend"));
    }
}
