// OpenAPI schema contract test
// Validates the generated document and its HTTP endpoint

mod common;

use axum::http::StatusCode;
use service_mcp_gateway::{ApiDoc, create_router};
use tower::ServiceExt;
use utoipa::OpenApi;

use common::{body_json, get, state};

#[test]
fn openapi_schema_is_valid_json() {
    let schema = serde_json::to_string_pretty(&ApiDoc::openapi())
        .expect("OpenAPI schema should serialize to JSON");
    assert!(!schema.is_empty(), "Schema should not be empty");
}

#[test]
fn openapi_schema_contains_required_fields() {
    let value = serde_json::to_value(ApiDoc::openapi()).expect("Schema should convert to Value");
    assert!(value.get("openapi").is_some(), "Schema should carry the 'openapi' version field");
    assert_eq!(value["info"]["title"], "Service MCP Gateway");
    assert!(value.get("paths").is_some(), "Schema should have 'paths' section");
}

#[test]
fn openapi_schema_documents_key_endpoints() {
    let value = serde_json::to_value(ApiDoc::openapi()).unwrap();
    let paths = &value["paths"];
    for route in ["/", "/health", "/health/live", "/health/ready", "/api/tools", "/api/tools/{name}", "/mcp"] {
        assert!(paths.get(route).is_some(), "Schema should document {route}");
    }
    assert!(paths["/mcp"].get("post").is_some());
}

#[test]
fn openapi_schema_lists_tool_models() {
    let value = serde_json::to_value(ApiDoc::openapi()).unwrap();
    let schemas = &value["components"]["schemas"];
    for name in ["UserProfile", "TicketResponse", "QueryDataResponse", "ErrorBody", "ToolDefinition"] {
        assert!(schemas.get(name).is_some(), "Schema should define {name}");
    }
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = create_router(state("http://127.0.0.1:9"));
    let response = app.oneshot(get("/api-docs/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["info"]["title"], "Service MCP Gateway");
    assert!(json["paths"].get("/health/ready").is_some());
}
