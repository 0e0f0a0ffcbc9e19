//! McpClient and ToolDiscoverer against a live gateway on an ephemeral port.

mod common;

use std::sync::Arc;

use serde_json::json;
use service_mcp_gateway::create_router;
use service_mcp_gateway::mcp::server::SUPPORTED_PROTOCOL_VERSIONS;
use service_mcp_gateway::mcp::{ClientError, McpClient, ToolDiscoverer};
use service_mcp_gateway::state::AppState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{StaticTokenProvider, settings, state, state_with};

async fn spawn_gateway(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn mount_profile(backend: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/user-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-123",
            "name": "John Doe",
            "email": "john@example.com",
            "created_at": "2024-01-01T00:00:00"
        })))
        .mount(backend)
        .await;
}

#[tokio::test]
async fn test_discover_tools_opens_session_and_caches() {
    let backend = MockServer::start().await;
    let url = spawn_gateway(state(&backend.uri())).await;

    let client = McpClient::new(&url);
    assert_eq!(client.endpoint(), format!("{url}/mcp"));
    assert!(client.cached_tools().await.is_none());

    let tools = client.discover_tools().await.unwrap();
    assert_eq!(tools.len(), 5);
    assert!(tools.iter().all(|t| t.input_schema["type"] == "object"));
    assert!(tools.iter().all(|t| t.output_schema.is_some()));
    assert_eq!(client.cached_tools().await, Some(tools));

    assert!(client.session_id().await.is_some());
    let version = client.protocol_version().await.unwrap();
    assert!(SUPPORTED_PROTOCOL_VERSIONS.contains(&version.as_str()));
}

#[tokio::test]
async fn test_invoke_and_call_tool() {
    let backend = MockServer::start().await;
    mount_profile(&backend).await;
    let url = spawn_gateway(state(&backend.uri())).await;
    let client = McpClient::new(&url);

    let profile = client
        .invoke_tool("get_user_profile", json!({ "user_id": "user-123" }))
        .await
        .unwrap();
    assert_eq!(profile["name"], "John Doe");
    assert_eq!(profile["created_at"], "2024-01-01T00:00:00Z");

    let same = client
        .call_tool("get_user_profile", json!({ "user_id": "user-123" }))
        .await
        .unwrap();
    assert_eq!(same, profile);
}

#[tokio::test]
async fn test_backend_failure_surfaces_as_tool_failed() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;
    let url = spawn_gateway(state(&backend.uri())).await;
    let client = McpClient::new(&url);

    match client
        .invoke_tool("get_user_profile", json!({ "user_id": "ghost" }))
        .await
        .unwrap_err()
    {
        ClientError::ToolFailed { tool, message } => {
            assert_eq!(tool, "get_user_profile");
            assert!(message.contains("SERVICE_ERROR"), "got {message}");
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_tool_is_rpc_error() {
    let backend = MockServer::start().await;
    let url = spawn_gateway(state(&backend.uri())).await;
    let client = McpClient::new(&url);

    match client.invoke_tool("nope", json!({})).await.unwrap_err() {
        ClientError::Rpc { code, message } => {
            assert_eq!(code, -32602);
            assert!(message.contains("nope"));
        }
        other => panic!("expected Rpc, got {other:?}"),
    }
}

#[tokio::test]
async fn test_health_and_close() {
    let backend = MockServer::start().await;
    let url = spawn_gateway(state(&backend.uri())).await;
    let client = McpClient::new(&url);

    assert!(client.check_server_health().await);
    let first = client.session_id().await;
    assert!(first.is_some());

    client.close().await;
    assert!(client.session_id().await.is_none());

    assert!(client.check_server_health().await);
    let second = client.session_id().await;
    assert!(second.is_some());
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_unreachable_server_is_unhealthy() {
    let client = McpClient::new("http://127.0.0.1:9");
    assert!(!client.check_server_health().await);
    assert!(matches!(
        client.discover_tools().await.unwrap_err(),
        ClientError::Transport { .. }
    ));
}

#[tokio::test]
async fn test_tool_discoverer_validates_locally() {
    let backend = MockServer::start().await;
    let url = spawn_gateway(state(&backend.uri())).await;
    let mut discoverer = ToolDiscoverer::new(Arc::new(McpClient::new(&url)));

    assert_eq!(discoverer.discover_tools().await.unwrap().len(), 5);
    assert_eq!(
        discoverer.list_tools(),
        vec!["create_ticket", "get_user_profile", "list_tickets", "list_users", "query_data"]
    );

    assert!(discoverer.validate_arguments("get_user_profile", &json!({ "user_id": "user-123" })));
    assert!(!discoverer.validate_arguments("get_user_profile", &json!({})));
    assert!(!discoverer.validate_arguments("list_users", &json!({ "limit": 1000 })));
    assert!(!discoverer.validate_arguments("missing_tool", &json!({})));

    let errors = discoverer
        .argument_errors("create_ticket", &json!({ "title": "x", "description": "y", "priority": "urgent" }))
        .unwrap();
    assert!(errors.iter().any(|v| v.path == "$.priority"), "got {errors:?}");

    let schema = discoverer.get_tool_schema_json("query_data").unwrap();
    assert!(schema.contains("dataset"));
    assert!(discoverer.get_tool("list_tickets").is_some());
}

#[tokio::test]
async fn test_tool_discoverer_shares_its_client() {
    let backend = MockServer::start().await;
    mount_profile(&backend).await;
    let url = spawn_gateway(state(&backend.uri())).await;
    let client = Arc::new(McpClient::new(&url));
    let mut discoverer = ToolDiscoverer::new(client.clone());

    discoverer.discover_tools().await.unwrap();
    assert!(Arc::ptr_eq(discoverer.client(), &client));
    assert_eq!(discoverer.client().session_id().await, client.session_id().await);

    let arguments = json!({ "user_id": "user-123" });
    assert!(discoverer.validate_arguments("get_user_profile", &arguments));
    let profile = discoverer
        .client()
        .call_tool("get_user_profile", arguments)
        .await
        .unwrap();
    assert_eq!(profile["id"], "user-123");
}

#[tokio::test]
async fn test_gateway_secret_requires_bearer() {
    let backend = MockServer::start().await;
    let mut guarded = settings(&backend.uri());
    guarded.server.auth_secret = Some("s3cret".into());
    let url = spawn_gateway(state_with(guarded, StaticTokenProvider::ok())).await;

    let anonymous = McpClient::new(&url);
    assert!(matches!(
        anonymous.discover_tools().await.unwrap_err(),
        ClientError::Status { status: 401, .. }
    ));

    let authorized = McpClient::new(&url).with_bearer_token("s3cret");
    assert_eq!(authorized.discover_tools().await.unwrap().len(), 5);
}
