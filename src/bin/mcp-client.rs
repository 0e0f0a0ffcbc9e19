//! Command-line MCP client: health check, tool discovery and a sample call.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::json;

use service_mcp_gateway::config::ClientSettings;
use service_mcp_gateway::logging;
use service_mcp_gateway::mcp::{McpClient, ToolDiscoverer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ClientSettings::from_env().context("invalid client configuration")?;
    logging::init_tracing(&settings.log_level);

    let client = Arc::new(McpClient::from_settings(&settings));
    let outcome = run(&client).await;
    client.close().await;

    if let Err(e) = &outcome {
        tracing::error!("MCP client failed: {:#}", e);
    }
    outcome
}

async fn run(client: &Arc<McpClient>) -> anyhow::Result<()> {
    tracing::info!(server = %client.server_url(), "checking MCP server health");
    if !client.check_server_health().await {
        bail!("MCP server at {} is not healthy", client.server_url());
    }
    tracing::info!("MCP server is healthy");

    let mut discoverer = ToolDiscoverer::new(client.clone());
    let count = discoverer
        .discover_tools()
        .await
        .context("tool discovery failed")?
        .len();

    tracing::info!("discovered {} tools:", count);
    for name in discoverer.list_tools() {
        if let Some(tool) = discoverer.get_tool(&name) {
            tracing::info!("  - {}: {}", name, tool.description);
        }
    }

    if discoverer.get_tool("get_user_profile").is_some() {
        let arguments = json!({ "user_id": "user-123", "include_details": false });
        if !discoverer.validate_arguments("get_user_profile", &arguments) {
            bail!("sample arguments rejected by the get_user_profile schema");
        }
        tracing::info!("invoking get_user_profile");
        let result = discoverer
            .client()
            .call_tool("get_user_profile", arguments)
            .await
            .context("get_user_profile failed")?;
        tracing::info!(result = %result, "get_user_profile result");
    }

    tracing::info!("MCP client completed successfully");
    Ok(())
}
