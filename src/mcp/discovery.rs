//! Tool discovery and client-side argument validation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::client::{ClientError, McpClient, ToolInfo};
use super::schema::{self, Violation};

/// A validated tool definition held by the discoverer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl TryFrom<ToolInfo> for ToolDefinition {
    type Error = String;

    fn try_from(info: ToolInfo) -> Result<Self, Self::Error> {
        if info.name.trim().is_empty() {
            return Err("tool has no name".to_string());
        }
        if !info.input_schema.is_object() {
            return Err(format!("input schema of '{}' is not an object", info.name));
        }
        Ok(Self {
            name: info.name,
            description: info.description,
            input_schema: info.input_schema,
            output_schema: info.output_schema,
        })
    }
}

pub struct ToolDiscoverer {
    client: Arc<McpClient>,
    tools: HashMap<String, ToolDefinition>,
}

impl ToolDiscoverer {
    pub fn new(client: Arc<McpClient>) -> Self {
        Self {
            client,
            tools: HashMap::new(),
        }
    }

    /// Refresh the catalog from the server. Malformed entries are skipped.
    pub async fn discover_tools(&mut self) -> Result<&HashMap<String, ToolDefinition>, ClientError> {
        tracing::info!("starting tool discovery");
        let listed = self.client.discover_tools().await?;

        self.tools.clear();
        for info in listed {
            let name = info.name.clone();
            match ToolDefinition::try_from(info) {
                Ok(tool) => {
                    self.tools.insert(tool.name.clone(), tool);
                }
                Err(reason) => tracing::warn!(tool = %name, "invalid tool definition: {}", reason),
            }
        }

        tracing::info!(count = self.tools.len(), "discovered valid tools");
        Ok(&self.tools)
    }

    pub fn get_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Discovered tool names, sorted.
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schema violations for `arguments`; an unknown tool yields `None`.
    pub fn argument_errors(&self, name: &str, arguments: &Value) -> Option<Vec<Violation>> {
        self.get_tool(name)
            .map(|tool| schema::validate(&tool.input_schema, arguments))
    }

    pub fn validate_arguments(&self, name: &str, arguments: &Value) -> bool {
        match self.argument_errors(name, arguments) {
            None => {
                tracing::warn!(tool = %name, "tool not found");
                false
            }
            Some(errors) if errors.is_empty() => true,
            Some(errors) => {
                for error in &errors {
                    tracing::warn!(tool = %name, "invalid argument {}", error);
                }
                false
            }
        }
    }

    pub fn get_tool_schema_json(&self, name: &str) -> Option<String> {
        self.get_tool(name)
            .and_then(|tool| serde_json::to_string_pretty(tool).ok())
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }
}
