// src/mcp/mod.rs
//! MCP (Model Context Protocol) support: server and client.
//!
//! **Server** (`mcp_handler`): exposes the gateway tools as an MCP endpoint
//! that clients call via JSON-RPC 2.0 over HTTP POST at `/mcp`.
//!
//! **Client** (`McpClient`, `ToolDiscoverer`): connects to a gateway,
//! discovers its tools, validates arguments locally and invokes tools.
//!
//! Protocol: JSON-RPC 2.0 over HTTP, no stdio or SSE transport.

pub mod client;
pub mod discovery;
pub mod schema;
pub mod server;

pub use client::{ClientError, McpClient, ToolInfo};
pub use discovery::ToolDiscoverer;
