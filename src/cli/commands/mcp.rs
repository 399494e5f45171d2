//! MCP command implementation.

use crate::config::Settings;
use crate::mcp::McpServer;
use crate::toolsets::{local_registry, Toolset};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Serve toolsets over stdio. A single toolset keeps its bare tool names,
/// several are prefixed so their names cannot collide.
pub async fn run_mcp(toolsets: &[Toolset], settings: Settings) -> Result<()> {
    let prefixed = toolsets.len() > 1;
    let registry = local_registry::<Value>(&settings, toolsets, prefixed)?;

    let name = match toolsets {
        [only] => format!("huddle-{}", only),
        _ => "huddle".to_string(),
    };
    info!("Serving {} tools as MCP server {}", registry.len(), name);

    McpServer::new(&name, Arc::new(registry)).run_stdio().await?;
    Ok(())
}
