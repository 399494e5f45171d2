//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod documents;
mod mcp;
mod serve;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use documents::{run_ingest, run_retrieve};
pub use mcp::run_mcp;
pub use serve::run_serve;
pub use tools::{run_call, run_tools};

use crate::agent::{create_chat_model, Agent};
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::toolsets::{build_registry, Toolset};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// Agent over the chosen toolsets and every configured MCP server.
async fn build_agent(settings: &Settings, toolsets: &[Toolset]) -> Result<Agent<Value>> {
    let registry = build_registry(settings, toolsets).await?;
    let model = create_chat_model(&settings.llm)?;
    Ok(Agent::new(model, Dispatcher::new(Arc::new(registry))).with_settings(&settings.llm))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
