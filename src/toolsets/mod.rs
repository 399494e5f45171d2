//! Built-in toolsets and registry wiring.
//!
//! Each toolset is a group of tools that can be served on its own over MCP
//! (`huddle mcp --toolset sleeper`) or registered directly into the agent's
//! registry under its prefix (`sleeper_get_user`).

mod deps;
mod espn;
mod retrieval;
mod sleeper;
mod utility;

pub use deps::EchoDeps;
pub use espn::{parse_cookie_string, EspnApi, EspnCookies};
pub use retrieval::RetrieveTool;
pub use sleeper::SleeperApi;
pub use utility::{CurrentTime, RandomCity, Weather};

use crate::config::Settings;
use crate::dispatch::{parse_arguments, Arguments, Tool, ToolRegistry};
use crate::documents::{open_store, Retriever};
use crate::embedding::OpenAIEmbedder;
use crate::error::{HuddleError, Result};
use crate::mcp::remote_tools;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A group of built-in tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolset {
    Deps,
    Sleeper,
    Espn,
    Utility,
    Retrieval,
}

impl Toolset {
    pub const ALL: [Toolset; 5] = [
        Toolset::Deps,
        Toolset::Sleeper,
        Toolset::Espn,
        Toolset::Utility,
        Toolset::Retrieval,
    ];

    /// Prefix used when the toolset joins a shared registry.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Toolset::Deps => Some("deps"),
            Toolset::Sleeper => Some("sleeper"),
            Toolset::Espn => Some("espn"),
            Toolset::Utility | Toolset::Retrieval => None,
        }
    }

    /// Instantiate the toolset's tools.
    pub fn tools<D>(&self, settings: &Settings) -> Result<Vec<Arc<dyn Tool<D>>>>
    where
        D: Serialize + Send + Sync + 'static,
    {
        let tools = match self {
            Toolset::Deps => vec![Arc::new(EchoDeps) as Arc<dyn Tool<D>>],
            Toolset::Sleeper => SleeperApi::from_settings(&settings.sleeper)?.tools(),
            Toolset::Espn => EspnApi::from_settings(&settings.espn)?.tools(),
            Toolset::Utility => utility::tools()?,
            Toolset::Retrieval => {
                let embedder = OpenAIEmbedder::from_settings(&settings.embedding)?;
                let retriever = Retriever::new(open_store(settings)?, Arc::new(embedder));
                vec![Arc::new(RetrieveTool::new(
                    Arc::new(retriever),
                    &settings.documents.collection,
                    settings.documents.max_results,
                )) as Arc<dyn Tool<D>>]
            }
        };
        Ok(tools)
    }
}

impl std::str::FromStr for Toolset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deps" => Ok(Toolset::Deps),
            "sleeper" => Ok(Toolset::Sleeper),
            "espn" => Ok(Toolset::Espn),
            "utility" | "util" => Ok(Toolset::Utility),
            "retrieval" | "rag" => Ok(Toolset::Retrieval),
            _ => Err(format!("Unknown toolset: {}", s)),
        }
    }
}

impl std::fmt::Display for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Toolset::Deps => "deps",
            Toolset::Sleeper => "sleeper",
            Toolset::Espn => "espn",
            Toolset::Utility => "utility",
            Toolset::Retrieval => "retrieval",
        };
        write!(f, "{}", name)
    }
}

/// Registry of built-in toolsets. With `prefixed`, tools are registered under
/// their toolset's prefix; otherwise under their bare names, as an MCP server
/// exposes them.
pub fn local_registry<D>(
    settings: &Settings,
    toolsets: &[Toolset],
    prefixed: bool,
) -> Result<ToolRegistry<D>>
where
    D: Serialize + Send + Sync + 'static,
{
    let mut registry = ToolRegistry::new();
    for toolset in toolsets {
        let prefix = if prefixed { toolset.prefix() } else { None };
        registry.extend(prefix, toolset.tools::<D>(settings)?);
    }
    Ok(registry)
}

/// Full agent registry: prefixed built-in toolsets plus the tools of every
/// configured MCP server. A server that fails to start is skipped.
pub async fn build_registry(settings: &Settings, toolsets: &[Toolset]) -> Result<ToolRegistry<Value>> {
    let mut registry = local_registry(settings, toolsets, true)?;

    let connections = settings.servers.iter().map(|server| async move {
        (server, remote_tools(server).await)
    });

    for (server, outcome) in futures::future::join_all(connections).await {
        match outcome {
            Ok(tools) => {
                info!("Registered {} tools from MCP server {}", tools.len(), server.name);
                registry.extend(
                    server.tool_prefix.as_deref(),
                    tools.into_iter().map(|t| Arc::new(t) as Arc<dyn Tool<Value>>),
                );
            }
            Err(e) => warn!("Skipping MCP server {}: {}", server.name, e),
        }
    }

    Ok(registry)
}

/// Parse a toolset's tagged call enum from a tool name and its arguments.
pub(crate) fn parse_call<T: DeserializeOwned>(name: &str, mut args: Arguments) -> Result<T> {
    args.insert("name".to_string(), Value::String(name.to_string()));
    parse_arguments(args)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("huddle/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| HuddleError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Field of a JSON object as display text, `N/A` when missing or null.
pub(crate) fn field(value: &Value, key: &str) -> String {
    field_or(value, key, "N/A")
}

pub(crate) fn field_or(value: &Value, key: &str, default: &str) -> String {
    match value.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
