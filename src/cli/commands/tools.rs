//! Tool listing and direct invocation.

use crate::cli::Output;
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::toolsets::{build_registry, Toolset};
use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::Arc;

/// List every tool the agent would see.
pub async fn run_tools(toolsets: &[Toolset], settings: Settings) -> Result<()> {
    let registry = build_registry(&settings, toolsets).await?;

    Output::header(&format!("Tools ({})", registry.len()));
    for def in registry.definitions() {
        Output::tool(&def.name, &def.description);
    }
    println!();

    Ok(())
}

/// Dispatch one tool call and print its result.
pub async fn run_call(
    tool: &str,
    args: Value,
    deps: Value,
    toolsets: &[Toolset],
    settings: Settings,
) -> Result<()> {
    let Value::Object(arguments) = args else {
        bail!("Tool arguments must be a JSON object");
    };

    let registry = build_registry(&settings, toolsets).await?;
    let dispatcher = Dispatcher::new(Arc::new(registry));

    let result = dispatcher.dispatch(tool, arguments, Arc::new(deps)).await?;
    println!("{}", render(&result)?);

    Ok(())
}

fn render(value: &Value) -> Result<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other)?,
    })
}
