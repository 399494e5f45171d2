//! Ask command implementation.

use super::{build_agent, truncate};
use crate::cli::Output;
use crate::config::Settings;
use crate::toolsets::Toolset;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

/// Run the agent once on a query.
pub async fn run_ask(
    query: &str,
    deps: Value,
    model: Option<String>,
    toolsets: &[Toolset],
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.llm.model = model;
    }

    let agent = build_agent(&settings, toolsets).await?;
    let spinner = Output::spinner("Agent working...");

    match agent.run(query, Arc::new(deps), &[]).await {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}\n", response.content);

            if !response.tool_calls.is_empty() {
                Output::header(&format!("Tool calls ({})", response.tool_calls.len()));
                for call in &response.tool_calls {
                    Output::info(&format!("  {}", truncate(&call.to_string(), 80)));
                }
                println!();
            }

            Output::info(&format!("Completed in {} iteration(s)", response.iterations));
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Agent failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
