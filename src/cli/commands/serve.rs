//! HTTP API server command.

use super::build_agent;
use crate::api;
use crate::cli::Output;
use crate::config::Settings;
use crate::toolsets::Toolset;
use anyhow::Result;

/// Run the HTTP chat API.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    toolsets: &[Toolset],
    settings: Settings,
) -> Result<()> {
    let agent = build_agent(&settings, toolsets).await?;
    let tool_count = agent.dispatcher().registry().len();
    let app = api::router(agent);

    let host = host.unwrap_or_else(|| settings.api.host.clone());
    let port = port.unwrap_or(settings.api.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("huddle API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Model", &settings.llm.model);
    Output::kv("Tools", &tool_count.to_string());
    println!();
    println!("Endpoints:");
    Output::kv("Root", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Tools", "GET  /tools");
    Output::kv("Chat", "POST /chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}
