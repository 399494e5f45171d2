//! huddle CLI entry point.

use anyhow::Result;
use clap::Parser;
use huddle::cli::{commands, Cli, Commands};
use huddle::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // stdout belongs to the MCP transport, so logs go to stderr
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("huddle={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Mcp { toolsets } => {
            commands::run_mcp(&toolsets, settings).await?;
        }

        Commands::Tools { toolsets } => {
            commands::run_tools(&toolsets.toolsets, settings).await?;
        }

        Commands::Call {
            tool,
            args,
            deps,
            toolsets,
        } => {
            commands::run_call(&tool, args, deps, &toolsets.toolsets, settings).await?;
        }

        Commands::Ask {
            query,
            deps,
            model,
            toolsets,
        } => {
            commands::run_ask(&query, deps, model, &toolsets.toolsets, settings).await?;
        }

        Commands::Chat {
            api,
            deps,
            model,
            toolsets,
        } => {
            commands::run_chat(api, deps, model, &toolsets.toolsets, settings).await?;
        }

        Commands::Serve {
            host,
            port,
            toolsets,
        } => {
            commands::run_serve(host, port, &toolsets.toolsets, settings).await?;
        }

        Commands::Ingest {
            file,
            collection,
            replace,
        } => {
            commands::run_ingest(&file, collection, replace, settings).await?;
        }

        Commands::Retrieve {
            query,
            collection,
            limit,
        } => {
            commands::run_retrieve(&query, collection, limit, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings, config_path)?;
        }
    }

    Ok(())
}
