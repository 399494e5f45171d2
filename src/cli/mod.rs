//! CLI module for huddle.

pub mod commands;
mod output;

pub use output::Output;

use crate::toolsets::Toolset;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

/// huddle - tool dispatch with session context
///
/// Serves fantasy football, utility and retrieval tools over MCP, and drives
/// an LLM agent that calls them with a per-session context.
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ToolsetArgs {
    /// Toolsets to load (deps, sleeper, espn, utility, retrieval)
    #[arg(
        short,
        long = "toolset",
        value_delimiter = ',',
        default_value = "deps,sleeper,espn,utility,retrieval"
    )]
    pub toolsets: Vec<Toolset>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve toolsets as an MCP server over stdio
    Mcp {
        /// Toolsets to serve, comma separated
        #[arg(short, long = "toolset", value_delimiter = ',', default_value = "deps")]
        toolsets: Vec<Toolset>,
    },

    /// List the tools the agent can call
    Tools {
        #[command(flatten)]
        toolsets: ToolsetArgs,
    },

    /// Call one tool directly
    Call {
        /// Tool name, as listed by `huddle tools`
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}", value_parser = parse_json)]
        args: Value,

        /// Session context as JSON
        #[arg(short, long, default_value = "null", value_parser = parse_json)]
        deps: Value,

        #[command(flatten)]
        toolsets: ToolsetArgs,
    },

    /// Ask the agent a single question
    Ask {
        /// The question to ask
        query: String,

        /// Session context as JSON
        #[arg(short, long, default_value = "null", value_parser = parse_json)]
        deps: Value,

        /// LLM model (or Azure deployment) to use
        #[arg(short, long)]
        model: Option<String>,

        #[command(flatten)]
        toolsets: ToolsetArgs,
    },

    /// Start an interactive chat session
    Chat {
        /// Talk to a running `huddle serve` instead of a local agent
        #[arg(long, env = "API_URL", num_args = 0..=1, default_missing_value = "http://localhost:8000")]
        api: Option<String>,

        /// Session context as JSON
        #[arg(short, long, default_value = "null", value_parser = parse_json)]
        deps: Value,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        #[command(flatten)]
        toolsets: ToolsetArgs,
    },

    /// Start the HTTP chat API
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        toolsets: ToolsetArgs,
    },

    /// Index a text file, one document per line
    Ingest {
        /// File to ingest
        file: String,

        /// Target collection (defaults to documents.collection)
        #[arg(long)]
        collection: Option<String>,

        /// Remove existing documents of the collection first
        #[arg(long)]
        replace: bool,
    },

    /// Search a document collection
    Retrieve {
        /// Search query
        query: String,

        /// Collection to search (defaults to documents.collection)
        #[arg(long)]
        collection: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "llm.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}
