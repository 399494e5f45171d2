//! huddle - context-propagating tool dispatch
//!
//! A tool-serving agent host. A [`dispatch::Dispatcher`] relays tool calls to
//! a registry and hands every call the caller's session context as `deps`, so
//! tools can read per-session data without it ever appearing in the model's
//! tool arguments.
//!
//! # Architecture
//!
//! - `dispatch` - Tool trait, registry and the context-propagating dispatcher
//! - `mcp` - Line-delimited JSON-RPC (MCP) server and client over stdio
//! - `toolsets` - Built-in tools: deps echo, Sleeper, ESPN, utilities, retrieval
//! - `documents` - Document collections with SQLite and in-memory stores
//! - `embedding` - Embedding generation
//! - `agent` - LLM tool-calling loop over OpenAI or Azure OpenAI
//! - `api` - HTTP chat API
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use huddle::dispatch::{Arguments, Dispatcher, ToolRegistry};
//! use huddle::toolsets::EchoDeps;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry: ToolRegistry<serde_json::Value> = ToolRegistry::new();
//!     registry.register_prefixed("deps", Arc::new(EchoDeps));
//!     let dispatcher = Dispatcher::new(Arc::new(registry));
//!
//!     let out = dispatcher
//!         .dispatch("deps_echo_deps", Arguments::new(), Arc::new(serde_json::json!(42)))
//!         .await?;
//!     assert_eq!(out["deps"], 42);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod mcp;
pub mod openai;
pub mod toolsets;

pub use error::{HuddleError, Result};
