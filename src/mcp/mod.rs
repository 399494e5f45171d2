//! MCP (Model Context Protocol) transport for tools.
//!
//! The server exposes a registry to other processes over stdio, and the client
//! pulls the tools of another process into a local registry. Both speak
//! line-delimited JSON-RPC 2.0 and carry session context in `_meta.deps`.

mod client;
mod protocol;
mod server;

pub use client::{remote_tools, McpClient, RemoteTool};
pub use server::McpServer;
