//! MCP client for tools living in another process.
//!
//! Requests are multiplexed by id over one connection: a background task
//! routes each response line to the caller waiting on it, so several tool
//! calls can be outstanding at once.

use super::protocol::*;
use crate::config::McpServerSettings;
use crate::dispatch::{Arguments, Metadata, Tool, ToolDefinition};
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

const CLIENT_NAME: &str = "huddle";

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<IncomingMessage>>>>;

/// Connection to one MCP server.
pub struct McpClient {
    name: String,
    outgoing: mpsc::UnboundedSender<String>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
    // Held so the child is killed when the client goes away.
    _child: Option<Child>,
}

impl McpClient {
    /// Spawn a configured server process and complete the handshake.
    #[instrument(skip_all, fields(server = %settings.name))]
    pub async fn spawn(settings: &McpServerSettings) -> Result<Arc<Self>> {
        let mut child = Command::new(&settings.command)
            .args(&settings.args)
            .envs(&settings.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HuddleError::Config(format!(
                    "Failed to start MCP server '{}' ({}): {}",
                    settings.name, settings.command, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HuddleError::Protocol("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HuddleError::Protocol("child stdout unavailable".to_string()))?;

        let client = Self::start(
            &settings.name,
            BufReader::new(stdout),
            stdin,
            Duration::from_secs(settings.timeout_secs),
            Some(child),
        );
        client.initialize().await?;
        Ok(Arc::new(client))
    }

    /// Connect over an existing transport and complete the handshake.
    pub async fn connect<R, W>(name: &str, reader: R, writer: W, timeout: Duration) -> Result<Arc<Self>>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let client = Self::start(name, reader, writer, timeout, None);
        client.initialize().await?;
        Ok(Arc::new(client))
    }

    fn start<R, W>(name: &str, reader: R, writer: W, timeout: Duration, child: Option<Child>) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(write_lines(writer, rx));
        tokio::spawn(route_responses(name.to_string(), reader, Arc::clone(&pending)));

        Self {
            name: name.to_string(),
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            _child: child,
        }
    }

    /// Server name from configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") },
        });
        let result: InitializeResult =
            serde_json::from_value(self.request("initialize", Some(params)).await?)?;
        self.notify("notifications/initialized", None)?;

        info!(
            "Connected to MCP server {} {} (protocol {})",
            result.server_info.name, result.server_info.version, result.protocol_version
        );
        Ok(())
    }

    /// List the server's tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let result: ToolsListResult =
            serde_json::from_value(self.request("tools/list", None).await?)?;
        debug!("{} offers {} tools", self.name, result.tools.len());
        Ok(result.tools)
    }

    /// Call a remote tool. `meta` becomes the request's `_meta` field.
    pub async fn call_tool(&self, name: &str, arguments: Arguments, meta: Option<Value>) -> Result<Value> {
        let meta = match meta {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(HuddleError::InvalidArguments(format!(
                    "_meta must be an object, got {}",
                    other
                )))
            }
        };
        let params = ToolCallParams {
            name: name.to_string(),
            arguments: Some(arguments),
            meta,
        };

        let raw = self.request("tools/call", Some(serde_json::to_value(&params)?)).await?;
        let result: ToolCallResult = serde_json::from_value(raw)?;

        if result.is_error == Some(true) {
            return Err(result.to_error());
        }
        match result.structured_content {
            Some(value) => Ok(value),
            None => Ok(Value::String(result.joined_text())),
        }
    }

    /// Send a request and wait for its response.
    ///
    /// If the wait ends early (timeout or the caller dropping this future)
    /// the server is told to cancel the request.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let mut guard = PendingRequest {
            client: self,
            id,
            answered: false,
        };

        let request = JsonRpcRequest::new(Some(json!(id)), method, params);
        self.send(&request)?;

        let message = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => {
                guard.answered = true;
                return Err(HuddleError::Protocol(format!(
                    "MCP server '{}' closed the connection",
                    self.name
                )));
            }
            Err(_) => {
                return Err(HuddleError::Upstream(format!(
                    "MCP server '{}' did not answer {} within {:?}",
                    self.name, method, self.timeout
                )))
            }
        };
        guard.answered = true;

        if let Some(error) = message.error {
            return Err(rpc_error_to_huddle(error));
        }
        Ok(message.result.unwrap_or(Value::Null))
    }

    fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.send(&JsonRpcRequest::new(None, method, params))
    }

    fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let line = serde_json::to_string(message)?;
        self.outgoing.send(line).map_err(|_| {
            HuddleError::Protocol(format!("MCP server '{}' connection is closed", self.name))
        })
    }
}

/// Removes a pending entry when the waiting call ends, and asks the server
/// to cancel it if it ended without an answer.
struct PendingRequest<'a> {
    client: &'a McpClient,
    id: u64,
    answered: bool,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        lock(&self.client.pending).remove(&self.id);
        if !self.answered {
            let params = json!({ "requestId": self.id, "reason": "request abandoned by client" });
            let _ = self.client.notify("notifications/cancelled", Some(params));
        }
    }
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<IncomingMessage>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

fn rpc_error_to_huddle(error: JsonRpcError) -> HuddleError {
    if error.code == INVALID_PARAMS {
        if let Some(name) = error.message.strip_prefix(UNKNOWN_TOOL_PREFIX) {
            return HuddleError::ToolNotFound(name.to_string());
        }
    }
    HuddleError::Protocol(format!("{} (code {})", error.message, error.code))
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Failed to write to MCP server: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!("Failed to flush MCP server input: {}", e);
            break;
        }
    }
}

async fn route_responses<R>(name: String, reader: R, pending: Pending)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Reading from MCP server '{}' failed: {}", name, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message: IncomingMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unparseable line from MCP server '{}': {}", name, e);
                continue;
            }
        };

        if let Some(method) = message.method.as_deref() {
            if method == "notifications/message" {
                let data = message
                    .params
                    .as_ref()
                    .and_then(|p| p.get("data"))
                    .cloned()
                    .unwrap_or(Value::Null);
                info!(server = %name, "{}", data);
            } else {
                debug!(server = %name, "Ignoring server message {}", method);
            }
            continue;
        }

        let Some(id) = message.id.as_ref().and_then(Value::as_u64) else {
            debug!("Response from '{}' without a usable id", name);
            continue;
        };
        let waiter = lock(&pending).remove(&id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => debug!("Late response {} from '{}' dropped", id, name),
        }
    }

    // Wake everyone still waiting; their senders drop here.
    lock(&pending).clear();
    debug!("MCP server '{}' disconnected", name);
}

/// A tool served by a remote MCP server.
pub struct RemoteTool {
    client: Arc<McpClient>,
    definition: ToolDefinition,
    forward_deps: bool,
}

impl RemoteTool {
    pub fn new(client: Arc<McpClient>, definition: ToolDefinition, forward_deps: bool) -> Self {
        Self {
            client,
            definition,
            forward_deps,
        }
    }
}

#[async_trait]
impl<D: Serialize + Send + Sync + 'static> Tool<D> for RemoteTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn input_schema(&self) -> Value {
        self.definition.input_schema.clone()
    }

    async fn call(&self, args: Arguments, meta: &Metadata<D>) -> Result<Value> {
        let meta = if self.forward_deps {
            Some(meta.to_value()?)
        } else {
            None
        };
        self.client.call_tool(&self.definition.name, args, meta).await
    }
}

/// Connect to a configured server and wrap each of its tools.
pub async fn remote_tools(settings: &McpServerSettings) -> Result<Vec<RemoteTool>> {
    let client = McpClient::spawn(settings).await?;
    let definitions = client.list_tools().await?;
    Ok(definitions
        .into_iter()
        .map(|def| RemoteTool::new(Arc::clone(&client), def, settings.forward_deps))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Dispatcher, ToolRegistry};
    use crate::mcp::McpServer;
    use crate::toolsets::EchoDeps;

    /// In-process server wired to a client through two pipes.
    async fn connected(registry: ToolRegistry<Value>) -> Arc<McpClient> {
        let (client_writer, server_reader) = tokio::io::duplex(64 * 1024);
        let (server_writer, client_reader) = tokio::io::duplex(64 * 1024);
        let server = McpServer::new("remote", Arc::new(registry));
        tokio::spawn(server.serve(BufReader::new(server_reader), server_writer));

        McpClient::connect(
            "remote",
            BufReader::new(client_reader),
            client_writer,
            Duration::from_secs(5),
        )
        .await
        .unwrap()
    }

    fn echo_registry() -> ToolRegistry<Value> {
        let mut registry: ToolRegistry<Value> = ToolRegistry::new();
        registry.register(Arc::new(EchoDeps));
        registry
    }

    #[tokio::test]
    async fn test_deps_cross_the_wire() {
        let client = connected(echo_registry()).await;
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);

        let mut local: ToolRegistry<Value> = ToolRegistry::new();
        local.register_prefixed(
            "deps",
            Arc::new(RemoteTool::new(client, tools[0].clone(), true)),
        );
        let dispatcher = Dispatcher::new(Arc::new(local));

        let result = dispatcher
            .dispatch("deps_echo_deps", Arguments::new(), Arc::new(json!(42)))
            .await
            .unwrap();
        assert_eq!(result, json!({ "echo": "This is an echo message", "deps": 42 }));
    }

    /// Returns `null`, or fails with the error named by its `fail` argument.
    struct Flaky;

    #[async_trait]
    impl Tool<Value> for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "returns null or fails"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn call(&self, args: Arguments, _meta: &Metadata<Value>) -> Result<Value> {
            match args.get("fail").and_then(Value::as_str) {
                Some("upstream") => Err(HuddleError::Upstream("503".into())),
                Some("args") => Err(HuddleError::InvalidArguments("missing field `week`".into())),
                _ => Ok(Value::Null),
            }
        }
    }

    async fn flaky_dispatcher() -> Dispatcher<Value> {
        let mut served: ToolRegistry<Value> = ToolRegistry::new();
        served.register(Arc::new(Flaky));
        let client = connected(served).await;
        let tools = client.list_tools().await.unwrap();

        let mut local: ToolRegistry<Value> = ToolRegistry::new();
        local.register(Arc::new(RemoteTool::new(client, tools[0].clone(), true)));
        Dispatcher::new(Arc::new(local))
    }

    fn fail_with(kind: &str) -> Arguments {
        let mut args = Arguments::new();
        args.insert("fail".into(), json!(kind));
        args
    }

    #[tokio::test]
    async fn test_null_result_crosses_the_wire() {
        let dispatcher = flaky_dispatcher().await;
        let result = dispatcher
            .dispatch("flaky", Arguments::new(), Arc::new(json!(42)))
            .await
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_remote_errors_keep_their_kind() {
        let dispatcher = flaky_dispatcher().await;

        let err = dispatcher
            .dispatch("flaky", fail_with("upstream"), Arc::new(Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(&err, HuddleError::Upstream(m) if m == "503"));
        assert_eq!(err.to_string(), "Upstream call failed: 503");

        let err = dispatcher
            .dispatch("flaky", fail_with("args"), Arc::new(Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, HuddleError::InvalidArguments(m) if m == "missing field `week`"));
    }

    #[tokio::test]
    async fn test_deps_withheld_when_forwarding_disabled() {
        let client = connected(echo_registry()).await;
        let tools = client.list_tools().await.unwrap();
        let tool = RemoteTool::new(client, tools[0].clone(), false);

        let meta = Metadata::new(Arc::new(json!(42)));
        let result = Tool::<Value>::call(&tool, Arguments::new(), &meta).await.unwrap();
        assert_eq!(result["deps"], Value::Null);
    }

    #[tokio::test]
    async fn test_remote_unknown_tool_maps_to_not_found() {
        let client = connected(echo_registry()).await;
        let err = client
            .call_tool("nope", Arguments::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HuddleError::ToolNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_concurrent_remote_calls_are_not_mixed_up() {
        let client = connected(echo_registry()).await;

        let calls = (0..8).map(|i| {
            let client = Arc::clone(&client);
            async move {
                client
                    .call_tool("echo_deps", Arguments::new(), Some(json!({ "deps": i })))
                    .await
                    .unwrap()
            }
        });
        let results = futures::future::join_all(calls).await;

        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result["deps"], i);
        }
    }

    #[tokio::test]
    async fn test_timeout_is_reported_as_upstream_failure() {
        // A peer that reads requests but never answers anything after the handshake.
        let (client_writer, server_reader) = tokio::io::duplex(64 * 1024);
        let (mut server_writer, client_reader) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_reader).lines();
            if let Ok(Some(_initialize)) = lines.next_line().await {
                let reply = json!({
                    "jsonrpc": "2.0", "id": 1,
                    "result": {
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": {},
                        "serverInfo": { "name": "mute", "version": "0" }
                    }
                });
                let _ = server_writer
                    .write_all(format!("{}\n", reply).as_bytes())
                    .await;
            }
            while let Ok(Some(_)) = lines.next_line().await {}
        });

        let client = McpClient::connect(
            "mute",
            BufReader::new(client_reader),
            client_writer,
            Duration::from_millis(50),
        )
        .await
        .unwrap();

        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, HuddleError::Upstream(msg) if msg.contains("did not answer")));
    }
}
