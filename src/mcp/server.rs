//! MCP server exposing a tool registry over line-delimited JSON-RPC.

use super::protocol::*;
use crate::dispatch::{Dispatcher, Metadata, ToolRegistry, DEPS_KEY};
use crate::error::{HuddleError, Result};
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// MCP server for one toolset.
///
/// Each `tools/call` runs on its own task, so a slow tool never holds up
/// other requests on the same connection.
pub struct McpServer {
    name: String,
    dispatcher: Dispatcher<Value>,
    in_flight: InFlight,
}

impl McpServer {
    /// Create a server over a registry.
    pub fn new(name: &str, registry: Arc<ToolRegistry<Value>>) -> Self {
        Self {
            name: name.to_string(),
            dispatcher: Dispatcher::new(registry),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve on stdin/stdout until stdin closes.
    pub async fn run_stdio(self) -> Result<()> {
        info!("MCP server '{}' starting on stdio", self.name);
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    ///
    /// Returns once the reader is exhausted and every in-flight call has answered.
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let mut calls = JoinSet::new();

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                    let _ = tx.send(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"));
                    continue;
                }
            };

            if request.is_notification() {
                self.handle_notification(request);
                continue;
            }

            if request.method == "tools/call" {
                // Registered before spawning so a cancellation read right after
                // this line always finds its token.
                let key = request.id.as_ref().map(Value::to_string).unwrap_or_default();
                let token = CancellationToken::new();
                match self.lock_in_flight().entry(key.clone()) {
                    Entry::Occupied(_) => {
                        warn!("Request id {} is already in flight", key);
                        let _ = tx.send(JsonRpcResponse::error(
                            request.id,
                            INVALID_REQUEST,
                            &format!("Request id {} is already in flight", key),
                        ));
                        continue;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(token.clone());
                    }
                }

                let dispatcher = self.dispatcher.clone();
                let in_flight = Arc::clone(&self.in_flight);
                let tx = tx.clone();
                calls.spawn(async move {
                    let response =
                        handle_tools_call(dispatcher, request.id, request.params, &token).await;
                    in_flight.lock().unwrap_or_else(|e| e.into_inner()).remove(&key);
                    if let Some(response) = response {
                        let _ = tx.send(response);
                    }
                });
                while calls.try_join_next().is_some() {}
                continue;
            }

            let _ = tx.send(self.handle_request(request));
        }

        debug!("Input closed, waiting for {} in-flight calls", calls.len());
        while calls.join_next().await.is_some() {}
        drop(tx);
        writer_task
            .await
            .map_err(|e| HuddleError::Protocol(format!("writer task failed: {}", e)))??;

        info!("MCP server '{}' stopped", self.name);
        Ok(())
    }

    /// Handle a request other than `tools/call`.
    fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => {
                let result = ToolsListResult {
                    tools: self.dispatcher.registry().definitions(),
                };
                JsonRpcResponse::from_serializable(request.id, &result)
            }
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        if let Some(params) = params
            .and_then(|p| serde_json::from_value::<InitializeParams>(p).ok())
        {
            info!(
                "Client {} {} connected (protocol {})",
                params.client_info.name, params.client_info.version, params.protocol_version
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: Implementation {
                name: self.name.clone(),
                version: SERVER_VERSION.to_string(),
            },
        };

        JsonRpcResponse::from_serializable(id, &result)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle_notification(&self, request: JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => debug!("Client finished initialization"),
            "notifications/cancelled" => {
                let Some(params) = request
                    .params
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
                else {
                    warn!("Ignoring malformed cancellation notice");
                    return;
                };
                let key = params.request_id.to_string();
                let token = self.lock_in_flight().remove(&key);
                match token {
                    Some(token) => {
                        info!(
                            "Cancelling request {} ({})",
                            key,
                            params.reason.as_deref().unwrap_or("no reason given")
                        );
                        token.cancel();
                    }
                    None => debug!("Cancellation for unknown or finished request {}", key),
                }
            }
            other => debug!("Ignoring notification {}", other),
        }
    }
}

/// Run one `tools/call`. Returns `None` when the call was cancelled, since
/// cancelled requests get no reply.
async fn handle_tools_call(
    dispatcher: Dispatcher<Value>,
    id: Option<Value>,
    params: Option<Value>,
    token: &CancellationToken,
) -> Option<JsonRpcResponse> {
    let params: ToolCallParams = match params.map(serde_json::from_value) {
        Some(Ok(params)) => params,
        Some(Err(e)) => {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                &format!("Invalid params: {}", e),
            ))
        }
        None => return Some(JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params")),
    };

    let mut extra = params.meta.unwrap_or_default();
    let deps = extra.remove(DEPS_KEY).unwrap_or(Value::Null);
    let meta = Metadata::with_extra(Arc::new(deps), extra);

    let result = dispatcher
        .dispatch_with_metadata_cancellable(
            &params.name,
            params.arguments.unwrap_or_default(),
            meta,
            token,
        )
        .await;

    match result {
        Ok(value) => Some(JsonRpcResponse::from_serializable(
            id,
            &ToolCallResult::from_value(value),
        )),
        Err(HuddleError::Cancelled(_)) => None,
        Err(HuddleError::ToolNotFound(name)) => Some(JsonRpcResponse::error(
            id,
            INVALID_PARAMS,
            &format!("{}{}", UNKNOWN_TOOL_PREFIX, name),
        )),
        Err(e) => {
            warn!("Tool '{}' failed: {}", params.name, e);
            Some(JsonRpcResponse::from_serializable(
                id,
                &ToolCallResult::failure(&e),
            ))
        }
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Arguments, Tool};
    use crate::toolsets::EchoDeps;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Stall;

    #[async_trait]
    impl Tool<Value> for Stall {
        fn name(&self) -> &str {
            "stall"
        }

        fn description(&self) -> &str {
            "never finishes"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn call(&self, _args: Arguments, _meta: &Metadata<Value>) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool<Value> for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "fails"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn call(&self, _args: Arguments, _meta: &Metadata<Value>) -> Result<Value> {
            Err(HuddleError::Upstream("provider returned 500".to_string()))
        }
    }

    fn server() -> McpServer {
        let mut registry: ToolRegistry<Value> = ToolRegistry::new();
        registry.register(Arc::new(EchoDeps));
        registry.register(Arc::new(Stall));
        registry.register(Arc::new(Broken));
        McpServer::new("test", Arc::new(registry))
    }

    /// Feed `input` lines to a fresh server and collect every response line.
    async fn exchange(input: &[Value]) -> Vec<Value> {
        let mut text = String::new();
        for value in input {
            text.push_str(&value.to_string());
            text.push('\n');
        }

        let (out_writer, out_reader) = tokio::io::duplex(64 * 1024);
        server()
            .serve(BufReader::new(text.as_bytes()), out_writer)
            .await
            .unwrap();

        let mut lines = BufReader::new(out_reader).lines();
        let mut responses = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            responses.push(serde_json::from_str(&line).unwrap());
        }
        responses
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let responses = exchange(&[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ])
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "test");
        let names: Vec<&str> = responses[1]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["broken", "echo_deps", "stall"]);
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let line = json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "echo_deps", "arguments": {}, "_meta": {"deps": "abc"}}
        })
        .to_string();
        let (head, tail) = line.split_at(line.len() / 2);

        let reader = tokio_test::io::Builder::new()
            .read(head.as_bytes())
            .read(tail.as_bytes())
            .read(b"\n")
            .build();

        let (out_writer, out_reader) = tokio::io::duplex(64 * 1024);
        server()
            .serve(BufReader::new(reader), out_writer)
            .await
            .unwrap();

        let mut lines = BufReader::new(out_reader).lines();
        let response: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response["id"], 3);
        assert_eq!(response["result"]["structuredContent"]["deps"], "abc");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_call_forwards_meta_deps() {
        let responses = exchange(&[json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": {"name": "echo_deps", "arguments": {}, "_meta": {"deps": 42}}
        })])
        .await;

        assert_eq!(responses[0]["id"], 7);
        assert_eq!(
            responses[0]["result"]["structuredContent"],
            json!({"echo": "This is an echo message", "deps": 42})
        );
    }

    #[tokio::test]
    async fn test_missing_meta_means_null_deps() {
        let responses = exchange(&[json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "echo_deps"}
        })])
        .await;

        assert_eq!(responses[0]["result"]["structuredContent"]["deps"], Value::Null);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_protocol_error() {
        let responses = exchange(&[json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "unknown_tool"}
        })])
        .await;

        assert_eq!(responses[0]["error"]["code"], INVALID_PARAMS);
        assert_eq!(responses[0]["error"]["message"], "Unknown tool: unknown_tool");
    }

    #[tokio::test]
    async fn test_tool_failure_is_flagged() {
        let responses = exchange(&[json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": {"name": "broken"}
        })])
        .await;

        assert_eq!(responses[0]["result"]["isError"], true);
        assert!(responses[0]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("provider returned 500"));
    }

    #[tokio::test]
    async fn test_cancelled_call_gets_no_reply() {
        let (mut client_writer, server_reader) = tokio::io::duplex(64 * 1024);
        let (server_writer, client_reader) = tokio::io::duplex(64 * 1024);
        let handle = tokio::spawn(server().serve(BufReader::new(server_reader), server_writer));

        let stall = json!({"jsonrpc": "2.0", "id": 10, "method": "tools/call", "params": {"name": "stall"}});
        let ping = json!({"jsonrpc": "2.0", "id": 11, "method": "ping"});
        client_writer
            .write_all(format!("{}\n{}\n", stall, ping).as_bytes())
            .await
            .unwrap();

        let mut lines = BufReader::new(client_reader).lines();
        let first: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["id"], 11, "ping must not wait behind the stalled call");

        let cancel = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {"requestId": 10}});
        client_writer
            .write_all(format!("{}\n", cancel).as_bytes())
            .await
            .unwrap();
        drop(client_writer);

        handle.await.unwrap().unwrap();
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reused_request_id_is_rejected_while_in_flight() {
        let (mut client_writer, server_reader) = tokio::io::duplex(64 * 1024);
        let (server_writer, client_reader) = tokio::io::duplex(64 * 1024);
        let handle = tokio::spawn(server().serve(BufReader::new(server_reader), server_writer));

        let stall = json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "stall"}});
        let again = json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "echo_deps"}});
        client_writer
            .write_all(format!("{}\n{}\n", stall, again).as_bytes())
            .await
            .unwrap();

        let mut lines = BufReader::new(client_reader).lines();
        let rejected: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(rejected["id"], 5);
        assert_eq!(rejected["error"]["code"], INVALID_REQUEST);

        // The first call still owns id 5 and can be cancelled.
        let cancel = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {"requestId": 5}});
        client_writer
            .write_all(format!("{}\n", cancel).as_bytes())
            .await
            .unwrap();
        drop(client_writer);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("stalled call was not cancelled")
            .unwrap()
            .unwrap();
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_line_yields_parse_error() {
        let (out_writer, out_reader) = tokio::io::duplex(1024);
        server()
            .serve(BufReader::new("not json\n".as_bytes()), out_writer)
            .await
            .unwrap();

        let mut lines = BufReader::new(out_reader).lines();
        let response: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response["error"]["code"], PARSE_ERROR);
    }
}
