//! MCP protocol types (JSON-RPC 2.0).

use crate::dispatch::ToolDefinition;
use crate::error::HuddleError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INVALID_REQUEST: i32 = -32600;
pub const INTERNAL_ERROR: i32 = -32603;

/// Prefix of the error message sent for an unregistered tool.
pub const UNKNOWN_TOOL_PREFIX: &str = "Unknown tool: ";

/// JSON-RPC request or notification (no `id`).
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Option<Value>, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }

    /// Serialize `result` into a success response.
    pub fn from_serializable<T: Serialize>(id: Option<Value>, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, INTERNAL_ERROR, &e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any line read off an MCP transport by the client side.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// MCP Initialize request params.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: Implementation,
}

/// Name and version of either peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// MCP Initialize response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

/// Tools list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

/// Tool call request params.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// Tool call response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// `Some(Value::Null)` when the field is present and null.
    #[serde(
        rename = "structuredContent",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

impl ToolCallResult {
    pub fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: None,
            structured_content: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            content: vec![ToolContent::Text { text: message }],
            is_error: Some(true),
            structured_content: None,
        }
    }

    /// A failed call. The text is for any client; `structuredContent`
    /// carries the error kind so huddle clients can rebuild it.
    pub fn failure(err: &HuddleError) -> Self {
        let (kind, message) = err.wire_parts();
        Self {
            structured_content: Some(json!({ "kind": kind, "message": message })),
            ..Self::error(err.to_string())
        }
    }

    /// The error a failed result stands for.
    pub fn to_error(&self) -> HuddleError {
        let parts = self.structured_content.as_ref().and_then(|v| {
            Some((v.get("kind")?.as_str()?, v.get("message")?.as_str()?))
        });
        match parts {
            Some((kind, message)) => HuddleError::from_wire_parts(kind, message.to_string()),
            None => HuddleError::Upstream(self.joined_text()),
        }
    }

    /// Wrap a tool's return value. Strings travel as plain text; anything
    /// else is sent both as JSON text and as structured content.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::text(text),
            other => Self {
                content: vec![ToolContent::Text {
                    text: other.to_string(),
                }],
                is_error: None,
                structured_content: Some(other),
            },
        }
    }

    /// Concatenated text blocks.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                ToolContent::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `notifications/cancelled` params.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_params_read_meta() {
        let params: ToolCallParams = serde_json::from_value(json!({
            "name": "deps_echo_deps",
            "arguments": {},
            "_meta": { "deps": 42 }
        }))
        .unwrap();

        assert_eq!(params.name, "deps_echo_deps");
        assert_eq!(params.meta.unwrap()["deps"], 42);
    }

    #[test]
    fn test_structured_result_keeps_value() {
        let result = ToolCallResult::from_value(json!({ "echo": "hi", "deps": 1 }));
        let wire = serde_json::to_value(&result).unwrap();

        assert_eq!(wire["structuredContent"]["deps"], 1);
        assert_eq!(wire["content"][0]["type"], "text");
        assert!(wire.get("isError").is_none());
    }

    #[test]
    fn test_null_structured_content_is_kept() {
        let wire = serde_json::to_value(ToolCallResult::from_value(Value::Null)).unwrap();
        assert_eq!(wire["structuredContent"], Value::Null);

        let back: ToolCallResult = serde_json::from_value(wire).unwrap();
        assert_eq!(back.structured_content, Some(Value::Null));

        let plain: ToolCallResult =
            serde_json::from_value(json!({ "content": [{ "type": "text", "text": "hi" }] })).unwrap();
        assert_eq!(plain.structured_content, None);
    }

    #[test]
    fn test_failure_carries_error_kind() {
        let result = ToolCallResult::failure(&HuddleError::Upstream("503".into()));
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["isError"], true);
        assert_eq!(wire["content"][0]["text"], "Upstream call failed: 503");

        let back: ToolCallResult = serde_json::from_value(wire).unwrap();
        assert!(matches!(back.to_error(), HuddleError::Upstream(m) if m == "503"));

        // Servers that only send text still produce an error.
        let foreign = ToolCallResult::error("boom".into());
        assert!(matches!(foreign.to_error(), HuddleError::Upstream(m) if m == "boom"));
    }

    #[test]
    fn test_unknown_content_types_are_tolerated() {
        let result: ToolCallResult = serde_json::from_value(json!({
            "content": [
                { "type": "image", "data": "...", "mimeType": "image/png" },
                { "type": "text", "text": "caption" }
            ]
        }))
        .unwrap();

        assert_eq!(result.joined_text(), "caption");
    }

    #[test]
    fn test_notification_has_no_id() {
        let request = JsonRpcRequest::new(None, "notifications/initialized", None);
        assert!(request.is_notification());
        let wire = serde_json::to_string(&request).unwrap();
        assert!(!wire.contains("\"id\""));
    }
}
