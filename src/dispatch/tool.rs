//! The tool interface shared by local and remote tools.

use super::Metadata;
use crate::error::{HuddleError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named tool arguments.
pub type Arguments = Map<String, Value>;

/// A named, independently invocable unit of functionality.
///
/// `D` is the session context type. Tools that do not care about it
/// implement `Tool<D>` for every `D`.
#[async_trait]
pub trait Tool<D: Send + Sync + 'static>: Send + Sync {
    /// Tool name, unique within its toolset.
    fn name(&self) -> &str;

    /// Human/LLM readable description.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn input_schema(&self) -> Value;

    /// Run the tool.
    async fn call(&self, args: Arguments, meta: &Metadata<D>) -> Result<Value>;
}

/// Advertised shape of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Deserialize an arguments map into a typed parameter struct.
pub fn parse_arguments<T: DeserializeOwned>(args: Arguments) -> Result<T> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| HuddleError::InvalidArguments(e.to_string()))
}

/// Render a tool result as text for an LLM or a text-only transport.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct LeagueParams {
        league_id: String,
        #[serde(default)]
        week: Option<u32>,
    }

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_arguments() {
        let params: LeagueParams = parse_arguments(args(json!({ "league_id": "99", "week": 3 }))).unwrap();
        assert_eq!(params.league_id, "99");
        assert_eq!(params.week, Some(3));
    }

    #[test]
    fn test_parse_arguments_reports_missing_field() {
        let err = parse_arguments::<LeagueParams>(Arguments::new()).unwrap_err();
        assert!(matches!(err, HuddleError::InvalidArguments(msg) if msg.contains("league_id")));
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!({ "a": 1 })), r#"{"a":1}"#);
    }

    #[test]
    fn test_definition_defaults_schema() {
        let def: ToolDefinition = serde_json::from_value(json!({ "name": "ping" })).unwrap();
        assert_eq!(def.input_schema["type"], "object");
        assert!(def.description.is_empty());
    }
}
