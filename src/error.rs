//! Error types for Huddle.

use thiserror::Error;

/// Library-level error type for Huddle operations.
///
/// Tools and the dispatcher share this type so a tool's failure reaches the
/// caller as the very same value it was raised with.
#[derive(Error, Debug)]
pub enum HuddleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Upstream call failed: {0}")]
    Upstream(String),

    #[error("Invocation of '{0}' was cancelled")]
    Cancelled(String),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for Huddle operations.
pub type Result<T> = std::result::Result<T, HuddleError>;

impl HuddleError {
    /// Kind name and bare message, as sent in a failed `tools/call` result.
    ///
    /// Kinds wrapping foreign errors have no counterpart on the other side
    /// and travel as `upstream` with their full message.
    pub fn wire_parts(&self) -> (&'static str, String) {
        match self {
            Self::Config(m) => ("config", m.clone()),
            Self::ToolNotFound(m) => ("tool_not_found", m.clone()),
            Self::InvalidArguments(m) => ("invalid_arguments", m.clone()),
            Self::Upstream(m) => ("upstream", m.clone()),
            Self::Cancelled(m) => ("cancelled", m.clone()),
            Self::Protocol(m) => ("protocol", m.clone()),
            Self::Embedding(m) => ("embedding", m.clone()),
            Self::DocumentStore(m) => ("document_store", m.clone()),
            Self::OpenAI(m) => ("openai", m.clone()),
            Self::Agent(m) => ("agent", m.clone()),
            other => ("upstream", other.to_string()),
        }
    }

    /// Rebuild an error from [`HuddleError::wire_parts`]. Unknown kinds become `Upstream`.
    pub fn from_wire_parts(kind: &str, message: String) -> Self {
        match kind {
            "config" => Self::Config(message),
            "tool_not_found" => Self::ToolNotFound(message),
            "invalid_arguments" => Self::InvalidArguments(message),
            "cancelled" => Self::Cancelled(message),
            "protocol" => Self::Protocol(message),
            "embedding" => Self::Embedding(message),
            "document_store" => Self::DocumentStore(message),
            "openai" => Self::OpenAI(message),
            "agent" => Self::Agent(message),
            _ => Self::Upstream(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_parts_round_trip() {
        let err = HuddleError::InvalidArguments("missing field `league_id`".into());
        let (kind, message) = err.wire_parts();
        assert_eq!(kind, "invalid_arguments");

        let back = HuddleError::from_wire_parts(kind, message);
        assert_eq!(back.to_string(), err.to_string());
    }

    #[test]
    fn test_foreign_errors_travel_as_upstream() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = HuddleError::from(json_err);
        let (kind, message) = err.wire_parts();

        assert_eq!(kind, "upstream");
        assert!(message.starts_with("JSON error:"));
        assert!(matches!(
            HuddleError::from_wire_parts("something_new", "x".into()),
            HuddleError::Upstream(m) if m == "x"
        ));
    }
}
