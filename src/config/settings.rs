//! Configuration settings for Huddle.

use crate::error::{HuddleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub sleeper: SleeperSettings,
    pub espn: EspnSettings,
    pub documents: DocumentSettings,
    pub embedding: EmbeddingSettings,
    pub api: ApiSettings,
    /// External MCP servers whose tools join the registry.
    pub servers: Vec<McpServerSettings>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.huddle".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Chat model provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Azure,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "azure" | "azure-openai" => Ok(LlmProvider::Azure),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::Azure => write!(f, "azure"),
        }
    }
}

/// Agent model settings. Azure endpoint, key and API version come from the
/// `AZURE_OPENAI_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Model name, or the deployment name on Azure.
    pub model: String,
    pub system_prompt: String,
    /// Upper bound on model turns per run.
    pub max_iterations: usize,
    /// HTTP timeout for model requests.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: "gpt-4.1".to_string(),
            system_prompt: "You are a helpful assistant".to_string(),
            max_iterations: 15,
            timeout_secs: 300,
        }
    }
}

/// Sleeper fantasy API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SleeperSettings {
    pub base_url: String,
    /// League used when a tool call omits `league_id`.
    pub league_id: String,
    /// Season used when a tool call omits `season`.
    pub season: String,
    pub timeout_secs: u64,
}

impl Default for SleeperSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.sleeper.app/v1".to_string(),
            league_id: "1182861335834730496".to_string(),
            season: "2024".to_string(),
            timeout_secs: 30,
        }
    }
}

/// ESPN fantasy API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EspnSettings {
    pub base_url: String,
    pub league_id: u64,
    pub season: u32,
    /// `espn_s2` cookie. `ESPN_S2` overrides it.
    pub espn_s2: Option<String>,
    /// `SWID` cookie. `ESPN_SWID` overrides it.
    pub swid: Option<String>,
    /// File holding a browser cookie string, read when the cookies above are unset.
    pub cookie_file: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EspnSettings {
    fn default() -> Self {
        Self {
            base_url: "https://lm-api-reads.fantasy.espn.com/apis/v3/games/ffl/seasons"
                .to_string(),
            league_id: 747820582,
            season: 2025,
            espn_s2: None,
            swid: None,
            cookie_file: None,
            timeout_secs: 30,
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Store backend (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Collection the `retrieve` tool searches.
    pub collection: String,
    /// Documents returned per query.
    pub max_results: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.huddle/documents.db".to_string(),
            collection: "policies".to_string(),
            max_results: 5,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Chat API settings, for both `serve` and `chat --api`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    /// Timeout used by the chat front-end when posting to the API.
    pub client_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            client_timeout_secs: 30,
        }
    }
}

/// An MCP server started over stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSettings {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_server_timeout")]
    pub timeout_secs: u64,
    /// Tools are registered as `{tool_prefix}_{name}` when set.
    #[serde(default)]
    pub tool_prefix: Option<String>,
    /// Send the session context in `_meta.deps` on every call.
    #[serde(default = "default_forward_deps")]
    pub forward_deps: bool,
}

fn default_server_timeout() -> u64 {
    10
}

fn default_forward_deps() -> bool {
    true
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HuddleError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("huddle")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.documents.sqlite_path)
    }

    /// Set one value by dotted key, e.g. `llm.model` or `espn.league_id`.
    ///
    /// The value is parsed as TOML when possible so numbers and booleans keep
    /// their type, and taken as a plain string otherwise.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| HuddleError::Config(format!("Expected section.key, got '{}'", key)))?;

        let mut tree = toml::Value::try_from(&*self)
            .map_err(|e| HuddleError::Config(e.to_string()))?;
        let table = tree
            .get_mut(section)
            .and_then(toml::Value::as_table_mut)
            .ok_or_else(|| HuddleError::Config(format!("Unknown section '{}'", section)))?;

        let parsed = toml::from_str::<toml::Table>(&format!("v = {}", value))
            .ok()
            .and_then(|mut t| t.remove("v"))
            .unwrap_or_else(|| toml::Value::String(value.to_string()));
        table.insert(field.to_string(), parsed);

        *self = tree
            .try_into()
            .map_err(|e: toml::de::Error| HuddleError::Config(format!("{}: {}", key, e)))?;
        Ok(())
    }
}
