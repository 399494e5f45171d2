//! Configuration module for Huddle.

mod settings;

pub use settings::{
    ApiSettings, DocumentSettings, EmbeddingSettings, EspnSettings, GeneralSettings,
    LlmProvider, LlmSettings, McpServerSettings, Settings, SleeperSettings,
};
