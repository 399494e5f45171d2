//! OpenAI and Azure OpenAI client construction.

use crate::error::{HuddleError, Result};
use async_openai::config::{AzureConfig, OpenAIConfig};
use async_openai::Client;
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HuddleError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// OpenAI client reading `OPENAI_API_KEY` from the environment.
pub fn create_client(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client(timeout)?))
}

/// Azure OpenAI client for one deployment.
///
/// Endpoint, key and API version come from `AZURE_OPENAI_ENDPOINT`,
/// `AZURE_OPENAI_API_KEY` and `AZURE_OPENAI_API_VERSION`.
pub fn create_azure_client(deployment: &str, timeout: Duration) -> Result<Client<AzureConfig>> {
    let config = AzureConfig::new()
        .with_api_base(required_env("AZURE_OPENAI_ENDPOINT")?)
        .with_api_key(required_env("AZURE_OPENAI_API_KEY")?)
        .with_api_version(required_env("AZURE_OPENAI_API_VERSION")?)
        .with_deployment_id(deployment);

    Ok(Client::with_config(config).with_http_client(http_client(timeout)?))
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HuddleError::Config(format!("{} is not set", name)))
}
