//! Builds the configured completion client.

use std::sync::Arc;
use std::time::Duration;

use ecobot_core::config::{ProviderConfig, ProviderKind};

use crate::completion::CompletionClient;
use crate::error::ChatError;
use crate::gemini::GeminiClient;
use crate::mock::MockCompletionClient;
use crate::openrouter::OpenRouterClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a client for `[provider]`.
///
/// Remote providers need an API key, from the config or the provider's
/// environment variable.
pub fn build_client(config: &ProviderConfig) -> Result<Arc<dyn CompletionClient>, ChatError> {
    let base_url = config.effective_base_url();

    let client: Arc<dyn CompletionClient> = match config.kind {
        ProviderKind::Mock => Arc::new(MockCompletionClient::new()),
        ProviderKind::OpenRouter => {
            let api_key = require_key(config)?;
            Arc::new(OpenRouterClient::new(
                http_client()?,
                &base_url,
                &api_key,
                &config.site_url,
                &config.site_name,
            ))
        }
        ProviderKind::Gemini => {
            let api_key = require_key(config)?;
            Arc::new(GeminiClient::new(http_client()?, &base_url, &api_key))
        }
    };

    tracing::info!(
        provider = client.name(),
        model = %config.effective_model(),
        base_url = %base_url,
        stream = config.stream,
        "Completion client ready"
    );
    Ok(client)
}

fn require_key(config: &ProviderConfig) -> Result<String, ChatError> {
    config.resolve_api_key().ok_or_else(|| {
        let env = config.kind.api_key_env().unwrap_or("the provider's API key variable");
        ChatError::Config(format!(
            "no API key configured: set provider.api_key or {}",
            env
        ))
    })
}

fn http_client() -> Result<reqwest::Client, ChatError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("ecobot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {}", e)))
}
