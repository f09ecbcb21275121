//! Gateway selection: builds the configured gateway from `AppConfig`.

use std::sync::Arc;
use std::time::Duration;

use toolchat_config::AppConfig;
use toolchat_core::error::GatewayError;
use toolchat_core::gateway::ModelGateway;
use tracing::debug;

use crate::openai_compat::OpenAiCompatGateway;
use crate::retry::RetryingGateway;

/// Build the gateway described by `config`.
///
/// The base URL comes from `api_url` when set, otherwise from the provider's
/// well-known endpoint. A retry wrapper is added when `gateway.max_retries`
/// is above zero.
pub fn build_gateway(config: &AppConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    let provider = config.provider.as_str();

    let base_url = match (&config.api_url, default_base_url(provider)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(GatewayError::NotConfigured(format!(
                "unknown provider '{provider}'; set api_url to use a custom endpoint"
            )));
        }
    };

    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        // Ollama doesn't need a real key
        None if provider == "ollama" => "ollama".to_string(),
        None => {
            return Err(GatewayError::NotConfigured(format!(
                "no API key for provider '{provider}'; set TOOLCHAT_API_KEY or api_key in the config file"
            )));
        }
    };

    debug!(provider, base_url = %base_url, "Building model gateway");

    let gateway: Arc<dyn ModelGateway> = Arc::new(
        OpenAiCompatGateway::new(provider, base_url, api_key)
            .with_timeout(Duration::from_secs(config.gateway.timeout_secs)),
    );

    if config.gateway.max_retries == 0 {
        return Ok(gateway);
    }

    Ok(Arc::new(RetryingGateway::new(
        gateway,
        config.gateway.max_retries,
        Duration::from_millis(config.gateway.retry_backoff_ms),
    )))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}
