//! LLM Provider implementations for Glossa.
//!
//! All providers implement the `glossa_core::Provider` trait.
//! [`build_from_config`] constructs the configured default provider.

pub mod openai_compat;

pub use openai_compat::{OpenAiCompatProvider, SseDecoder};

use glossa_config::AppConfig;
use glossa_core::{Provider, ProviderError};
use std::sync::Arc;

/// Build the default provider from configuration.
///
/// Base URL precedence: top-level `base_url`, then the provider's own
/// `api_url`, then the well-known URL for its name.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let base_url = config
        .base_url
        .clone()
        .or_else(|| provider_config.and_then(|p| p.api_url.clone()))
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no base URL known for provider '{name}', set base_url or [providers.{name}] api_url"
            ))
        })?;

    let api_key = match config.api_key_for(name) {
        Some(key) => key.to_string(),
        None if is_local(name) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}', set api_key or GLOSSA_API_KEY"
            )));
        }
    };

    tracing::debug!(provider = name, base_url = %base_url, "Building provider");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "deepseek" => "https://api.deepseek.com/v1",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.into())
}

/// Local servers accept any key.
fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}
