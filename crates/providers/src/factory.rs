//! Builds the configured provider.

use std::sync::Arc;

use fbot_config::AppConfig;
use fbot_core::provider::Provider;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the default provider from configuration.
///
/// A `providers.<name>` table overrides the URL and key for that provider;
/// otherwise the well-known base URL and the top-level `api_key` are used.
/// A `custom:<url>` provider name points at an arbitrary compatible endpoint.
pub fn build_provider(config: &AppConfig) -> Arc<dyn Provider> {
    let name = config.default_provider.as_str();
    let overrides = config.providers.get(name);

    let api_key = overrides
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let (label, base_url) = match name.strip_prefix("custom:") {
        Some(url) => ("custom", url.to_string()),
        None => (
            name,
            overrides
                .and_then(|p| p.api_url.clone())
                .unwrap_or_else(|| default_base_url(name)),
        ),
    };

    info!(provider = %label, base_url = %base_url, "Provider configured");
    Arc::new(OpenAiCompatProvider::new(label, base_url, api_key))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbot_config::ProviderConfig;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let provider = build_provider(&AppConfig::default());
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn provider_table_and_custom_urls() {
        let mut config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_url: Some("http://gpu-box:11434/v1".into()),
                ..Default::default()
            },
        );
        assert_eq!(build_provider(&config).name(), "ollama");

        config.default_provider = "custom:http://localhost:9000/v1".into();
        assert_eq!(build_provider(&config).name(), "custom");
    }
}
