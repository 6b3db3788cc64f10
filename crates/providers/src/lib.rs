//! LLM Provider implementations for RelayClaw.
//!
//! All providers implement the `relayclaw_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use relayclaw_config::ProviderConfig;
use relayclaw_core::Provider;
use relayclaw_core::error::ProviderError;
use std::sync::Arc;

/// Build the configured provider.
///
/// Every supported backend speaks the chat-completions protocol, so the
/// provider name only labels logs. A key is required unless the endpoint is
/// on the local machine.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = match (&config.api_key, is_local(&config.base_url)) {
        (Some(key), _) => key.clone(),
        (None, true) => String::new(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(
                "no API key; set provider.api_key, RELAYCLAW_API_KEY or OPENAI_API_KEY".into(),
            ));
        }
    };

    let provider = OpenAiCompatProvider::new(&config.name, &config.base_url, api_key)?;
    Ok(Arc::new(provider))
}

fn is_local(base_url: &str) -> bool {
    base_url.contains("://localhost") || base_url.contains("://127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_endpoint_requires_key() {
        let config = ProviderConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn local_endpoint_needs_no_key() {
        let config = ProviderConfig {
            name: "ollama".into(),
            base_url: "http://localhost:11434/v1".into(),
            ..ProviderConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn configured_key_builds_provider() {
        let config = ProviderConfig {
            api_key: Some("sk-test".into()),
            ..ProviderConfig::default()
        };
        assert_eq!(build_from_config(&config).unwrap().name(), "openai");
    }
}
