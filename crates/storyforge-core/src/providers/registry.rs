//! Provider registry: which adapter serves which [`ModelType`]

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::error::{ProviderError, Result};
use crate::types::ModelType;

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::openai::OpenAiProvider;
use super::openai_compat::OpenAiCompatProvider;
use super::types::ProviderAdapter;

enum ProviderSlot {
    Ready(Arc<dyn ProviderAdapter>),
    /// Known provider without a configured credential
    Disabled { env_var: &'static str },
}

/// Availability of a provider in a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Enabled,
    Disabled,
    Unsupported,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapters keyed by provider.
///
/// A provider may be registered (ready), known but disabled for lack of a
/// credential, or absent altogether.
#[derive(Default)]
pub struct ProviderRegistry {
    slots: HashMap<ModelType, ProviderSlot>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for ty in ModelType::ALL {
            if self.slots.contains_key(&ty) {
                map.entry(&ty.as_str(), &self.status(ty).as_str());
            }
        }
        map.finish()
    }
}

impl ProviderRegistry {
    /// Empty registry: every provider is unsupported
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, provider: ModelType, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.slots.insert(provider, ProviderSlot::Ready(adapter));
        self
    }

    pub fn with_disabled(mut self, provider: ModelType) -> Self {
        self.slots.insert(
            provider,
            ProviderSlot::Disabled {
                env_var: provider.credential_env_var(),
            },
        );
        self
    }

    /// Build an adapter for every provider whose credential is configured.
    ///
    /// The rest are registered as disabled so calls fail with a missing
    /// credential before any network traffic.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let mut registry = Self::new();

        for provider in ModelType::ALL {
            let section = config.providers.get(provider);
            let base_url = section.base_url.clone();

            let adapter: Option<Arc<dyn ProviderAdapter>> = match provider {
                ModelType::OpenAi => section
                    .api_key()
                    .map(|key| OpenAiProvider::new(key.to_string(), base_url))
                    .transpose()?
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
                ModelType::Anthropic => section
                    .api_key()
                    .map(|key| AnthropicProvider::new(key.to_string(), base_url))
                    .transpose()?
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
                ModelType::Gemini => section
                    .api_key()
                    .map(|key| GoogleProvider::new(key.to_string(), base_url))
                    .transpose()?
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
                ModelType::Mistral => section
                    .api_key()
                    .map(|key| OpenAiCompatProvider::mistral(key.to_string(), base_url))
                    .transpose()?
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
                ModelType::Ollama => base_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(OpenAiCompatProvider::ollama)
                    .transpose()?
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
            };

            registry = match adapter {
                Some(adapter) => {
                    debug!("Registered {} adapter", provider);
                    registry.with_adapter(provider, adapter)
                }
                None => registry.with_disabled(provider),
            };
        }

        let enabled = registry.enabled_providers();
        info!(
            "Provider registry ready: {} enabled ({})",
            enabled.len(),
            enabled
                .iter()
                .map(ModelType::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(registry)
    }

    /// Adapter for `provider`, or the reason it cannot serve calls
    pub fn get(&self, provider: ModelType) -> std::result::Result<Arc<dyn ProviderAdapter>, ProviderError> {
        match self.slots.get(&provider) {
            Some(ProviderSlot::Ready(adapter)) => Ok(Arc::clone(adapter)),
            Some(ProviderSlot::Disabled { env_var }) => Err(ProviderError::MissingCredential {
                provider,
                env_var: *env_var,
            }),
            None => Err(ProviderError::Unsupported(provider)),
        }
    }

    pub fn status(&self, provider: ModelType) -> ProviderStatus {
        match self.slots.get(&provider) {
            Some(ProviderSlot::Ready(_)) => ProviderStatus::Enabled,
            Some(ProviderSlot::Disabled { .. }) => ProviderStatus::Disabled,
            None => ProviderStatus::Unsupported,
        }
    }

    pub fn enabled_providers(&self) -> Vec<ModelType> {
        ModelType::ALL
            .into_iter()
            .filter(|ty| self.status(*ty) == ProviderStatus::Enabled)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_enables_only_configured() {
        let mut config = AiConfig::default();
        config.providers.openai.api_key = "sk-test".to_string();
        config.providers.ollama.base_url = Some("http://localhost:11434".to_string());

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.enabled_providers(),
            vec![ModelType::OpenAi, ModelType::Ollama]
        );
        assert_eq!(registry.status(ModelType::Anthropic), ProviderStatus::Disabled);
        assert_eq!(
            registry.get(ModelType::OpenAi).unwrap().provider_name(),
            "openai"
        );
    }

    #[test]
    fn test_disabled_provider_reports_env_var() {
        let registry = ProviderRegistry::from_config(&AiConfig::default()).unwrap();
        match registry.get(ModelType::Anthropic) {
            Err(ProviderError::MissingCredential { provider, env_var }) => {
                assert_eq!(provider, ModelType::Anthropic);
                assert_eq!(env_var, "ANTHROPIC_API_KEY");
            }
            other => panic!("expected missing credential, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_registry_is_unsupported() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.status(ModelType::Gemini), ProviderStatus::Unsupported);
        assert!(matches!(
            registry.get(ModelType::Gemini),
            Err(ProviderError::Unsupported(ModelType::Gemini))
        ));
        assert!(registry.enabled_providers().is_empty());
    }

    #[test]
    fn test_blank_ollama_url_stays_disabled() {
        let mut config = AiConfig::default();
        config.providers.ollama.base_url = Some("  ".to_string());
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.status(ModelType::Ollama), ProviderStatus::Disabled);
    }

    #[test]
    fn test_registry_debug_lists_status() {
        let registry = ProviderRegistry::new().with_disabled(ModelType::Mistral);
        assert_eq!(format!("{:?}", registry), "{\"mistral\": \"disabled\"}");
    }
}
