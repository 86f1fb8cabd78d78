//! Provider credentials and orchestration defaults

use serde::{Deserialize, Serialize};

use crate::resolver::ResolverConfig;
use crate::types::ModelType;

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Applied when a request carries no `timeoutMs`
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Applied when a request carries no `maxTokens`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            resolver: ResolverConfig::default(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            default_max_tokens: None,
        }
    }
}

impl AiConfig {
    /// Defaults with every credential taken from the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Fill credentials the config leaves blank from `lookup`.
    ///
    /// Explicit values always win over the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for provider in [ModelType::OpenAi, ModelType::Anthropic, ModelType::Mistral] {
            let section = self.providers.get_mut(provider);
            if section.api_key.trim().is_empty()
                && let Some(key) = read(provider.credential_env_var())
            {
                section.api_key = key;
            }
        }

        let gemini = &mut self.providers.gemini;
        if gemini.api_key.trim().is_empty()
            && let Some(key) =
                read(ModelType::Gemini.credential_env_var()).or_else(|| read("GOOGLE_AI_API_KEY"))
        {
            gemini.api_key = key;
        }

        let ollama = &mut self.providers.ollama;
        if ollama.base_url.is_none() {
            ollama.base_url = read(ModelType::Ollama.credential_env_var());
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub mistral: ProviderConfig,
    /// Needs no key; enabled only when `base_url` is set
    #[serde(default)]
    pub ollama: ProviderConfig,
}

impl ProvidersConfig {
    /// Copy with every key masked
    pub fn masked(&self) -> Self {
        Self {
            openai: self.openai.masked(),
            anthropic: self.anthropic.masked(),
            gemini: self.gemini.masked(),
            mistral: self.mistral.masked(),
            ollama: self.ollama.masked(),
        }
    }

    pub fn get(&self, provider: ModelType) -> &ProviderConfig {
        match provider {
            ModelType::OpenAi => &self.openai,
            ModelType::Anthropic => &self.anthropic,
            ModelType::Gemini => &self.gemini,
            ModelType::Mistral => &self.mistral,
            ModelType::Ollama => &self.ollama,
        }
    }

    pub fn get_mut(&mut self, provider: ModelType) -> &mut ProviderConfig {
        match provider {
            ModelType::OpenAi => &mut self.openai,
            ModelType::Anthropic => &mut self.anthropic,
            ModelType::Gemini => &mut self.gemini,
            ModelType::Mistral => &mut self.mistral,
            ModelType::Ollama => &mut self.ollama,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Overrides the vendor's public endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.trim()).filter(|k| !k.is_empty())
    }

    /// Copy safe to print: the key is replaced by its masked form
    pub fn masked(&self) -> Self {
        Self {
            api_key: if self.api_key.is_empty() {
                String::new()
            } else {
                mask_secret(&self.api_key)
            },
            base_url: self.base_url.clone(),
        }
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_apply_env_fills_blank_keys() {
        let vars = env(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("GOOGLE_AI_API_KEY", "AIza-google"),
            ("OLLAMA_BASE_URL", "http://localhost:11434"),
            ("MISTRAL_API_KEY", "   "),
        ]);
        let mut config = AiConfig::default();
        config.apply_env(|name| vars.get(name).cloned());

        assert_eq!(config.providers.openai.api_key(), Some("sk-openai"));
        assert_eq!(config.providers.gemini.api_key(), Some("AIza-google"));
        assert_eq!(config.providers.anthropic.api_key(), None);
        assert_eq!(config.providers.mistral.api_key(), None);
        assert_eq!(
            config.providers.ollama.base_url.as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_apply_env_keeps_explicit_values() {
        let vars = env(&[("ANTHROPIC_API_KEY", "from-env")]);
        let mut config = AiConfig::default();
        config.providers.anthropic.api_key = "from-file".to_string();
        config.apply_env(|name| vars.get(name).cloned());
        assert_eq!(config.providers.anthropic.api_key(), Some("from-file"));
    }

    #[test]
    fn test_gemini_key_prefers_gemini_var() {
        let vars = env(&[("GEMINI_API_KEY", "primary"), ("GOOGLE_AI_API_KEY", "secondary")]);
        let mut config = AiConfig::default();
        config.apply_env(|name| vars.get(name).cloned());
        assert_eq!(config.providers.gemini.api_key(), Some("primary"));
    }

    #[test]
    fn test_config_defaults_from_empty_document() {
        let config: AiConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.default_max_tokens.is_none());
        assert!(config.providers.ollama.base_url.is_none());
    }

    #[test]
    fn test_provider_config_debug_hides_key() {
        let section = ProviderConfig {
            api_key: "sk-very-secret-key".to_string(),
            base_url: None,
        };
        let debug = format!("{:?}", section);
        assert!(!debug.contains("sk-very-secret-key"));
        assert!(debug.contains("sk-...-key"));
    }

    #[test]
    fn test_masked_copy() {
        let mut providers = ProvidersConfig::default();
        providers.openai.api_key = "sk-proj-abcdefgh1234".to_string();
        let masked = providers.masked();
        assert_eq!(masked.openai.api_key, "sk-...1234");
        assert_eq!(masked.anthropic.api_key, "");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("abcdefghijkl"), "abc...ijkl");
        assert_eq!(mask_secret("äöüßäöüß"), "äöü...äöüß");
    }
}
