//! Model name to provider resolution and per-request default models

use serde::{Deserialize, Serialize};

use crate::types::{ModelType, StandardAiRequest};

/// Map a model identifier to the vendor that serves it.
///
/// Matching is case-insensitive and never fails: names that match no rule
/// (including the empty string) resolve to `fallback`.
pub fn resolve_model_type(model: &str, fallback: ModelType) -> ModelType {
    let name = model.trim().to_ascii_lowercase();

    if name.starts_with("gpt-") || name.starts_with("chatgpt-") || is_openai_reasoning(&name) {
        ModelType::OpenAi
    } else if name.starts_with("claude-") {
        ModelType::Anthropic
    } else if name.contains("gemini") {
        ModelType::Gemini
    } else if ["mistral", "mixtral", "codestral"]
        .iter()
        .any(|p| name.contains(p))
    {
        ModelType::Mistral
    } else if name.contains("llama") || name.contains("ollama") {
        ModelType::Ollama
    } else {
        fallback
    }
}

/// o1, o3-mini, o4-mini, ...
fn is_openai_reasoning(name: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|family| {
        name == *family
            || name
                .strip_prefix(family)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}

/// Default model per provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderModels {
    #[serde(default = "default_openai_model")]
    pub openai: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic: String,
    #[serde(default = "default_gemini_model")]
    pub gemini: String,
    #[serde(default = "default_mistral_model")]
    pub mistral: String,
    #[serde(default = "default_ollama_model")]
    pub ollama: String,
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}
fn default_gemini_model() -> String {
    "gemini-1.5-pro".to_string()
}
fn default_mistral_model() -> String {
    "mistral-large-latest".to_string()
}
fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

impl Default for ProviderModels {
    fn default() -> Self {
        Self {
            openai: default_openai_model(),
            anthropic: default_anthropic_model(),
            gemini: default_gemini_model(),
            mistral: default_mistral_model(),
            ollama: default_ollama_model(),
        }
    }
}

impl ProviderModels {
    pub fn get(&self, provider: ModelType) -> &str {
        match provider {
            ModelType::OpenAi => &self.openai,
            ModelType::Anthropic => &self.anthropic,
            ModelType::Gemini => &self.gemini,
            ModelType::Mistral => &self.mistral,
            ModelType::Ollama => &self.ollama,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Provider for model names no rule recognizes
    #[serde(default = "default_provider")]
    pub default_provider: ModelType,
    /// Model used when the request type has no domain preference
    #[serde(default = "default_openai_model")]
    pub default_model: String,
    #[serde(default)]
    pub models: ProviderModels,
}

fn default_provider() -> ModelType {
    ModelType::OpenAi
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_openai_model(),
            models: ProviderModels::default(),
        }
    }
}

const WORLD_BUILDING_HINTS: &[&str] = &["world", "location", "setting", "lore", "faction"];

/// Resolves the concrete model and provider for a request
#[derive(Debug, Clone, Default)]
pub struct ModelResolver {
    config: ResolverConfig,
}

impl ModelResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve_model_type(&self, model: &str) -> ModelType {
        resolve_model_type(model, self.config.default_provider)
    }

    /// Heuristic default model for a request type.
    ///
    /// World-building flavored types prefer Gemini, character flavored types
    /// prefer Anthropic, everything else gets the global default.
    pub fn resolve_default_model(&self, request_type: &str) -> String {
        let request_type = request_type.to_ascii_lowercase();
        if WORLD_BUILDING_HINTS.iter().any(|h| request_type.contains(h)) {
            self.config.models.get(ModelType::Gemini).to_string()
        } else if request_type.contains("character") {
            self.config.models.get(ModelType::Anthropic).to_string()
        } else {
            self.config.default_model.clone()
        }
    }

    /// Model name and provider that will serve `request`
    pub fn resolve(&self, request: &StandardAiRequest) -> (String, ModelType) {
        let model = match request.requested_model() {
            Some(model) => model.to_string(),
            None => self.resolve_default_model(&request.request_type),
        };
        let provider = self.resolve_model_type(&model);
        (model, provider)
    }
}
