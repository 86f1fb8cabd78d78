//! storyforge-core - AI provider orchestration for the StoryForge writing assistant
//!
//! This crate provides:
//! - One neutral request shape ([`StandardAiRequest`]) for every vendor
//! - Provider adapters for OpenAI, Anthropic, Google Gemini, Mistral and Ollama
//! - Structured output recovery for JSON and YAML responses
//! - A single error taxonomy ([`ErrorKind`]) for every vendor failure
//! - The [`Orchestrator`] that composes resolver, adapter, parser and assembler

pub mod assembler;
pub mod classifier;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod providers;
pub mod resolver;
pub mod types;

pub use config::{AiConfig, ProviderConfig, ProvidersConfig, mask_secret};
pub use error::{Error, FinishKind, ProviderError, Result};
pub use orchestrator::Orchestrator;
pub use parser::ParseOutcome;
pub use providers::{ProviderAdapter, ProviderOutput, ProviderRegistry, ProviderStatus};
pub use resolver::{ModelResolver, ResolverConfig, resolve_model_type};
pub use types::{
    DebugInfo, ErrorInfo, ErrorKind, ExpectedFormat, ModelType, RequestOptions, ResponseStatus,
    StandardAiRequest, StandardAiResponse, Usage,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _ = std::mem::size_of::<Orchestrator>();
        let _ = std::mem::size_of::<ProviderRegistry>();
        let _ = std::mem::size_of::<StandardAiRequest>();
        let _ = std::mem::size_of::<StandardAiResponse>();
    }
}
