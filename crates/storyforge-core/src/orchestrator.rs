//! Request orchestration: resolve, invoke, parse, classify, assemble

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::assembler::{ResponseContext, assemble_error, assemble_success};
use crate::classifier::classify;
use crate::config::{AiConfig, DEFAULT_TIMEOUT_MS};
use crate::error::{Error, ProviderError, Result};
use crate::parser::parse;
use crate::providers::ProviderRegistry;
use crate::resolver::ModelResolver;
use crate::types::{StandardAiRequest, StandardAiResponse};

/// Entry point of the orchestration layer.
///
/// Cheap to clone; the registry and resolver are shared and immutable, so
/// any number of requests may run concurrently.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    resolver: Arc<ModelResolver>,
    default_timeout_ms: u64,
    default_max_tokens: Option<u32>,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, resolver: ModelResolver) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver: Arc::new(resolver),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            default_max_tokens: None,
        }
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        if config.default_timeout_ms == 0 {
            return Err(Error::Config(
                "default_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if config.default_max_tokens == Some(0) {
            return Err(Error::Config(
                "default_max_tokens must be greater than 0".to_string(),
            ));
        }

        let registry = ProviderRegistry::from_config(config)?;
        let resolver = ModelResolver::new(config.resolver.clone());
        Ok(Self::new(registry, resolver)
            .with_default_timeout(config.default_timeout_ms)
            .with_default_max_tokens(config.default_max_tokens))
    }

    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_default_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Run one request to completion.
    ///
    /// Never fails: every failure is classified into an error response.
    /// Makes at most one vendor call and never retries.
    pub async fn process_ai_request(&self, request: StandardAiRequest) -> StandardAiResponse {
        let ctx = ResponseContext::new(&request);

        let request = match self.normalize(request) {
            Ok(request) => request,
            Err(e) => return assemble_error(&ctx, classify(&e, None), None),
        };

        let (model, provider) = self.resolver.resolve(&request);
        let ctx = ctx.with_resolution(&model, provider);
        let format = request.options.expected_format;

        let adapter = match self.registry.get(provider) {
            Ok(adapter) => adapter,
            Err(e) => return assemble_error(&ctx, classify(&e, Some(provider)), None),
        };

        let timeout_ms = request
            .options
            .timeout_ms
            .unwrap_or(self.default_timeout_ms);
        debug!(
            "Dispatching {} to {} ({}), format={}, timeout={}ms",
            request.request_type, provider, model, format, timeout_ms
        );

        let invoked = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            adapter.invoke(&request, &model, format),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::Timeout {
                provider: provider.as_str().to_string(),
                timeout_ms,
            })
        });

        match invoked {
            Ok(output) => {
                let outcome = parse(&output.raw_content, format);
                let response = assemble_success(&ctx, outcome, output);
                info!(
                    "{} served by {} ({}) in {}ms, tokens={}{}",
                    response.debug.request_type,
                    provider,
                    model,
                    response.debug.processing_time_ms,
                    response.usage.total_tokens,
                    if response.degraded { ", degraded" } else { "" }
                );
                response
            }
            Err(e) => {
                let info = classify(&e, Some(provider));
                assemble_error(&ctx, info, e.partial_content())
            }
        }
    }

    /// Validate `request` and fill in the configured defaults
    pub fn normalize(
        &self,
        mut request: StandardAiRequest,
    ) -> std::result::Result<StandardAiRequest, ProviderError> {
        if request.user_prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "userPrompt must not be empty".to_string(),
            ));
        }

        let options = &mut request.options;
        if let Some(temperature) = options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::InvalidRequest(format!(
                "temperature must be between 0 and 2, got {}",
                temperature
            )));
        }
        if options.max_tokens == Some(0) {
            return Err(ProviderError::InvalidRequest(
                "maxTokens must be greater than 0".to_string(),
            ));
        }
        if options.timeout_ms == Some(0) {
            return Err(ProviderError::InvalidRequest(
                "timeoutMs must be greater than 0".to_string(),
            ));
        }

        options.timeout_ms.get_or_insert(self.default_timeout_ms);
        if options.max_tokens.is_none() {
            options.max_tokens = self.default_max_tokens;
        }

        Ok(request)
    }
}
