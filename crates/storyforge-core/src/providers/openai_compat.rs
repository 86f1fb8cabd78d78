//! OpenAI-compatible providers: Mistral and Ollama.
//!
//! Both speak the chat-completions wire format with a different base URL.

use async_trait::async_trait;

use crate::error::{ProviderError, Result};
use crate::types::{ExpectedFormat, StandardAiRequest};

use super::openai::OpenAiProvider;
use super::types::{ProviderAdapter, ProviderOutput};

pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai";

/// OpenAI-compatible provider, wraps [`OpenAiProvider`] with a custom name
pub struct OpenAiCompatProvider {
    inner: OpenAiProvider,
    name: String,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl OpenAiCompatProvider {
    /// - `name`: label used in logs and error details (e.g. "mistral")
    /// - `base_url`: endpoint root without the `/v1` suffix
    pub fn new(name: &str, api_key: Option<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            inner: OpenAiProvider::with_name(name, api_key, base_url)?,
            name: name.to_string(),
        })
    }

    pub fn mistral(api_key: String, base_url: Option<String>) -> Result<Self> {
        Self::new(
            "mistral",
            Some(api_key),
            base_url.as_deref().unwrap_or(MISTRAL_BASE_URL),
        )
    }

    /// Local Ollama server; it takes no API key
    pub fn ollama(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let base_url = base_url.strip_suffix("/v1").unwrap_or(base_url);
        Self::new("ollama", None, base_url)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: &StandardAiRequest,
        model: &str,
        format: ExpectedFormat,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        self.inner.invoke(request, model, format).await
    }
}
