//! Adapter contract shared by every vendor

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ExpectedFormat, StandardAiRequest, Usage};

/// Normalized result of one vendor call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    /// The vendor's literal text
    pub raw_content: String,
    pub usage: Usage,
}

/// Trait that all vendor adapters implement
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic", "openai")
    fn provider_name(&self) -> &str;

    /// Perform exactly one vendor call for `request` against `model`.
    ///
    /// Implementations must hold no per-request state and must report any
    /// non-normal finish reason as an error rather than truncated output.
    async fn invoke(
        &self,
        request: &StandardAiRequest,
        model: &str,
        format: ExpectedFormat,
    ) -> Result<ProviderOutput, ProviderError>;
}
