//! Anthropic Claude provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FinishKind, ProviderError, Result};
use crate::types::{ExpectedFormat, RequestOptions, StandardAiRequest, Usage};

use super::http::{request_timeout_ms, send_json};
use super::prompt::{AssembledPrompt, assemble};
use super::types::{ProviderAdapter, ProviderOutput};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The Messages API requires an explicit output limit
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .as_deref()
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Convert an assembled prompt to the Anthropic wire format
    fn to_anthropic_request(
        prompt: &AssembledPrompt,
        model: &str,
        options: &RequestOptions,
    ) -> AnthropicRequest {
        AnthropicRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!prompt.system.is_empty()).then(|| prompt.system.clone()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
            temperature: options.temperature,
        }
    }

    /// Convert an Anthropic response to raw text and usage
    fn from_anthropic_response(
        resp: AnthropicApiResponse,
        prompt: &AssembledPrompt,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        let text = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let stopped = match resp.stop_reason.as_deref() {
            None | Some("end_turn") | Some("stop_sequence") => None,
            Some(r @ "max_tokens") => Some((r, FinishKind::Truncated)),
            Some(r @ "refusal") => Some((r, FinishKind::Blocked)),
            Some(r) => Some((r, FinishKind::Other)),
        };
        if let Some((reason, kind)) = stopped {
            return Err(ProviderError::finish("anthropic", reason, kind).with_partial(&text));
        }

        if text.trim().is_empty() {
            return Err(ProviderError::empty("anthropic"));
        }

        let usage = match resp.usage {
            Some(u) => Usage::exact(u.input_tokens, u.output_tokens),
            None => Usage::estimate(&prompt.combined(), &text),
        };

        Ok(ProviderOutput {
            raw_content: text,
            usage,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn invoke(
        &self,
        request: &StandardAiRequest,
        model: &str,
        format: ExpectedFormat,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let prompt = assemble(request, format);
        let body = Self::to_anthropic_request(&prompt, model, &request.options);

        debug!(
            "Anthropic request: model={}, max_tokens={}",
            model, body.max_tokens
        );

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let api_response: AnthropicApiResponse =
            send_json("anthropic", builder, request_timeout_ms(request)).await?;

        debug!(
            "Anthropic response: blocks={}, stop_reason={:?}",
            api_response.content.len(),
            api_response.stop_reason
        );

        Self::from_anthropic_response(api_response, &prompt)
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicApiResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
