//! OpenAI provider (GPT-4o, o3, etc.)
//!
//! The same chat-completions wire format is reused by [`super::openai_compat`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FinishKind, ProviderError, Result};
use crate::types::{ExpectedFormat, RequestOptions, StandardAiRequest, Usage};

use super::http::{request_timeout_ms, send_json};
use super::prompt::{AssembledPrompt, assemble};
use super::types::{ProviderAdapter, ProviderOutput};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    name: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        Self::with_name(
            "openai",
            Some(api_key),
            base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
        )
    }

    /// Chat-completions client under another provider name.
    ///
    /// `api_key` is optional because some compatible servers (Ollama) take none.
    pub(crate) fn with_name(name: &str, api_key: Option<String>, base_url: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
        })
    }

    /// Convert an assembled prompt to the OpenAI wire format
    fn to_openai_request(
        prompt: &AssembledPrompt,
        model: &str,
        options: &RequestOptions,
    ) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: prompt.system.clone(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: prompt.user.clone(),
        });

        OpenAiChatRequest {
            model: model.to_string(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        }
    }

    /// Convert an OpenAI response to raw text and usage
    fn from_openai_response(
        provider: &str,
        resp: OpenAiApiResponse,
        prompt: &AssembledPrompt,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::empty(provider))?;

        let text = choice.message.content.unwrap_or_default();
        check_finish_reason(provider, choice.finish_reason.as_deref())
            .map_err(|e| e.with_partial(&text))?;

        if text.trim().is_empty() {
            return Err(ProviderError::empty(provider));
        }

        let usage = match resp.usage {
            Some(u) => Usage::exact(u.prompt_tokens, u.completion_tokens),
            None => Usage::estimate(&prompt.combined(), &text),
        };

        Ok(ProviderOutput {
            raw_content: text,
            usage,
        })
    }
}

/// Finish reasons of the chat-completions family.
///
/// A missing reason is accepted: several compatible servers omit it.
pub(crate) fn check_finish_reason(
    provider: &str,
    reason: Option<&str>,
) -> std::result::Result<(), ProviderError> {
    match reason {
        None | Some("stop") => Ok(()),
        Some(r @ ("length" | "model_length")) => {
            Err(ProviderError::finish(provider, r, FinishKind::Truncated))
        }
        Some(r @ "content_filter") => Err(ProviderError::finish(provider, r, FinishKind::Blocked)),
        Some(r) => Err(ProviderError::finish(provider, r, FinishKind::Other)),
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: &StandardAiRequest,
        model: &str,
        format: ExpectedFormat,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let prompt = assemble(request, format);
        let body = Self::to_openai_request(&prompt, model, &request.options);

        debug!(
            "{} request: model={}, messages={}",
            self.name,
            model,
            body.messages.len()
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let api_response: OpenAiApiResponse =
            send_json(&self.name, builder, request_timeout_ms(request)).await?;

        debug!(
            "{} response: choices={}, finish_reason={:?}",
            self.name,
            api_response.choices.len(),
            api_response.choices.first().map(|c| &c.finish_reason)
        );

        Self::from_openai_response(&self.name, api_response, &prompt)
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Clone, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
