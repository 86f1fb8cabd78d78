//! Google Gemini provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FinishKind, ProviderError, Result};
use crate::types::{ExpectedFormat, RequestOptions, StandardAiRequest, Usage};

use super::http::{request_timeout_ms, send_json};
use super::prompt::{AssembledPrompt, assemble};
use super::types::{ProviderAdapter, ProviderOutput};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const BLOCKED_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "IMAGE_SAFETY",
];

/// Google Gemini provider
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GoogleProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .as_deref()
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Convert an assembled prompt to the Gemini wire format
    fn to_gemini_request(
        prompt: &AssembledPrompt,
        options: &RequestOptions,
        format: ExpectedFormat,
    ) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.user.clone()),
                    thought: None,
                }],
            }],
            system_instruction: (!prompt.system.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(prompt.system.clone()),
                    thought: None,
                }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                response_mime_type: (format == ExpectedFormat::Json)
                    .then(|| "application/json".to_string()),
            },
        }
    }

    /// Convert a Gemini response to raw text and usage
    fn from_gemini_response(
        resp: GeminiApiResponse,
        prompt: &AssembledPrompt,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::finish("gemini", &reason, FinishKind::Blocked));
        }

        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::empty("gemini"))?;

        let text = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        let stopped = match candidate.finish_reason.as_deref() {
            None | Some("STOP") | Some("FINISH_REASON_UNSPECIFIED") => None,
            Some(r @ "MAX_TOKENS") => Some((r, FinishKind::Truncated)),
            Some(r) if BLOCKED_REASONS.contains(&r) => Some((r, FinishKind::Blocked)),
            Some(r) => Some((r, FinishKind::Other)),
        };
        if let Some((reason, kind)) = stopped {
            return Err(ProviderError::finish("gemini", reason, kind).with_partial(&text));
        }

        if text.trim().is_empty() {
            return Err(ProviderError::empty("gemini"));
        }

        let usage = match resp.usage_metadata {
            Some(GeminiUsageMetadata {
                prompt_token_count: Some(input),
                candidates_token_count: Some(output),
            }) => Usage::exact(input, output),
            _ => Usage::estimate(&prompt.combined(), &text),
        };

        Ok(ProviderOutput {
            raw_content: text,
            usage,
        })
    }
}

/// Model id as it appears in the request path.
///
/// The id is spliced into the URL, so only characters that cannot change the
/// path, query or fragment are accepted.
fn gemini_model_path(model: &str) -> std::result::Result<&str, ProviderError> {
    let path = model.strip_prefix("models/").unwrap_or(model);
    let valid = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if valid {
        Ok(path)
    } else {
        Err(ProviderError::InvalidRequest(format!(
            "invalid Gemini model name: {:?}",
            model
        )))
    }
}

#[async_trait]
impl ProviderAdapter for GoogleProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn invoke(
        &self,
        request: &StandardAiRequest,
        model: &str,
        format: ExpectedFormat,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        let model_path = gemini_model_path(model)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model_path
        );
        let prompt = assemble(request, format);
        let body = Self::to_gemini_request(&prompt, &request.options, format);

        debug!("Gemini request: model={}", model_path);

        let builder = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let api_response: GeminiApiResponse =
            send_json("gemini", builder, request_timeout_ms(request)).await?;

        debug!(
            "Gemini response: candidates={}",
            api_response.candidates.len()
        );

        Self::from_gemini_response(api_response, &prompt)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}
