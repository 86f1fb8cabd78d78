//! Provider-agnostic request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Vendor family that serves a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    OpenAi,
    Anthropic,
    Gemini,
    Mistral,
    Ollama,
}

impl ModelType {
    pub const ALL: [ModelType; 5] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::Mistral,
        Self::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Mistral => "mistral",
            Self::Ollama => "ollama",
        }
    }

    /// Environment variable holding this provider's credential.
    ///
    /// Ollama has no API key; its endpoint URL plays that role.
    pub fn credential_env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Mistral => "MISTRAL_API_KEY",
            Self::Ollama => "OLLAMA_BASE_URL",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown provider: {}", s))
    }
}

/// Shape the caller wants the response content in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl ExpectedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl std::fmt::Display for ExpectedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExpectedFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("Unknown format: {}", other)),
        }
    }
}

/// Per-call generation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub expected_format: ExpectedFormat,
}

/// One request into the orchestration layer, independent of vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardAiRequest {
    pub request_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl StandardAiRequest {
    pub fn new(
        request_type: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            request_type: request_type.into(),
            model: None,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            context: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_format(mut self, format: ExpectedFormat) -> Self {
        self.options.expected_format = format;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    /// The explicitly requested model, if it is not blank
    pub fn requested_model(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Token accounting for one call
///
/// `estimated` is true whenever the numbers did not come from the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub estimated: bool,
}

impl Usage {
    /// Counts reported by the vendor
    pub fn exact(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            estimated: false,
        }
    }

    /// Character-length estimate (roughly four characters per token)
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = estimate_tokens(completion);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            estimated: true,
        }
    }

    /// Nothing was received from the vendor
    pub fn none() -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            estimated: true,
        }
    }
}

pub fn estimate_tokens(text: &str) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    chars.div_ceil(4)
}

/// Shared error taxonomy for every vendor failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AuthenticationError,
    PermissionDenied,
    InvalidRequest,
    QuotaExceeded,
    ServerError,
    Timeout,
    ParseError,
    UnsupportedProvider,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::ServerError => "SERVER_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ParseError => "PARSE_ERROR",
            Self::UnsupportedProvider => "UNSUPPORTED_PROVIDER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure attached to an error response.
///
/// Only `message` is meant for end users; `details` and `original_error`
/// are diagnostics for server-side logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ModelType>,
    pub request_type: String,
    pub processing_time_ms: u64,
}

/// Outcome of one orchestrated call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardAiResponse {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ResponseStatus,
    pub response_format: ExpectedFormat,
    pub content: Option<Value>,
    /// Set when `content` is the parser's unstructured marker
    #[serde(default)]
    pub degraded: bool,
    pub raw_content: String,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub debug: DebugInfo,
}

impl StandardAiResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn error_code(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_round_trip_names() {
        for ty in ModelType::ALL {
            assert_eq!(ty.as_str().parse::<ModelType>().unwrap(), ty);
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
        assert!("cohere".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_expected_format_parse() {
        assert_eq!("JSON".parse::<ExpectedFormat>().unwrap(), ExpectedFormat::Json);
        assert_eq!("yml".parse::<ExpectedFormat>().unwrap(), ExpectedFormat::Yaml);
        assert!("xml".parse::<ExpectedFormat>().is_err());
        assert_eq!(ExpectedFormat::default(), ExpectedFormat::Text);
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: StandardAiRequest = serde_json::from_value(serde_json::json!({
            "requestType": "character-detail",
            "model": "gpt-4o",
            "systemPrompt": "You are a novelist.",
            "userPrompt": "Describe Alice.",
            "options": {"temperature": 0.7, "maxTokens": 500, "expectedFormat": "json"}
        }))
        .unwrap();
        assert_eq!(request.request_type, "character-detail");
        assert_eq!(request.options.max_tokens, Some(500));
        assert_eq!(request.options.expected_format, ExpectedFormat::Json);
        assert!(request.context.is_none());
    }

    #[test]
    fn test_requested_model_ignores_blank() {
        let request = StandardAiRequest::new("x", "", "hi").with_model("   ");
        assert_eq!(request.requested_model(), None);
        let request = request.with_model(" gpt-4o ");
        assert_eq!(request.requested_model(), Some("gpt-4o"));
    }

    #[test]
    fn test_usage_constructors() {
        let exact = Usage::exact(10, 5);
        assert_eq!(exact.total_tokens, 15);
        assert!(!exact.estimated);

        let estimated = Usage::estimate("abcdefgh", "abc");
        assert_eq!(estimated.prompt_tokens, 2);
        assert_eq!(estimated.completion_tokens, 1);
        assert!(estimated.estimated);

        let none = Usage::none();
        assert_eq!(none.total_tokens, 0);
        assert!(none.estimated);
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::QuotaExceeded).unwrap();
        assert_eq!(json, "\"QUOTA_EXCEEDED\"");
        assert_eq!(ErrorKind::UnsupportedProvider.to_string(), "UNSUPPORTED_PROVIDER");
    }
}
