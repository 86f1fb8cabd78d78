//! Maps every adapter failure onto the shared [`ErrorKind`] taxonomy

use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::{FinishKind, ProviderError};
use crate::types::{ErrorInfo, ErrorKind, ModelType};

/// Longest vendor body echoed into `details.vendorMessage`
const MAX_VENDOR_MESSAGE_CHARS: usize = 500;

/// Body fragments that mark a billing or quota failure regardless of status
const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "quota",
    "resource_exhausted",
    "billing",
    "credit balance",
];

/// Classify `err` into a user-safe [`ErrorInfo`].
///
/// `provider` is the resolved provider, when resolution got that far.
pub fn classify(err: &ProviderError, provider: Option<ModelType>) -> ErrorInfo {
    let kind = classify_kind(err);

    let mut details = Map::new();
    let provider_name = provider
        .map(|p| p.as_str().to_string())
        .or_else(|| error_provider(err).map(str::to_string));
    if let Some(name) = &provider_name {
        details.insert("provider".to_string(), json!(name));
    }

    if let ProviderError::Http {
        status,
        body,
        retry_after,
        ..
    } = err
    {
        details.insert("status".to_string(), json!(status));
        if let Some(message) = vendor_message(body) {
            details.insert("vendorMessage".to_string(), json!(message));
        }
        if kind == ErrorKind::QuotaExceeded
            && let Some(secs) = retry_after.or_else(|| gemini_retry_delay(body))
        {
            details.insert("retryAfterSeconds".to_string(), json!(secs));
        }
    }

    if let ProviderError::FinishReason { reason, .. } = err {
        details.insert("finishReason".to_string(), json!(reason));
    }

    details.insert(
        "remediation".to_string(),
        json!(remediation(err, kind, provider_name.as_deref())),
    );

    warn!(
        "Classified {} failure as {}: {}",
        provider_name.as_deref().unwrap_or("unknown"),
        kind,
        err
    );

    ErrorInfo {
        code: kind,
        message: user_message(kind).to_string(),
        details: Value::Object(details),
        original_error: Some(err.to_string()),
    }
}

fn classify_kind(err: &ProviderError) -> ErrorKind {
    match err {
        ProviderError::MissingCredential { .. } => ErrorKind::AuthenticationError,
        ProviderError::Unsupported(_) => ErrorKind::UnsupportedProvider,
        ProviderError::Http { status, body, .. } => classify_status(*status, body),
        ProviderError::Timeout { .. } => ErrorKind::Timeout,
        ProviderError::Transport { .. } => ErrorKind::ServerError,
        ProviderError::EmptyResponse { .. } => ErrorKind::ServerError,
        ProviderError::FinishReason { kind, .. } => match kind {
            FinishKind::Truncated => ErrorKind::InvalidRequest,
            FinishKind::Blocked => ErrorKind::PermissionDenied,
            FinishKind::Other => ErrorKind::Unknown,
        },
        ProviderError::Decode { .. } => ErrorKind::ParseError,
        ProviderError::InvalidRequest(_) => ErrorKind::InvalidRequest,
    }
}

/// Map a vendor HTTP status (and its body) to an [`ErrorKind`]
pub fn classify_status(status: u16, body: &str) -> ErrorKind {
    match status {
        401 => return ErrorKind::AuthenticationError,
        402 | 429 => return ErrorKind::QuotaExceeded,
        400..=499 if is_quota_body(body) => return ErrorKind::QuotaExceeded,
        _ => {}
    }

    match status {
        400 | 404 | 413 | 422 => ErrorKind::InvalidRequest,
        403 => ErrorKind::PermissionDenied,
        408 | 504 => ErrorKind::Timeout,
        500 | 502 | 503 | 529 => ErrorKind::ServerError,
        400..=499 => ErrorKind::InvalidRequest,
        _ => ErrorKind::Unknown,
    }
}

fn is_quota_body(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|m| lower.contains(m))
}

/// Vendor-supplied error text.
///
/// Understands the `{"error": {"message": ...}}` shape used by OpenAI,
/// Anthropic, Gemini and Mistral, plus the flatter shapes of compatible
/// servers; anything else falls back to the (truncated) raw body.
pub fn vendor_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error").filter(|e| e.is_string()),
            value.get("message"),
            value.get("detail"),
        ];
        if let Some(message) = candidates
            .into_iter()
            .flatten()
            .find_map(Value::as_str)
            .filter(|m| !m.trim().is_empty())
        {
            return Some(truncate_chars(message.trim(), MAX_VENDOR_MESSAGE_CHARS));
        }
    }

    Some(truncate_chars(body, MAX_VENDOR_MESSAGE_CHARS))
}

/// Gemini reports quota back-off as `RetryInfo.retryDelay` (e.g. `"37s"`)
fn gemini_retry_delay(body: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .filter_map(|d| d.get("retryDelay")?.as_str())
        .find_map(|delay| {
            let secs: f64 = delay.trim().strip_suffix('s')?.parse().ok()?;
            (secs.is_finite() && secs >= 0.0).then(|| secs.ceil() as u64)
        })
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn error_provider(err: &ProviderError) -> Option<&str> {
    match err {
        ProviderError::MissingCredential { provider, .. } | ProviderError::Unsupported(provider) => {
            Some(provider.as_str())
        }
        ProviderError::Http { provider, .. }
        | ProviderError::Timeout { provider, .. }
        | ProviderError::Transport { provider, .. }
        | ProviderError::EmptyResponse { provider }
        | ProviderError::FinishReason { provider, .. }
        | ProviderError::Decode { provider, .. } => Some(provider.as_str()),
        ProviderError::InvalidRequest(_) => None,
    }
}

/// Sentence safe to show to end users
pub fn user_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::AuthenticationError => {
            "The AI provider rejected the configured credentials."
        }
        ErrorKind::PermissionDenied => "The AI provider declined to process this request.",
        ErrorKind::InvalidRequest => "The request could not be processed by the AI provider.",
        ErrorKind::QuotaExceeded => {
            "The AI provider's usage limit has been reached. Please try again later."
        }
        ErrorKind::ServerError => "The AI provider is temporarily unavailable. Please try again.",
        ErrorKind::Timeout => "The AI provider did not respond in time.",
        ErrorKind::ParseError => "The AI provider returned a response that could not be read.",
        ErrorKind::UnsupportedProvider => "The requested AI provider is not supported.",
        ErrorKind::Unknown => "An unexpected error occurred while contacting the AI provider.",
    }
}

fn remediation(err: &ProviderError, kind: ErrorKind, provider: Option<&str>) -> String {
    let provider = provider.unwrap_or("the provider");
    match err {
        ProviderError::MissingCredential { provider, env_var } => format!(
            "Set {} or add an api key to the [providers.{}] config section",
            env_var, provider
        ),
        ProviderError::Unsupported(provider) => format!(
            "No adapter is registered for {}; request a model served by an enabled provider",
            provider
        ),
        ProviderError::FinishReason {
            kind: FinishKind::Truncated,
            ..
        } => "Raise maxTokens or shorten the prompt".to_string(),
        ProviderError::FinishReason {
            kind: FinishKind::Blocked,
            ..
        } => "Rephrase the prompt; the provider's safety filter stopped the response".to_string(),
        ProviderError::InvalidRequest(reason) => format!("Fix the request: {}", reason),
        _ => match kind {
            ErrorKind::AuthenticationError => format!("Check the API key configured for {}", provider),
            ErrorKind::PermissionDenied => {
                format!("Check that the {} API key has access to this model", provider)
            }
            ErrorKind::InvalidRequest => "Check the model name and request options".to_string(),
            ErrorKind::QuotaExceeded => {
                format!("Wait before retrying or raise the {} account quota", provider)
            }
            ErrorKind::ServerError => format!("Retry later; {} reported a server-side failure", provider),
            ErrorKind::Timeout => "Retry, or raise timeoutMs".to_string(),
            ErrorKind::ParseError => "Retry the request".to_string(),
            ErrorKind::UnsupportedProvider | ErrorKind::Unknown => {
                "See originalError for details".to_string()
            }
        },
    }
}
