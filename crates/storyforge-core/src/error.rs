//! Error types for construction-time failures and adapter outcomes

use thiserror::Error;

use crate::types::ModelType;

/// Errors raised while building the orchestration layer
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a vendor stopped before a normal end of turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishKind {
    /// Output hit the token limit
    Truncated,
    /// Safety or policy filter
    Blocked,
    Other,
}

/// Failure of a single adapter call.
///
/// Vendor and HTTP-client errors are flattened into these variants at the
/// adapter boundary; the classifier turns them into an [`crate::ErrorInfo`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("No credential configured for {provider} (set {env_var})")]
    MissingCredential {
        provider: ModelType,
        env_var: &'static str,
    },

    #[error("No adapter registered for provider {0}")]
    Unsupported(ModelType),

    #[error("{provider} API request failed with status {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
        retry_after: Option<u64>,
    },

    #[error("{provider} request timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Failed to reach {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("{provider} stopped generating (finish reason: {reason})")]
    FinishReason {
        provider: String,
        reason: String,
        kind: FinishKind,
        /// Text generated before the vendor stopped
        partial: Option<String>,
    },

    #[error("Failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Flatten a transport-level reqwest failure
    pub(crate) fn from_reqwest(provider: &str, err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                timeout_ms,
            }
        } else {
            Self::Transport {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn decode(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn empty(provider: &str) -> Self {
        Self::EmptyResponse {
            provider: provider.to_string(),
        }
    }

    pub(crate) fn finish(provider: &str, reason: &str, kind: FinishKind) -> Self {
        Self::FinishReason {
            provider: provider.to_string(),
            reason: reason.to_string(),
            kind,
            partial: None,
        }
    }

    /// Attach the text received before an early stop
    pub(crate) fn with_partial(mut self, text: &str) -> Self {
        if let Self::FinishReason { partial, .. } = &mut self
            && !text.trim().is_empty()
        {
            *partial = Some(text.to_string());
        }
        self
    }

    /// Vendor text received before the failure, if any
    pub fn partial_content(&self) -> Option<&str> {
        match self {
            Self::FinishReason { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }

    /// HTTP status carried by the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Http {
            provider: "openai".to_string(),
            status: 429,
            body: "slow down".to_string(),
            retry_after: Some(20),
        };
        assert_eq!(
            err.to_string(),
            "openai API request failed with status 429: slow down"
        );
        assert_eq!(err.status(), Some(429));

        let err = ProviderError::MissingCredential {
            provider: ModelType::Anthropic,
            env_var: "ANTHROPIC_API_KEY",
        };
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_partial_content_kept_on_finish_reason() {
        let err = ProviderError::finish("openai", "length", FinishKind::Truncated)
            .with_partial("{\"name\": \"Al");
        assert_eq!(err.partial_content(), Some("{\"name\": \"Al"));

        let blank = ProviderError::finish("openai", "length", FinishKind::Truncated).with_partial("  ");
        assert_eq!(blank.partial_content(), None);

        let other = ProviderError::empty("openai").with_partial("ignored");
        assert_eq!(other.partial_content(), None);
    }
}
