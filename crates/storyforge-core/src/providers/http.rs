//! Request dispatch and HTTP status capture shared by the adapters

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::DEFAULT_TIMEOUT_MS;
use crate::error::ProviderError;
use crate::types::StandardAiRequest;

/// Per-call timeout carried on the request (the orchestrator fills it in)
pub(crate) fn request_timeout_ms(request: &StandardAiRequest) -> u64 {
    request.options.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
}

/// Send `builder` and decode a successful JSON body into `T`.
///
/// Non-2xx statuses become [`ProviderError::Http`] with the body and any
/// retry-after hint; an empty 2xx body is [`ProviderError::EmptyResponse`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    builder: RequestBuilder,
    timeout_ms: u64,
) -> Result<T, ProviderError> {
    let response = builder
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e, timeout_ms))?;

    let status = response.status();
    let retry_after = parse_retry_after(response.headers(), Utc::now());
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e, timeout_ms))?;

    debug!(
        "{} response: status={}, bytes={}",
        provider,
        status.as_u16(),
        body.len()
    );

    if !status.is_success() {
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
            retry_after,
        });
    }

    if body.trim().is_empty() {
        return Err(ProviderError::empty(provider));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::decode(provider, e))
}

/// Seconds to wait according to a `Retry-After` header (delta-seconds or HTTP-date)
pub(crate) fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    if let Ok(secs) = value.parse::<f64>()
        && secs.is_finite()
        && secs >= 0.0
    {
        return Some(secs.ceil() as u64);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc).signed_duration_since(now).num_seconds();
    Some(wait.max(0) as u64)
}
