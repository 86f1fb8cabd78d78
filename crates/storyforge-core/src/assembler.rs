//! Response assembly: identity, timing and list-item ids

use std::time::Instant;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::parser::ParseOutcome;
use crate::providers::ProviderOutput;
use crate::types::{
    DebugInfo, ErrorInfo, ExpectedFormat, ModelType, ResponseStatus, StandardAiRequest,
    StandardAiResponse, Usage,
};

/// Request types whose output is a list even without a `-list` suffix
const LIST_REQUEST_TYPES: &[&str] = &[
    "world-building",
    "plot-points",
    "chapter-outline",
    "character-suggestions",
];

/// Whether `request_type` produces a list of entries that need stable ids
pub fn is_list_request_type(request_type: &str) -> bool {
    let request_type = request_type.trim().to_ascii_lowercase();
    request_type.ends_with("-list")
        || request_type.ends_with("-ideas")
        || LIST_REQUEST_TYPES.contains(&request_type.as_str())
}

/// Per-request metadata gathered before the response exists
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub request_type: String,
    pub format: ExpectedFormat,
    pub model: String,
    pub provider: Option<ModelType>,
    started: Instant,
}

impl ResponseContext {
    /// Starts the processing clock
    pub fn new(request: &StandardAiRequest) -> Self {
        Self {
            request_type: request.request_type.clone(),
            format: request.options.expected_format,
            model: request.requested_model().unwrap_or_default().to_string(),
            provider: None,
            started: Instant::now(),
        }
    }

    pub fn with_resolution(mut self, model: &str, provider: ModelType) -> Self {
        self.model = model.to_string();
        self.provider = Some(provider);
        self
    }

    fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            model: self.model.clone(),
            provider: self.provider,
            request_type: self.request_type.clone(),
            processing_time_ms: u64::try_from(self.started.elapsed().as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

pub fn assemble_success(
    ctx: &ResponseContext,
    outcome: ParseOutcome,
    output: ProviderOutput,
) -> StandardAiResponse {
    let degraded = outcome.is_degraded();
    let mut content = outcome.into_value();
    if !degraded && is_list_request_type(&ctx.request_type) {
        ensure_item_ids(&mut content);
    }

    StandardAiResponse {
        request_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        status: ResponseStatus::Success,
        response_format: ctx.format,
        content: Some(content),
        degraded,
        raw_content: output.raw_content,
        usage: output.usage,
        error: None,
        debug: ctx.debug_info(),
    }
}

/// Error response; `raw_content` is empty when no vendor text was received
pub fn assemble_error(
    ctx: &ResponseContext,
    error: ErrorInfo,
    raw_content: Option<&str>,
) -> StandardAiResponse {
    StandardAiResponse {
        request_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        status: ResponseStatus::Error,
        response_format: ctx.format,
        content: None,
        degraded: false,
        raw_content: raw_content.unwrap_or_default().to_string(),
        usage: Usage::none(),
        error: Some(error),
        debug: ctx.debug_info(),
    }
}

/// Give every list entry a non-empty `id`.
///
/// A top-level array is the list itself; scalar entries there are wrapped as
/// `{"id", "value"}`. Inside a top-level object only arrays made entirely of
/// objects are entity lists; plain value lists such as tags are left alone.
/// Existing ids are kept; entries are never reordered or dropped.
pub fn ensure_item_ids(content: &mut Value) {
    match content {
        Value::Array(items) => items.iter_mut().for_each(ensure_entry_id),
        Value::Object(fields) => {
            for value in fields.values_mut() {
                if let Value::Array(items) = value
                    && items.iter().all(Value::is_object)
                {
                    items.iter_mut().for_each(ensure_entry_id);
                }
            }
        }
        _ => {}
    }
}

fn ensure_entry_id(entry: &mut Value) {
    match entry {
        Value::Object(fields) => {
            if !has_usable_id(fields.get("id")) {
                fields.insert("id".to_string(), Value::String(new_item_id()));
            }
        }
        other => {
            let value = other.take();
            let mut wrapped = Map::new();
            wrapped.insert("id".to_string(), Value::String(new_item_id()));
            wrapped.insert("value".to_string(), value);
            *other = Value::Object(wrapped);
        }
    }
}

fn has_usable_id(id: Option<&Value>) -> bool {
    match id {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

fn new_item_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
