//! Structured output parsing with recovery from fenced or noisy model output

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::types::ExpectedFormat;

/// Upper bound on balanced-bracket openings tried per response
const MAX_CANDIDATES: usize = 32;

/// Result of parsing a raw model response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Value),
    /// Recovery failed; the value is the unstructured marker object
    Degraded(Value),
}

impl ParseOutcome {
    pub fn into_value(self) -> Value {
        match self {
            Self::Parsed(v) | Self::Degraded(v) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Parse `raw` according to `format`. Never fails.
pub fn parse(raw: &str, format: ExpectedFormat) -> ParseOutcome {
    let parsed = match format {
        ExpectedFormat::Text => return ParseOutcome::Parsed(Value::String(raw.to_string())),
        ExpectedFormat::Json => parse_json(raw),
        ExpectedFormat::Yaml => parse_yaml(raw),
    };

    match parsed {
        Some(value) => ParseOutcome::Parsed(value),
        None => {
            let reason = match format {
                ExpectedFormat::Yaml => "no YAML mapping or sequence found in response",
                _ => "no valid JSON found in response",
            };
            warn!(
                "Degraded {} parse ({} chars): {}",
                format,
                raw.chars().count(),
                reason
            );
            ParseOutcome::Degraded(degraded_marker(raw, format, reason))
        }
    }
}

/// Marker stored as `content` when structured parsing fails
pub fn degraded_marker(raw: &str, format: ExpectedFormat, reason: &str) -> Value {
    json!({
        "unstructured": true,
        "expectedFormat": format.as_str(),
        "reason": reason,
        "rawContent": raw,
    })
}

fn parse_json(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(value);
    }

    for (lang, body) in fenced_blocks(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            debug!("Recovered JSON from ```{} fence", lang);
            return Some(value);
        }
    }

    let recovered = balanced_candidates(raw)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok());
    if recovered.is_some() {
        debug!("Recovered JSON from surrounding text");
    }
    recovered
}

fn parse_yaml(raw: &str) -> Option<Value> {
    if let Some(value) = yaml_collection(raw) {
        if let Some(rest) = prose_lead_in(raw, &value)
            && let Some(body) = yaml_collection(rest)
        {
            debug!("Dropped prose lead-in before YAML");
            return Some(body);
        }
        return Some(value);
    }

    for (lang, body) in fenced_blocks(raw) {
        if matches!(lang, "yaml" | "yml" | "")
            && let Some(value) = yaml_collection(body)
        {
            debug!("Recovered YAML from fenced block");
            return Some(value);
        }
    }

    yaml_document_block(raw).and_then(yaml_collection)
}

/// Text after a first line like `Here is the character:`.
///
/// Such a line parses as a key with a null value. It is only treated as prose
/// when the key contains whitespace and maps to null in `value`.
fn prose_lead_in<'a>(raw: &'a str, value: &Value) -> Option<&'a str> {
    let Value::Object(fields) = value else {
        return None;
    };
    let (line, rest) = raw.trim_start().split_once('\n')?;
    let key = line.trim_end().strip_suffix(':')?.trim();
    if !key.contains(char::is_whitespace) || !matches!(fields.get(key), Some(Value::Null)) {
        return None;
    }
    Some(rest)
}

/// Any text is a valid YAML scalar, so only mappings and sequences count
fn yaml_collection(text: &str) -> Option<Value> {
    match serde_yml::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Markdown code fences in order of appearance, as (info string, body)
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        match after.find('\n') {
            Some(newline) if newline < close => {
                let lang = after[..newline].trim();
                blocks.push((lang, after[newline + 1..close].trim()));
            }
            // ```{"inline": true}```
            _ => blocks.push(("", after[..close].trim())),
        }
        rest = &after[close + 3..];
    }

    blocks
}

/// Balanced `{...}` / `[...]` substrings, outermost first
fn balanced_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();
    let mut from = 0;

    for _ in 0..MAX_CANDIDATES {
        let Some(offset) = text[from..].find(['{', '[']) else {
            break;
        };
        let open = from + offset;
        if let Some(close) = matching_close(bytes, open) {
            candidates.push(&text[open..=close]);
        }
        from = open + 1;
    }

    candidates
}

/// Index of the bracket closing the one at `open`, skipping string contents
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Body between a `---` line and the next `...` or `---` line (or the end)
fn yaml_document_block(text: &str) -> Option<&str> {
    let mut offset = 0;
    let mut body_start = None;

    for line in text.split_inclusive('\n') {
        let marker = line.trim_end();
        match body_start {
            None if marker == "---" => body_start = Some(offset + line.len()),
            Some(start) if marker == "..." || marker == "---" => {
                return Some(&text[start..offset]);
            }
            _ => {}
        }
        offset += line.len();
    }

    body_start.map(|start| &text[start..])
}
