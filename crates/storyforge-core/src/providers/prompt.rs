//! Prompt assembly shared by every adapter

use crate::assembler::is_list_request_type;
use crate::types::{ExpectedFormat, StandardAiRequest};

/// System and user text ready to be placed into a vendor payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub system: String,
    pub user: String,
}

impl AssembledPrompt {
    /// Everything sent to the model, for usage estimation
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

const JSON_DIRECTIVE: &str = "Respond only with strict JSON. Do not wrap the output in markdown \
     code fences and do not add any commentary before or after it.";

const YAML_DIRECTIVE: &str = "Respond only with a valid YAML document. Do not wrap the output in \
     markdown code fences and do not add any commentary before or after it.";

const LIST_INSTRUCTION: &str = "Return the generated entries as a list. Give every entry a unique \
     string \"id\" field and keep ids stable if you are revising existing entries.";

pub fn format_directive(format: ExpectedFormat) -> Option<&'static str> {
    match format {
        ExpectedFormat::Text => None,
        ExpectedFormat::Json => Some(JSON_DIRECTIVE),
        ExpectedFormat::Yaml => Some(YAML_DIRECTIVE),
    }
}

/// Extra instruction tied to the logical operation
pub fn special_instruction(request_type: &str) -> Option<&'static str> {
    is_list_request_type(request_type).then_some(LIST_INSTRUCTION)
}

/// System prompt, format directive and special instruction go to the system
/// text; the optional context block and the user prompt go to the user text.
pub fn assemble(request: &StandardAiRequest, format: ExpectedFormat) -> AssembledPrompt {
    let system = [
        Some(request.system_prompt.trim()),
        format_directive(format),
        special_instruction(&request.request_type),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n");

    let mut user = String::new();
    if let Some(context) = request.context.as_ref().filter(|c| !c.is_empty()) {
        let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
        user.push_str("Context:\n");
        user.push_str(&rendered);
        user.push_str("\n\n");
    }
    user.push_str(request.user_prompt.trim());

    AssembledPrompt { system, user }
}
