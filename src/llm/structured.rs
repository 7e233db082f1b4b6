//! JSON-mode prompting on top of the chat API.
//!
//! Agents that need a typed decision (task lists, routing choices,
//! sufficiency verdicts) describe the shape in the prompt and parse the
//! model's reply here. Models wrap JSON in code fences or chatter around
//! it often enough that extraction has to be tolerant.

use serde::de::DeserializeOwned;

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest};

pub struct StructuredLLM<'a> {
    llm: &'a dyn LLMAdapter,
}

impl<'a> StructuredLLM<'a> {
    pub fn new(llm: &'a dyn LLMAdapter) -> Self {
        Self { llm }
    }

    /// Run the request and parse the reply as `T`. The prompt is expected to
    /// have already described the JSON shape to the model.
    pub async fn complete<T: DeserializeOwned>(&self, request: &LLMRequest) -> AppResult<T> {
        let mut request = request.clone();
        // Anthropic has no native JSON mode; lean on the system prompt for
        // extraction there. The OpenAI family follows the in-prompt schema.
        if request.provider == "anthropic" {
            let nudge = "Respond with only a valid JSON object, no prose.";
            request.system_instruction = Some(match request.system_instruction.take() {
                Some(existing) => format!("{}\n{}", existing, nudge),
                None => nudge.to_string(),
            });
        }
        let response = self.llm.create_chat_completion(&request).await?;
        parse_json_reply(&response.content)
    }
}

/// Pull a JSON value out of a model reply. Tries the raw text first, then a
/// fenced ```json block, then the outermost brace/bracket span.
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> AppResult<T> {
    let trimmed = content.trim();
    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }

    if let Some(fenced) = extract_fenced_block(trimmed) {
        if let Ok(parsed) = serde_json::from_str(fenced.trim()) {
            return Ok(parsed);
        }
    }

    if let Some(span) = extract_outer_span(trimmed) {
        if let Ok(parsed) = serde_json::from_str(span) {
            return Ok(parsed);
        }
    }

    Err(AppError::LLMApi(format!(
        "model reply was not valid JSON: {}",
        truncate_for_log(trimmed)
    )))
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the optional language tag on the opening fence.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn extract_outer_span(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close_char = if text.as_bytes()[open] == b'{' { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    (close > open).then(|| &text[open..=close])
}

fn truncate_for_log(text: &str) -> &str {
    let limit = 200;
    if text.len() <= limit {
        text
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}
