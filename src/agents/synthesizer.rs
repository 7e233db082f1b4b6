//! Synthesizer Agent
//!
//! Terminal step: assembles the final prompt from the conversation, the
//! accumulated documents, and the original question, then streams the
//! model's answer token-by-token. The sources event always goes out before
//! the first response token so clients can render citations progressively.

use futures::StreamExt;
use tracing::{info, warn};

use crate::agents::AgentContext;
use crate::events::{AgentAction, WorkflowEvent};
use crate::state::{AgentId, StateUpdate, WorkflowState};
use crate::types::{AppResult, LLMMessage, LLMRequest};
use crate::utils::format_history;

const PERSONA: &str = "You are a careful research assistant. Answer using the provided sources, \
citing them inline as [1], [2] matching the numbered source tags. Be direct and factual; say so \
when the sources do not cover something.";

pub struct SynthesizerAgent;

impl SynthesizerAgent {
    pub async fn execute(
        ctx: &AgentContext,
        state: &WorkflowState,
        truncated: bool,
    ) -> AppResult<StateUpdate> {
        // Citations first, regardless of how streaming goes.
        ctx.events
            .emit(WorkflowEvent::Sources(state.relevant_documents.clone()));
        ctx.events
            .action(AgentAction::Synthesizing, "Writing the answer");

        let request = LLMRequest {
            provider: ctx.config.llm.default_provider.clone(),
            model: ctx.config.llm.default_model.clone(),
            messages: vec![LLMMessage::user(synthesis_prompt(state, truncated))],
            max_tokens: None,
            temperature: None,
            system_instruction: Some(PERSONA.to_string()),
        };

        let mut stream = ctx.llm.create_chat_completion_stream(&request).await?;
        let mut answer = String::new();
        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    // Partial output is acceptable; stop consuming at once.
                    warn!("synthesis cancelled mid-stream");
                    break;
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(token)) => {
                        answer.push_str(&token);
                        ctx.events.emit(WorkflowEvent::Response(token));
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }
        }

        info!(answer_len = answer.len(), "synthesis complete");
        // Totals cover every completion call of the run; the token stream
        // itself reports no usage, so a pure-streaming run has none.
        let totals = ctx.usage.totals();
        ctx.events.emit(WorkflowEvent::ModelStats {
            model_name: ctx.config.llm.default_model.clone(),
            usage: (totals.total_tokens > 0).then_some(totals),
        });

        Ok(StateUpdate::goto(AgentId::End).with_message(LLMMessage::assistant(answer)))
    }
}

fn synthesis_prompt(state: &WorkflowState, truncated: bool) -> String {
    let disclosure = if truncated {
        "\nIMPORTANT: research was cut short before enough evidence was gathered. Open your \
answer with an explicit caveat that the information may be incomplete or conflicting, then \
answer as best the sources allow.\n"
    } else {
        ""
    };
    format!(
        r#"CONVERSATION SO FAR:
{history}

SOURCES:
{documents}
{disclosure}
QUESTION:
{original}

Answer the question using the sources above."#,
        history = format_history(&state.messages, 10),
        documents = state.format_documents(),
        disclosure = disclosure,
        original = state.original_query
    )
}
