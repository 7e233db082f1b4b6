//! Analyzer Agent
//!
//! Judges whether the accumulated documents answer the original question.
//! Sufficient evidence moves the run toward synthesis; insufficient evidence
//! produces a refinement question and loops back to web search. This is the
//! one agent that fails the run outright on an LLM or parse error: guessing
//! past an unconfirmed sufficiency check risks an unsupported answer.

use tracing::info;

use crate::agents::AgentContext;
use crate::events::AgentAction;
use crate::state::{AgentId, StateUpdate, WorkflowState};
use crate::types::{AppError, AppResult, LLMMessage};
use crate::utils::extract_tagged_block;

pub struct AnalyzerAgent;

impl AnalyzerAgent {
    pub async fn execute(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        ctx.ensure_active()?;
        ctx.events.action(
            AgentAction::AnalyzingContent,
            format!(
                "Checking whether {} document(s) answer the question",
                state.relevant_documents.len()
            ),
        );

        let prompt = analysis_prompt(state);
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);
        let response = ctx.llm.create_chat_completion(&request).await?;

        let answer = extract_tagged_block(&response.content, "answer").ok_or_else(|| {
            AppError::LLMApi("analyzer reply missing <answer> block".to_string())
        })?;

        if answer.starts_with("good_content") {
            info!("analysis verdict: sufficient");
            // More planned tasks still pending go back through the task
            // manager before synthesis.
            let next = if state.has_remaining_tasks() {
                AgentId::TaskManager
            } else {
                AgentId::Synthesizer
            };
            return Ok(StateUpdate::goto(next));
        }

        // Refinement loops are pointless when web search is off-limits;
        // synthesize from whatever exists instead of spinning.
        if !state.focus_mode.allows_web_search() {
            info!("insufficient but web search forbidden, synthesizing anyway");
            return Ok(StateUpdate::goto(AgentId::Synthesizer));
        }

        let question = extract_tagged_block(&response.content, "question")
            .ok_or_else(|| {
                AppError::LLMApi("analyzer reply missing <question> block".to_string())
            })?
            .to_string();
        let reason = extract_tagged_block(&response.content, "reason").unwrap_or("");
        info!(question = %question, reason = %reason, "analysis verdict: insufficient");

        ctx.events.action_with_details(
            AgentAction::RefiningSearch,
            question.clone(),
            serde_json::json!({ "attempt": state.full_analysis_attempts + 1 }),
        );

        Ok(StateUpdate {
            new_search_instructions: vec![question.clone()],
            search_instructions: Some(question),
            analysis_attempts: 1,
            next: AgentId::WebSearch,
            ..Default::default()
        })
    }
}

fn analysis_prompt(state: &WorkflowState) -> String {
    let asked = if state.search_instruction_history.is_empty() {
        "None.".to_string()
    } else {
        state.search_instruction_history.join("\n")
    };
    format!(
        r#"Judge whether the collected documents fully answer the question.

QUESTION:
{original}

COLLECTED DOCUMENTS:
{documents}

REFINEMENT QUESTIONS ALREADY ASKED (never repeat one):
{asked}

Reply using exactly these tags:
<answer>good_content</answer> if the documents suffice, otherwise
<answer>need_more_info</answer>
<question>one new, specific search question that would close the gap</question>
<reason>one sentence on what is missing</reason>

The <question> and <reason> tags are only required when the answer is need_more_info."#,
        original = state.original_query,
        documents = state.format_documents(),
        asked = asked
    )
}
