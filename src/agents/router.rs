//! Content Router Agent
//!
//! Picks the next hop for the current task: file search, web search, URL
//! summarization, or straight to analysis. The focus-mode policy is enforced
//! here in code; the model's routing suggestion never overrides it.

use serde::Deserialize;
use tracing::{info, warn};

use crate::agents::file_search::FileSearchAgent;
use crate::agents::AgentContext;
use crate::events::AgentAction;
use crate::llm::StructuredLLM;
use crate::state::{AgentId, StateUpdate, WorkflowState};
use crate::types::{AppResult, LLMMessage};
use crate::utils::extract_urls;

#[derive(Debug, Deserialize)]
struct RouteReply {
    decision: String,
    #[serde(default)]
    reasoning: String,
}

pub struct ContentRouterAgent;

impl ContentRouterAgent {
    pub async fn execute(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        ctx.ensure_active()?;
        ctx.events
            .action(AgentAction::RoutingContent, "Choosing the next step");

        // Pasted links short-circuit the model: unprocessed URLs in the task
        // always go to the URL summarizer first.
        let pending_urls: Vec<String> = extract_urls(state.current_task())
            .into_iter()
            .filter(|u| !state.banned_summary_urls.contains(u))
            .collect();
        if !pending_urls.is_empty() {
            info!(url_count = pending_urls.len(), "routing to url summarizer");
            return Ok(StateUpdate::goto(AgentId::UrlSummarizer));
        }

        let file_topics = Self::file_topics(ctx, state).await;
        let prompt = routing_prompt(state, &file_topics);
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);

        match StructuredLLM::new(ctx.llm.as_ref())
            .complete::<RouteReply>(&request)
            .await
        {
            Ok(reply) => {
                info!(decision = %reply.decision, reasoning = %reply.reasoning, "routing decision");
                let mut next = match reply.decision.trim() {
                    "file_search" => AgentId::FileSearch,
                    "web_search" => AgentId::WebSearch,
                    _ => AgentId::Analyzer,
                };
                // Focus-mode override always wins over the model.
                if next == AgentId::WebSearch && !state.focus_mode.allows_web_search() {
                    next = if state.file_ids.is_empty() {
                        AgentId::Analyzer
                    } else {
                        AgentId::FileSearch
                    };
                    info!(next = %next, "focus mode forbids web search, overriding route");
                }
                Ok(StateUpdate::goto(next))
            }
            // Routing failures surface rather than silently retrying.
            Err(e) => {
                warn!(error = %e, "routing failed, ending run");
                Ok(StateUpdate::goto(AgentId::End).with_message(LLMMessage::assistant(
                    format!("I could not decide how to handle this request: {}", e),
                )))
            }
        }
    }

    /// Topic signal for the prompt: a quick slice of the attached files'
    /// best-matching chunks, title plus a short content hint each. A lookup
    /// failure degrades to no signal rather than failing the route.
    async fn file_topics(ctx: &AgentContext, state: &WorkflowState) -> Vec<String> {
        if state.file_ids.is_empty() {
            return Vec::new();
        }
        match FileSearchAgent::quick_search(ctx, &state.file_ids, state.current_task()).await {
            Ok(documents) => documents
                .iter()
                .map(|d| {
                    let mut hint: String = d.page_content.chars().take(80).collect();
                    if d.page_content.chars().count() > 80 {
                        hint.push_str("...");
                    }
                    format!("{}: {}", d.metadata.title, hint)
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "file topic lookup failed");
                Vec::new()
            }
        }
    }
}

fn routing_prompt(state: &WorkflowState, file_topics: &[String]) -> String {
    let files_line = if file_topics.is_empty() {
        "No files are attached.".to_string()
    } else {
        format!("Attached files: {}", file_topics.join("; "))
    };
    let history = if state.search_instruction_history.is_empty() {
        "None yet.".to_string()
    } else {
        state.search_instruction_history.join("\n")
    };

    format!(
        r#"Decide how to gather evidence for the current task.

TASK:
{task}

{files_line}
Documents collected so far: {doc_count}

Earlier refinement questions:
{history}

Choose exactly one:
- "file_search": the attached files likely contain the answer
- "web_search": the answer needs current or external information from the web
- "analyzer": the collected documents (or general knowledge) already suffice

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "decision": "file_search|web_search|analyzer",
  "reasoning": "One sentence"
}}"#,
        task = state.current_task(),
        files_line = files_line,
        doc_count = state.relevant_documents.len(),
        history = history
    )
}
